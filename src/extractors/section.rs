// src/extractors/section.rs

// --- Imports ---
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// --- Constants ---
/// Delimiter placed between the cells of a flattened table row.
pub const TABLE_CELL_DELIMITER: &str = " | ";

/// Subsection labels that may open a block inside the comprehensive-analysis
/// section, and the canonical section whose `summary` they feed.
/// `企业产品及市场评价` is an alternate spelling of the product/market label.
pub const SUBSECTION_LABELS: [(&str, Section); 6] = [
    ("企业基本资质评价", Section::BasicInfo),
    ("企业经营管理能力评价", Section::Operations),
    ("企业产品（服务）及市场评价", Section::ProductMarket),
    ("企业产品及市场评价", Section::ProductMarket),
    ("企业财务状况评价", Section::Financial),
    ("担保用途及偿还能力评价", Section::GuaranteeUse),
];

// --- Regex Patterns (Lazy Static) ---
// Section header: optional "第N部分" prefix followed by a section literal, anywhere in the paragraph.
static SECTION_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    let titles = Section::ALL
        .iter()
        .map(|s| regex::escape(s.title()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?:第[一二三四五六七八九十]+部分[\t\s]*)?({titles})"))
        .expect("Failed to compile SECTION_HEADER_RE")
});

// Subsection label: optional "一、" style ordinal, anchored at the start of the paragraph.
static SUBSECTION_RE: Lazy<Regex> = Lazy::new(|| {
    let labels = SUBSECTION_LABELS
        .iter()
        .map(|(label, _)| regex::escape(label))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"^(?:[一二三四五六七八九十]+[、.])?({labels})"))
        .expect("Failed to compile SUBSECTION_RE")
});

// --- Data Structures ---

/// The closed set of top-level sections a report is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    BasicInfo,
    Operations,
    ProductMarket,
    Financial,
    GuaranteeUse,
    /// Container whose own narrative is discarded; its labelled
    /// subsections are redirected into the other sections' summaries.
    Comprehensive,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::BasicInfo,
        Section::Operations,
        Section::ProductMarket,
        Section::Financial,
        Section::GuaranteeUse,
        Section::Comprehensive,
    ];

    /// Sections emitted to the output, in canonical order.
    pub const RETAINED: [Section; 5] = [
        Section::BasicInfo,
        Section::Operations,
        Section::ProductMarket,
        Section::Financial,
        Section::GuaranteeUse,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Section::BasicInfo => "基本情况分析",
            Section::Operations => "经营管理分析",
            Section::ProductMarket => "产品及市场分析",
            Section::Financial => "财务分析",
            Section::GuaranteeUse => "企业担保用途分析",
            Section::Comprehensive => "综合分析",
        }
    }

    pub fn from_title(title: &str) -> Option<Section> {
        Section::ALL.into_iter().find(|s| s.title() == title)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Resolves a subsection label to the section whose summary it feeds.
pub fn subsection_target(label: &str) -> Option<Section> {
    SUBSECTION_LABELS
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, target)| *target)
}

/// One block of document content, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Text(String),
    Table(Vec<Vec<String>>),
}

#[cfg(test)]
impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text(text.into())
    }

    pub fn table<R, C>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = C>,
        C: Into<String>,
    {
        ContentBlock::Table(
            rows.into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        )
    }
}

/// Accumulated text of one section. Both fields are newline-terminated
/// fragments appended in block order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub summary: String,
}

impl SectionRecord {
    pub fn new(section: Section) -> Self {
        Self {
            title: section.title().to_string(),
            ..Self::default()
        }
    }
}

/// Where the segmenter currently routes ordinary text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    NoSection,
    InSection(Section),
    InContainerSection,
    /// Inside a labelled subsection of the container; holds the resolved target.
    InContainerSubsection(Section),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Content,
    Summary,
}

impl ParserState {
    /// Any section header resets subsection mode.
    fn on_header(self, section: Section) -> Self {
        match section {
            Section::Comprehensive => ParserState::InContainerSection,
            other => ParserState::InSection(other),
        }
    }

    fn in_container(self) -> bool {
        matches!(
            self,
            ParserState::InContainerSection | ParserState::InContainerSubsection(_)
        )
    }

    fn destination(self) -> Option<(Section, Field)> {
        match self {
            ParserState::NoSection => None,
            ParserState::InSection(section) => Some((section, Field::Content)),
            ParserState::InContainerSection => Some((Section::Comprehensive, Field::Content)),
            ParserState::InContainerSubsection(target) => Some((target, Field::Summary)),
        }
    }
}

/// Result of one segmentation pass: a record for every section, container included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    records: [SectionRecord; 6],
}

impl Segmentation {
    pub fn get(&self, section: Section) -> &SectionRecord {
        &self.records[section.index()]
    }

    /// Emits the records in `order`, always dropping the container section.
    pub fn records_in_order(&self, order: &[Section]) -> Vec<SectionRecord> {
        order
            .iter()
            .filter(|s| **s != Section::Comprehensive)
            .map(|s| self.get(*s).clone())
            .collect()
    }

    /// The five retained records in canonical order.
    pub fn into_retained(self) -> Vec<SectionRecord> {
        self.records_in_order(&Section::RETAINED)
    }
}

// --- Main Segmenter Structure ---

/// Single-pass classifier over a document's content blocks.
#[derive(Debug)]
pub struct Segmenter {
    state: ParserState,
    records: [SectionRecord; 6],
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter {
    pub fn new() -> Self {
        Self {
            state: ParserState::NoSection,
            records: Section::ALL.map(SectionRecord::new),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn push(&mut self, block: &ContentBlock) {
        match block {
            ContentBlock::Text(text) => self.push_text(text),
            // Tables never open a section or subsection; an empty one still adds its newline.
            ContentBlock::Table(rows) => self.route(&flatten_table(rows)),
        }
    }

    pub fn finish(self) -> Segmentation {
        Segmentation { records: self.records }
    }

    fn push_text(&mut self, raw: &str) {
        let text = raw.trim();
        if text.is_empty() {
            return;
        }
        let matchable = normalize(text);

        if let Some(section) = match_section_header(&matchable) {
            tracing::trace!("Section header '{}' in block: '{}'", section.title(), text);
            self.state = self.state.on_header(section);
            return;
        }

        if self.state.in_container() {
            if let Some(target) = match_subsection(&matchable) {
                tracing::trace!("Subsection for '{}' in block: '{}'", target.title(), text);
                append(&mut self.records[target.index()].summary, text);
                self.state = ParserState::InContainerSubsection(target);
                return;
            }
        }

        self.route(text);
    }

    fn route(&mut self, text: &str) {
        match self.state.destination() {
            Some((section, Field::Content)) => {
                append(&mut self.records[section.index()].content, text)
            }
            Some((section, Field::Summary)) => {
                append(&mut self.records[section.index()].summary, text)
            }
            None => tracing::trace!("Dropping block before first section header: '{}'", text),
        }
    }
}

/// Splits a document's blocks into section records.
pub fn segment(blocks: &[ContentBlock]) -> Segmentation {
    let mut segmenter = Segmenter::new();
    for block in blocks {
        segmenter.push(block);
    }
    segmenter.finish()
}

/// Returns the section whose header appears in `text`, if any.
pub fn match_section_header(text: &str) -> Option<Section> {
    SECTION_HEADER_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Section::from_title(m.as_str()))
}

/// Returns the subsection target if `text` opens with a subsection label.
pub fn match_subsection(text: &str) -> Option<Section> {
    SUBSECTION_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| subsection_target(m.as_str()))
}

/// Flattens table rows into `cell | cell` lines, skipping empty cells and rows.
pub fn flatten_table(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|cell| cell.trim())
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<_>>()
                .join(TABLE_CELL_DELIMITER)
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// Matching only; stored text keeps its interior NBSPs.
fn normalize(text: &str) -> String {
    text.replace('\u{a0}', " ")
}

fn append(field: &mut String, text: &str) {
    field.push_str(text);
    field.push('\n');
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(texts: &[&str]) -> Vec<ContentBlock> {
        texts.iter().map(|t| ContentBlock::text(*t)).collect()
    }

    #[test]
    fn test_report_with_table_and_comprehensive_summary() {
        let blocks = vec![
            ContentBlock::text("第一部分 基本情况分析"),
            ContentBlock::text("企业注册于2001年。"),
            ContentBlock::table([["注册资本 | 500万"]]),
            ContentBlock::text("综合分析"),
            ContentBlock::text("一、企业基本资质评价"),
            ContentBlock::text("资质良好，合规经营。"),
        ];

        let result = segment(&blocks);
        let basic = result.get(Section::BasicInfo);
        assert_eq!(basic.content, "企业注册于2001年。\n注册资本 | 500万\n");
        assert_eq!(basic.summary, "一、企业基本资质评价\n资质良好，合规经营。\n");
    }

    #[test]
    fn test_no_header_leaves_every_record_empty() {
        let result = segment(&blocks(&["前言", "一、企业基本资质评价", "正文内容"]));
        for section in Section::ALL {
            let record = result.get(section);
            assert_eq!(record.title, section.title());
            assert!(record.content.is_empty(), "{} content should be empty", section.title());
            assert!(record.summary.is_empty(), "{} summary should be empty", section.title());
        }
    }

    #[test]
    fn test_container_is_never_emitted() {
        let result = segment(&blocks(&["综合分析", "总体来看企业经营稳健。"]));
        assert_eq!(result.get(Section::Comprehensive).content, "总体来看企业经营稳健。\n");

        let retained = result.into_retained();
        assert_eq!(retained.len(), 5);
        assert!(retained.iter().all(|r| r.title != "综合分析"));
        let titles: Vec<_> = retained.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["基本情况分析", "经营管理分析", "产品及市场分析", "财务分析", "企业担保用途分析"]);
    }

    #[test]
    fn test_caller_order_is_respected() {
        let result = segment(&blocks(&["财务分析", "负债率较低。"]));
        let ordered = result.records_in_order(&[
            Section::Financial,
            Section::Comprehensive,
            Section::BasicInfo,
        ]);
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].title, "财务分析");
        assert_eq!(ordered[0].content, "负债率较低。\n");
        assert_eq!(ordered[1].title, "基本情况分析");
    }

    #[test]
    fn test_header_block_is_consumed_even_with_trailing_text() {
        let result = segment(&blocks(&["第二部分\t经营管理分析（续）", "管理团队稳定。"]));
        let ops = result.get(Section::Operations);
        assert_eq!(ops.content, "管理团队稳定。\n");
    }

    #[test]
    fn test_subsection_label_outside_container_is_content() {
        let result = segment(&blocks(&["经营管理分析", "二、企业经营管理能力评价"]));
        assert_eq!(result.get(Section::Operations).content, "二、企业经营管理能力评价\n");
        assert!(result.get(Section::Operations).summary.is_empty());
    }

    #[test]
    fn test_subsection_must_be_anchored_at_start() {
        let result = segment(&blocks(&["综合分析", "关于企业财务状况评价的说明"]));
        assert!(result.get(Section::Financial).summary.is_empty());
        assert_eq!(result.get(Section::Comprehensive).content, "关于企业财务状况评价的说明\n");
    }

    #[test]
    fn test_alias_label_maps_to_product_market() {
        let result = segment(&blocks(&["综合分析", "三.企业产品及市场评价", "市场份额稳定。"]));
        let product = result.get(Section::ProductMarket);
        assert_eq!(product.summary, "三.企业产品及市场评价\n市场份额稳定。\n");
    }

    #[test]
    fn test_subsection_text_follows_most_recent_label() {
        let result = segment(&blocks(&[
            "综合分析",
            "四、企业财务状况评价",
            "盈利能力较强。",
            "五、担保用途及偿还能力评价",
            "还款来源充足。",
        ]));
        assert_eq!(result.get(Section::Financial).summary, "四、企业财务状况评价\n盈利能力较强。\n");
        assert_eq!(
            result.get(Section::GuaranteeUse).summary,
            "五、担保用途及偿还能力评价\n还款来源充足。\n"
        );
    }

    #[test]
    fn test_reentering_container_clears_subsection_mode() {
        let result = segment(&blocks(&[
            "综合分析",
            "一、企业基本资质评价",
            "资质良好。",
            "财务分析",
            "收入增长。",
            "综合分析",
            "这段文字不属于任何子部分。",
        ]));
        assert_eq!(result.get(Section::BasicInfo).summary, "一、企业基本资质评价\n资质良好。\n");
        assert_eq!(result.get(Section::Financial).content, "收入增长。\n");
        assert_eq!(result.get(Section::Comprehensive).content, "这段文字不属于任何子部分。\n");
    }

    #[test]
    fn test_table_in_subsection_goes_to_summary() {
        let result = segment(&[
            ContentBlock::text("综合分析"),
            ContentBlock::text("一、企业基本资质评价"),
            ContentBlock::table(vec![vec!["指标", "", "数值"], vec!["", "", ""], vec!["评级", "A"]]),
        ]);
        assert_eq!(
            result.get(Section::BasicInfo).summary,
            "一、企业基本资质评价\n指标 | 数值\n评级 | A\n"
        );
    }

    #[test]
    fn test_table_never_triggers_header() {
        let result = segment(&[
            ContentBlock::text("基本情况分析"),
            ContentBlock::table([["财务分析", "见下文"]]),
            ContentBlock::text("后续正文。"),
        ]);
        assert_eq!(
            result.get(Section::BasicInfo).content,
            "财务分析 | 见下文\n后续正文。\n"
        );
        assert!(result.get(Section::Financial).content.is_empty());
    }

    #[test]
    fn test_blank_blocks_are_skipped_and_empty_tables_add_a_line() {
        let result = segment(&[
            ContentBlock::text("基本情况分析"),
            ContentBlock::text("   "),
            ContentBlock::table([["", " "]]),
            ContentBlock::text("\u{a0}成立时间较长。 "),
        ]);
        assert_eq!(result.get(Section::BasicInfo).content, "\n成立时间较长。\n");

        // Before the first header there is nowhere to put it.
        let result = segment(&[ContentBlock::table([[""]])]);
        assert!(Section::ALL.iter().all(|s| result.get(*s).content.is_empty()));
    }

    #[test]
    fn test_interior_nbsp_is_kept_in_stored_text() {
        let result = segment(&[
            ContentBlock::text("第一部分\u{a0}基本情况分析"),
            ContentBlock::text(" 注册资本\u{a0}500万 "),
            ContentBlock::text("综合分析"),
            ContentBlock::text("一、企业基本资质评价\u{a0}良好"),
        ]);
        let record = result.get(Section::BasicInfo);
        assert_eq!(record.content, "注册资本\u{a0}500万\n");
        assert_eq!(record.summary, "一、企业基本资质评价\u{a0}良好\n");
    }

    #[test]
    fn test_state_transitions() {
        let mut segmenter = Segmenter::new();
        assert_eq!(segmenter.state(), ParserState::NoSection);
        segmenter.push(&ContentBlock::text("综合分析"));
        assert_eq!(segmenter.state(), ParserState::InContainerSection);
        segmenter.push(&ContentBlock::text("一、企业基本资质评价"));
        assert_eq!(segmenter.state(), ParserState::InContainerSubsection(Section::BasicInfo));
        segmenter.push(&ContentBlock::text("第三部分 产品及市场分析"));
        assert_eq!(segmenter.state(), ParserState::InSection(Section::ProductMarket));
    }

    #[test]
    fn test_header_and_subsection_matchers() {
        assert_eq!(match_section_header("第十部分 企业担保用途分析"), Some(Section::GuaranteeUse));
        assert_eq!(match_section_header("普通段落"), None);
        assert_eq!(match_subsection("企业经营管理能力评价如下"), Some(Section::Operations));
        assert_eq!(match_subsection("一、企业产品（服务）及市场评价"), Some(Section::ProductMarket));
        assert_eq!(match_subsection("简述：企业财务状况评价"), None);
    }
}
