// src/extractors/score.rs

// --- Imports ---
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

// --- Grammar Constants ---

/// Rubric dimensions, in the order the evaluator numbers them (1-based).
pub const DIMENSIONS: [&str; 5] = [
    "真实性与准确性",
    "业务逻辑性",
    "风险分析全面性",
    "重点突出与简洁性",
    "再担保决策支持价值",
];

pub const MAX_DIMENSION_SCORE: u8 = 5;
pub const MAX_TOTAL_SCORE: u32 = 25;

/// Substring that marks a failed generation call in place of evaluator text.
pub const GENERATION_FAILURE_MARKER: &str = "LLM生成错误";

/// Bound that closes the rationale of the last dimension.
const TOTAL_SCORE_HEADER: &str = r"\*\*总评分：";

pub const DECLARED_TOTAL_NOT_FOUND: &str = "LLM reported total score not found";
pub const DECLARED_TOTAL_MALFORMED: &str = "LLM reported total score could not be parsed";

// --- Regex Patterns (Lazy Static) ---

/// Header and rationale bound for one numbered dimension.
struct DimensionGrammar {
    name: &'static str,
    // `**i. name（评分：X/5）** 评分理由：`
    header: Regex,
    // `\n **i+1.` or `\n **总评分：`; first match after the header ends the rationale
    bound: Regex,
}

static DIMENSION_GRAMMARS: Lazy<Vec<DimensionGrammar>> = Lazy::new(|| {
    DIMENSIONS
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let header = format!(
                r"(?i)\*\*{}\.\s*{}（评分：\s*(\d)\s*/{}）\*\*\s*评分理由：",
                i + 1,
                regex::escape(name),
                MAX_DIMENSION_SCORE
            );
            let next = if i + 1 < DIMENSIONS.len() {
                format!(r"\*\*{}\.", i + 2)
            } else {
                TOTAL_SCORE_HEADER.to_string()
            };
            DimensionGrammar {
                name,
                header: Regex::new(&header).expect("Failed to compile dimension header regex"),
                bound: Regex::new(&format!(r"(?i)\n\s*(?:{next})"))
                    .expect("Failed to compile dimension bound regex"),
            }
        })
        .collect()
});

static DECLARED_TOTAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\*\*总评分：\s*(\d+)\s*/{MAX_TOTAL_SCORE}\*\*"))
        .expect("Failed to compile DECLARED_TOTAL_RE")
});

enum DimensionOutcome {
    Scored { score: u8, reason: String },
    OutOfRange(String),
    Missing,
}

impl DimensionGrammar {
    fn parse(&self, text: &str) -> DimensionOutcome {
        let Some(caps) = self.header.captures(text) else {
            return DimensionOutcome::Missing;
        };
        let (Some(whole), Some(digit)) = (caps.get(0), caps.get(1)) else {
            return DimensionOutcome::Missing;
        };

        let rest = &text[whole.end()..];
        let reason_end = self.bound.find(rest).map_or(rest.len(), |m| m.start());
        let reason = rest[..reason_end].trim().to_string();

        match parse_number::<u8>(digit.as_str()) {
            Some(score) if score <= MAX_DIMENSION_SCORE => DimensionOutcome::Scored { score, reason },
            _ => DimensionOutcome::OutOfRange(digit.as_str().to_string()),
        }
    }
}

// --- Data Structures ---

/// Ordered dimension-name map; serialises as a JSON object in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionMap<T>(Vec<(String, T)>);

impl<T> Default for DimensionMap<T> {
    fn default() -> Self {
        DimensionMap(Vec::new())
    }
}

impl<T> DimensionMap<T> {
    pub fn insert(&mut self, name: impl Into<String>, value: T) {
        let name = name.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Serialize> Serialize for DimensionMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for DimensionMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for MapVisitor<T> {
            type Value = DimensionMap<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map keyed by dimension name")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = DimensionMap::default();
                while let Some((k, v)) = access.next_entry::<String, T>()? {
                    map.insert(k, v);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(MapVisitor(PhantomData))
    }
}

/// Total score as stated by the evaluator text itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DeclaredTotalRepr", into = "DeclaredTotalRepr")]
pub enum DeclaredTotal {
    Reported(u32),
    NotFound,
    /// The total header matched but its number did not fit an integer.
    Malformed,
}

impl DeclaredTotal {
    pub fn value(&self) -> Option<u32> {
        match self {
            DeclaredTotal::Reported(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DeclaredTotalRepr {
    Number(u32),
    Marker(String),
}

impl From<DeclaredTotalRepr> for DeclaredTotal {
    fn from(repr: DeclaredTotalRepr) -> Self {
        match repr {
            DeclaredTotalRepr::Number(n) => DeclaredTotal::Reported(n),
            DeclaredTotalRepr::Marker(m) if m == DECLARED_TOTAL_NOT_FOUND => DeclaredTotal::NotFound,
            DeclaredTotalRepr::Marker(_) => DeclaredTotal::Malformed,
        }
    }
}

impl From<DeclaredTotal> for DeclaredTotalRepr {
    fn from(total: DeclaredTotal) -> Self {
        match total {
            DeclaredTotal::Reported(n) => DeclaredTotalRepr::Number(n),
            DeclaredTotal::NotFound => DeclaredTotalRepr::Marker(DECLARED_TOTAL_NOT_FOUND.to_string()),
            DeclaredTotal::Malformed => DeclaredTotalRepr::Marker(DECLARED_TOTAL_MALFORMED.to_string()),
        }
    }
}

/// Rubric scores recovered from one evaluator output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub scores: DimensionMap<Option<u8>>,
    pub reasons: DimensionMap<String>,
    /// Sum of the dimension scores that parsed; partial when any failed.
    #[serde(rename = "calculated_total_score")]
    pub calculated_total: u32,
    /// `None` when matching was never attempted (generation failure).
    #[serde(rename = "llm_reported_total_score")]
    pub declared_total: Option<DeclaredTotal>,
    pub parsing_error: bool,
    #[serde(rename = "raw_output")]
    pub raw_text: String,
}

impl ScoreRecord {
    pub fn score(&self, dimension: &str) -> Option<u8> {
        self.scores.get(dimension).copied().flatten()
    }

    #[cfg(test)]
    pub fn reason(&self, dimension: &str) -> Option<&str> {
        self.reasons.get(dimension).map(String::as_str)
    }

    /// Scores for every dimension in rubric order, if all of them parsed.
    pub fn complete_scores(&self) -> Option<[u8; 5]> {
        let mut out = [0u8; 5];
        for (slot, name) in out.iter_mut().zip(DIMENSIONS) {
            *slot = self.score(name)?;
        }
        Some(out)
    }

    fn generation_failure(raw_text: &str) -> Self {
        let mut scores = DimensionMap::default();
        let mut reasons = DimensionMap::default();
        for name in DIMENSIONS {
            scores.insert(name, None);
            reasons.insert(name, raw_text.to_string());
        }
        Self {
            scores,
            reasons,
            calculated_total: 0,
            declared_total: None,
            parsing_error: true,
            raw_text: raw_text.to_string(),
        }
    }
}

// --- Extraction ---

pub fn is_generation_failure(raw_text: &str) -> bool {
    raw_text.contains(GENERATION_FAILURE_MARKER)
}

/// Recovers the rubric scores, rationales and declared total from evaluator text.
/// Never fails: every mismatch is recorded in the returned record.
pub fn extract(raw_text: &str) -> ScoreRecord {
    if is_generation_failure(raw_text) {
        tracing::debug!("Evaluator text carries the generation failure marker; skipping extraction");
        return ScoreRecord::generation_failure(raw_text);
    }

    let mut scores = DimensionMap::default();
    let mut reasons = DimensionMap::default();
    let mut calculated_total = 0u32;
    let mut parsing_error = false;

    for grammar in DIMENSION_GRAMMARS.iter() {
        match grammar.parse(raw_text) {
            DimensionOutcome::Scored { score, reason } => {
                scores.insert(grammar.name, Some(score));
                reasons.insert(grammar.name, reason);
                calculated_total += u32::from(score);
            }
            DimensionOutcome::OutOfRange(raw) => {
                tracing::debug!("Dimension '{}' score '{}' out of range", grammar.name, raw);
                scores.insert(grammar.name, None);
                reasons.insert(
                    grammar.name,
                    format!(
                        "{} score '{}' failed validation: outside 0-{}",
                        grammar.name, raw, MAX_DIMENSION_SCORE
                    ),
                );
                parsing_error = true;
            }
            DimensionOutcome::Missing => {
                tracing::debug!("Dimension '{}' not found in evaluator text", grammar.name);
                scores.insert(grammar.name, None);
                reasons.insert(grammar.name, format!("{} not found or format mismatch", grammar.name));
                parsing_error = true;
            }
        }
    }

    ScoreRecord {
        scores,
        reasons,
        calculated_total,
        declared_total: Some(extract_declared_total(raw_text)),
        parsing_error,
        raw_text: raw_text.to_string(),
    }
}

/// Finds `**总评分：N/25**` anywhere in the text.
pub fn extract_declared_total(raw_text: &str) -> DeclaredTotal {
    match DECLARED_TOTAL_RE.captures(raw_text).and_then(|caps| caps.get(1)) {
        Some(m) => parse_number::<u32>(m.as_str()).map_or(DeclaredTotal::Malformed, DeclaredTotal::Reported),
        None => DeclaredTotal::NotFound,
    }
}

/// Parses a captured `\d+`, folding full-width digits (`０`-`９`) to ASCII first.
fn parse_number<T: FromStr>(digits: &str) -> Option<T> {
    let ascii: String = digits
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(u32::from(c) - u32::from('０') + u32::from('0')).unwrap_or(c),
            _ => c,
        })
        .collect();
    ascii.parse().ok()
}
