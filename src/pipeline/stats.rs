// src/pipeline/stats.rs
//! Score statistics over an assessed record file.

use crate::config::StatsConfig;
use crate::extractors::score::{DIMENSIONS, MAX_DIMENSION_SCORE, MAX_TOTAL_SCORE};
use crate::extractors::section::Section;
use crate::storage::{read_documents, write_json_pretty, DocumentRecord};
use crate::utils::AppError;
use serde::Serialize;
use std::fmt::Write as _;

/// Mean / min / max of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub name: String,
    pub max_score: u32,
    pub mean: f64,
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub samples: usize,
    pub dimensions: Vec<ColumnStats>,
    pub total: ColumnStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionStats {
    pub title: String,
    /// `None` when no section with this title had a usable score.
    pub summary: Option<ScoreSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub generated_at: String,
    pub sections: Vec<SectionStats>,
    pub overall: Option<ScoreSummary>,
    /// Scored sections left out for a parse error or missing total.
    pub excluded: usize,
}

/// One usable sample: five dimension scores followed by the declared total.
type Row = [u32; 6];

pub fn run(config: &StatsConfig) -> Result<StatsReport, AppError> {
    let documents = read_documents(&config.input)?;
    tracing::info!("Loaded {} documents from {}", documents.len(), config.input.display());

    let report = collect(&documents);
    if let Some(path) = &config.output {
        write_json_pretty(path, &report)?;
    }
    Ok(report)
}

/// Gathers every fully parsed score, grouped by retained section title.
pub fn collect(documents: &[DocumentRecord]) -> StatsReport {
    let mut per_section: Vec<Vec<Row>> = vec![Vec::new(); Section::RETAINED.len()];
    let mut excluded = 0;

    for document in documents {
        for entry in &document.content {
            let Some(slot) = Section::RETAINED
                .iter()
                .position(|s| s.title() == entry.section.title)
            else {
                continue;
            };
            let Some(data) = &entry.score_data else {
                continue;
            };
            if data.record.raw_text.is_empty() {
                // never sent to the evaluator
                continue;
            }
            match usable_row(&data.record) {
                Some(row) => per_section[slot].push(row),
                None => excluded += 1,
            }
        }
    }

    let overall_rows: Vec<Row> = per_section.iter().flatten().copied().collect();
    let sections = Section::RETAINED
        .iter()
        .zip(&per_section)
        .map(|(section, rows)| SectionStats {
            title: section.title().to_string(),
            summary: summarize(rows),
        })
        .collect();

    StatsReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        sections,
        overall: summarize(&overall_rows),
        excluded,
    }
}

fn usable_row(record: &crate::extractors::score::ScoreRecord) -> Option<Row> {
    if record.parsing_error {
        return None;
    }
    let scores = record.complete_scores()?;
    let total = record.declared_total.as_ref()?.value()?;

    let mut row = [0u32; 6];
    for (slot, score) in row.iter_mut().zip(scores) {
        *slot = u32::from(score);
    }
    row[5] = total;
    Some(row)
}

fn summarize(rows: &[Row]) -> Option<ScoreSummary> {
    if rows.is_empty() {
        return None;
    }
    let column = |idx: usize, name: &str, max_score: u32| {
        let values = rows.iter().map(|r| r[idx]);
        let sum: u64 = values.clone().map(u64::from).sum();
        ColumnStats {
            name: name.to_string(),
            max_score,
            mean: sum as f64 / rows.len() as f64,
            min: values.clone().min().unwrap_or_default(),
            max: values.max().unwrap_or_default(),
        }
    };

    Some(ScoreSummary {
        samples: rows.len(),
        dimensions: DIMENSIONS
            .iter()
            .enumerate()
            .map(|(i, name)| column(i, *name, u32::from(MAX_DIMENSION_SCORE)))
            .collect(),
        total: column(5, "总评分", MAX_TOTAL_SCORE),
    })
}

/// Plain-text rendering for the terminal.
pub fn render(report: &StatsReport) -> String {
    let mut out = String::new();
    for section in &report.sections {
        match &section.summary {
            Some(summary) => {
                let _ = writeln!(out, "=== {} ({} samples) ===", section.title, summary.samples);
                render_summary(&mut out, summary);
            }
            None => {
                let _ = writeln!(out, "=== {} ===\nNo usable score data\n", section.title);
            }
        }
    }
    match &report.overall {
        Some(summary) => {
            let _ = writeln!(out, "=== Overall ({} samples) ===", summary.samples);
            render_summary(&mut out, summary);
        }
        None => {
            let _ = writeln!(out, "No usable score data in any section");
        }
    }
    if report.excluded > 0 {
        let _ = writeln!(out, "Excluded (parse errors or missing total): {}", report.excluded);
    }
    out
}

fn render_summary(out: &mut String, summary: &ScoreSummary) {
    for column in summary.dimensions.iter().chain(std::iter::once(&summary.total)) {
        let _ = writeln!(
            out,
            "{} mean: {:.2} / {} (min {}, max {})",
            column.name, column.mean, column.max_score, column.min, column.max
        );
    }
    out.push('\n');
}
