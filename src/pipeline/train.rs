// src/pipeline/train.rs
//! Instruction-tuning examples from scored summaries and reference summaries.

use crate::config::TrainConfig;
use crate::storage::{read_documents, write_json_pretty, DocumentRecord};
use crate::utils::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_INSTRUCTION: &str =
    "作为资深再担保业务评审员，请针对以下文本（含原始内容、已有总结及专家评分与评价）进行总结优化。需严格参考专家评分与评价逻辑";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub instruction: String,
    pub input: String,
    pub output: String,
}

pub fn run(config: &TrainConfig) -> Result<usize, AppError> {
    let reference = reference_summaries(&read_documents(&config.reference)?);
    let generated = read_documents(&config.generated)?;

    let examples = build_examples(&generated, &reference, &config.instruction);
    write_json_pretty(&config.output, &examples)?;
    tracing::info!("Built {} training examples", examples.len());
    Ok(examples.len())
}

/// `(filename, title)` to the reference `summary_LLM`.
pub fn reference_summaries(documents: &[DocumentRecord]) -> HashMap<(String, String), String> {
    documents
        .iter()
        .flat_map(|doc| {
            doc.content.iter().map(move |entry| {
                (
                    (doc.filename.clone(), entry.section.title.clone()),
                    entry.summary_llm.clone().unwrap_or_default(),
                )
            })
        })
        .collect()
}

/// One example per generated section that has both a summary and a non-empty reference.
pub fn build_examples(
    generated: &[DocumentRecord],
    reference: &HashMap<(String, String), String>,
    instruction: &str,
) -> Vec<TrainingExample> {
    let mut examples = Vec::new();
    for doc in generated {
        for entry in &doc.content {
            let title = &entry.section.title;
            let Some(summary) = entry.summary_llm.as_deref().filter(|s| !s.is_empty()) else {
                continue;
            };
            let Some(correct) = reference
                .get(&(doc.filename.clone(), title.clone()))
                .filter(|s| !s.is_empty())
            else {
                tracing::debug!("No reference summary for {} / {}", doc.filename, title);
                continue;
            };
            let evaluation = entry
                .score_data
                .as_ref()
                .map(|d| d.record.raw_text.as_str())
                .unwrap_or_default();

            examples.push(TrainingExample {
                instruction: instruction.to_string(),
                input: format!("标题: {}\n内容: {}\n总结: {}", title, entry.section.content, summary),
                output: format!("评价：{evaluation}\n 优化总结：{correct}\n "),
            });
        }
    }
    examples
}
