// src/pipeline/summarize.rs
//! Fills `summary_LLM` for every section with content.

use crate::config::SummarizeConfig;
use crate::llm::models::{GenerationRequest, SamplingParams};
use crate::llm::prompts::summary_messages;
use crate::llm::TextGenerator;
use crate::pipeline::RunSummary;
use crate::storage::{parse_read_line, DocumentRecord, JsonlReader, JsonlWriter};
use crate::utils::AppError;
use std::fs;

pub async fn run<G: TextGenerator>(generator: &G, config: &SummarizeConfig) -> Result<RunSummary, AppError> {
    let template = fs::read_to_string(&config.template)?.trim().to_string();
    let mut writer = JsonlWriter::create(&config.output)?;
    let mut summary = RunSummary::default();

    for entry in JsonlReader::open(&config.input)? {
        let (line_number, line) = entry?;
        let mut document = match parse_read_line(line_number, line) {
            Ok(doc) => doc,
            Err(placeholder) => {
                tracing::warn!("Line {}: {}", line_number, placeholder.error);
                writer.write_record(&placeholder)?;
                summary.failed += 1;
                continue;
            }
        };

        summarize_document(generator, &template, &config.sampling, &mut document, &mut summary).await;
        writer.write_record(&document)?;
        tracing::info!(
            "{} done, documents written: {}",
            document.filename,
            writer.written()
        );
    }

    Ok(summary)
}

async fn summarize_document<G: TextGenerator>(
    generator: &G,
    template: &str,
    sampling: &SamplingParams,
    document: &mut DocumentRecord,
    summary: &mut RunSummary,
) {
    for entry in &mut document.content {
        let section = &entry.section;
        if section.content.trim().is_empty() {
            summary.skipped += 1;
            continue;
        }

        let request = GenerationRequest {
            messages: summary_messages(template, &section.title, &section.content),
            sampling: sampling.clone(),
        };
        match generator.generate(&request).await {
            Ok(text) if !text.trim().is_empty() => {
                entry.summary_llm = Some(text);
                summary.processed += 1;
            }
            Ok(_) => {
                tracing::warn!("{} / {}: empty summary returned", document.filename, section.title);
                summary.failed += 1;
            }
            Err(e) => {
                tracing::error!("{} / {}: summary generation failed: {}", document.filename, section.title, e);
                summary.failed += 1;
            }
        }
    }
}
