// src/pipeline/assess.rs
//! Scores each generated summary against its source section.

use crate::config::AssessConfig;
use crate::extractors::score::{extract, is_generation_failure};
use crate::llm::models::{GenerationRequest, SamplingParams};
use crate::llm::prompts::scoring_messages;
use crate::llm::{generate_or_sentinel, TextGenerator};
use crate::pipeline::RunSummary;
use crate::storage::{parse_read_line, JsonlReader, JsonlWriter, ScoreData, SectionEntry};
use crate::utils::AppError;

pub const STATUS_SCORED: &str = "scored";
pub const STATUS_EMPTY_ORIGINAL: &str = "original text empty, not scored";
pub const STATUS_EMPTY_SUMMARY: &str = "summary empty, not scored";
pub const STATUS_INCOMPLETE: &str = "evaluator output incomplete or unparseable";

/// What happened to one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionOutcome {
    Scored,
    /// Scored, but the record carries `parsing_error`.
    Degraded,
    Skipped,
}

pub async fn run<G: TextGenerator>(generator: &G, config: &AssessConfig) -> Result<RunSummary, AppError> {
    let mut writer = JsonlWriter::create(&config.output)?;
    let mut summary = RunSummary::default();
    tracing::info!(
        "Starting assessment. Input: '{}', Output: '{}'",
        config.input.display(),
        config.output.display()
    );

    for entry in JsonlReader::open(&config.input)? {
        let (line_number, line) = entry?;
        let mut document = match parse_read_line(line_number, line) {
            Ok(doc) => doc,
            Err(placeholder) => {
                tracing::error!("Line {}: {}", line_number, placeholder.error);
                writer.write_record(&placeholder)?;
                summary.failed += 1;
                continue;
            }
        };

        for (idx, section) in document.content.iter_mut().enumerate() {
            tracing::info!("Scoring record {}, section {}...", line_number, idx + 1);
            match assess_section(generator, &config.sampling, section).await {
                SectionOutcome::Scored => summary.processed += 1,
                SectionOutcome::Degraded => {
                    summary.processed += 1;
                    summary.failed += 1;
                }
                SectionOutcome::Skipped => summary.skipped += 1,
            }
        }

        writer.write_record(&document)?;
    }

    Ok(summary)
}

/// Generates and parses the evaluation of one section, attaching `score_data`.
pub async fn assess_section<G: TextGenerator>(
    generator: &G,
    sampling: &SamplingParams,
    entry: &mut SectionEntry,
) -> SectionOutcome {
    let original = entry.section.content.trim();
    let generated = entry.summary_llm.as_deref().unwrap_or_default().trim();

    let skip_reason = if original.is_empty() {
        Some(STATUS_EMPTY_ORIGINAL)
    } else if generated.is_empty() {
        Some(STATUS_EMPTY_SUMMARY)
    } else {
        None
    };
    if let Some(reason) = skip_reason {
        tracing::info!("{}: {}", entry.section.title, reason);
        entry.score_data = Some(ScoreData::not_scored(reason));
        return SectionOutcome::Skipped;
    }

    let request = GenerationRequest {
        messages: scoring_messages(original, generated),
        sampling: sampling.clone(),
    };
    let raw_output = generate_or_sentinel(generator, &request).await;
    let record = extract(&raw_output);

    let (status, outcome) = if is_generation_failure(&raw_output) {
        (raw_output.clone(), SectionOutcome::Degraded)
    } else if record.parsing_error {
        (STATUS_INCOMPLETE.to_string(), SectionOutcome::Degraded)
    } else {
        (STATUS_SCORED.to_string(), SectionOutcome::Scored)
    };

    match outcome {
        SectionOutcome::Degraded => tracing::warn!("{}: {}", entry.section.title, status),
        _ => tracing::info!(
            "{}: scored, calculated total {}/25",
            entry.section.title,
            record.calculated_total
        ),
    }

    entry.score_data = Some(ScoreData { record, status_message: status });
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::score::{DeclaredTotal, DIMENSIONS};
    use crate::extractors::section::{Section, SectionRecord};
    use crate::llm::client::testing::ScriptedGenerator;
    use crate::storage::{parse_document_line, RecordError, INVALID_UTF8, MISSING_CONTENT_LIST};
    use crate::utils::error::GenerationError;
    use std::fs;

    fn evaluator_reply(scores: [u8; 5], total: u32) -> String {
        let mut out = String::new();
        for (i, (name, score)) in DIMENSIONS.iter().zip(scores).enumerate() {
            out.push_str(&format!("**{}. {}（评分：{}/5）** 评分理由：理由{}。\n\n", i + 1, name, score, i + 1));
        }
        out.push_str(&format!("**总评分：{total}/25**"));
        out
    }

    fn entry(content: &str, summary: Option<&str>) -> SectionEntry {
        let mut entry = SectionEntry::from(SectionRecord {
            content: content.to_string(),
            ..SectionRecord::new(Section::Financial)
        });
        entry.summary_llm = summary.map(str::to_string);
        entry
    }

    #[test]
    fn test_well_formed_reply_is_scored() {
        let generator = ScriptedGenerator::new(vec![Ok(evaluator_reply([4, 3, 5, 4, 3], 19))]);
        let mut section = entry("收入增长。\n", Some("收入稳步增长。"));

        let outcome = tokio_test::block_on(assess_section(&generator, &SamplingParams::scoring(), &mut section));
        assert_eq!(outcome, SectionOutcome::Scored);

        let data = section.score_data.unwrap();
        assert_eq!(data.status_message, STATUS_SCORED);
        assert_eq!(data.record.calculated_total, 19);
        assert_eq!(data.record.declared_total, Some(DeclaredTotal::Reported(19)));

        let requests = generator.requests.borrow();
        assert!(requests[0].messages[1].content.contains("收入稳步增长。"));
    }

    #[test]
    fn test_generation_failure_becomes_parse_failure() {
        let generator = ScriptedGenerator::new(vec![Err(GenerationError::MalformedResponse("no content".to_string()))]);
        let mut section = entry("收入增长。", Some("摘要"));

        let outcome = tokio_test::block_on(assess_section(&generator, &SamplingParams::scoring(), &mut section));
        assert_eq!(outcome, SectionOutcome::Degraded);

        let data = section.score_data.unwrap();
        assert!(data.record.parsing_error);
        assert!(is_generation_failure(&data.status_message));
        assert_eq!(data.record.raw_text, data.status_message);
        assert_eq!(data.record.declared_total, None);
    }

    #[test]
    fn test_empty_texts_are_not_sent() {
        let generator = ScriptedGenerator::new(Vec::new());
        let sampling = SamplingParams::scoring();

        let mut no_original = entry("   ", Some("摘要"));
        let mut no_summary = entry("正文", None);
        assert_eq!(
            tokio_test::block_on(assess_section(&generator, &sampling, &mut no_original)),
            SectionOutcome::Skipped
        );
        assert_eq!(
            tokio_test::block_on(assess_section(&generator, &sampling, &mut no_summary)),
            SectionOutcome::Skipped
        );
        assert_eq!(generator.calls(), 0);
        assert_eq!(no_original.score_data.unwrap().status_message, STATUS_EMPTY_ORIGINAL);
        let data = no_summary.score_data.unwrap();
        assert_eq!(data.status_message, STATUS_EMPTY_SUMMARY);
        assert!(!data.record.parsing_error);
    }

    #[test]
    fn test_run_writes_documents_and_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("summaries.jsonl");
        let output = dir.path().join("scored.jsonl");
        fs::write(
            &input,
            concat!(
                r#"{"filename":"a.docx","content":[{"title":"财务分析","content":"收入增长。","summary":"","summary_LLM":"收入稳步增长。"},"#,
                r#"{"title":"经营管理分析","content":"","summary":""}]}"#,
                "\n",
                r#"{"filename":"b.docx"}"#,
                "\n",
                "{oops\n",
            ),
        )
        .unwrap();

        // Dimension 3 missing: partial sum, parsing error.
        let partial = evaluator_reply([4, 3, 5, 4, 3], 19).replace("**3. 风险分析全面性（评分：5/5）**", "");
        let generator = ScriptedGenerator::new(vec![Ok(partial)]);
        let config = AssessConfig::new(input, output.clone(), SamplingParams::scoring()).unwrap();

        let summary = tokio_test::block_on(run(&generator, &config)).unwrap();
        assert_eq!(summary, RunSummary { processed: 1, skipped: 1, failed: 3 });

        let text = fs::read_to_string(&output).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);

        let doc = parse_document_line(1, lines[0]).unwrap();
        let data = doc.content[0].score_data.as_ref().unwrap();
        assert!(data.record.parsing_error);
        assert_eq!(data.record.score("风险分析全面性"), None);
        assert_eq!(data.record.calculated_total, 14);
        assert_eq!(data.status_message, STATUS_INCOMPLETE);

        let missing: RecordError = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(missing.error, MISSING_CONTENT_LIST);
        assert_eq!(missing.original_line_number, 2);
        let invalid: RecordError = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(invalid.original_line_number, 3);
    }

    #[test]
    fn test_run_continues_past_undecodable_line() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("summaries.jsonl");
        let output = dir.path().join("scored.jsonl");
        let valid = r#"{"filename":"a.docx","content":[{"title":"财务分析","content":"","summary":""}]}"#;
        let mut bytes = format!("{valid}\n").into_bytes();
        bytes.extend_from_slice(b"\xff\xfe broken\n");
        bytes.extend_from_slice(format!("{valid}\n").as_bytes());
        fs::write(&input, bytes).unwrap();

        let generator = ScriptedGenerator::new(vec![]);
        let config = AssessConfig::new(input, output.clone(), SamplingParams::scoring()).unwrap();

        let summary = tokio_test::block_on(run(&generator, &config)).unwrap();
        assert_eq!(summary, RunSummary { processed: 0, skipped: 2, failed: 1 });
        assert_eq!(generator.calls(), 0);

        let text = fs::read_to_string(&output).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        let placeholder: RecordError = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(placeholder.original_line_number, 2);
        assert_eq!(placeholder.error, INVALID_UTF8);
        assert_eq!(parse_document_line(3, lines[2]).unwrap().filename, "a.docx");
    }
}
