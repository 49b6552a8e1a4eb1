// src/main.rs
mod config;
mod extractors;
mod llm;
mod pipeline;
mod storage;
mod utils;

use clap::{Parser, Subcommand};
use config::{AssessConfig, GenerationArgs, SegmentConfig, StatsConfig, SummarizeConfig, TrainConfig};
use llm::{ChatClient, SamplingParams};
use std::path::PathBuf;
use utils::AppError;

/// Command Line Interface for the review report section / score extractor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Debug-level logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split every .docx report in the given folders into sections (JSONL output)
    Segment {
        /// Folders containing .docx reports
        #[arg(required = true)]
        input_dirs: Vec<PathBuf>,

        /// Output JSONL file (truncated first)
        #[arg(short, long, default_value = "./output/sections.jsonl")]
        output: PathBuf,
    },

    /// Generate a summary for each section with content
    Summarize {
        /// Segmented JSONL input
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSONL file
        #[arg(short, long)]
        output: PathBuf,

        /// Prompt template file; section title and text are appended to it
        #[arg(short, long)]
        template: PathBuf,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    /// Score each generated summary against its source section
    Assess {
        /// Summarized JSONL input
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSONL file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    /// Print score statistics for an assessed JSONL file
    Stats {
        /// Assessed JSONL input
        #[arg(short, long)]
        input: PathBuf,

        /// Also write the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build instruction-tuning examples from generated and reference summaries
    Train {
        /// Assessed JSONL with generated summaries and scores
        #[arg(short, long)]
        generated: PathBuf,

        /// JSONL whose summary_LLM fields are the reference summaries
        #[arg(short, long)]
        reference: PathBuf,

        /// Output JSON file
        #[arg(short, long)]
        output: PathBuf,

        /// Instruction text for every example
        #[arg(long, default_value = pipeline::train::DEFAULT_INSTRUCTION)]
        instruction: String,
    },
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Segment { .. } => "segment",
        Command::Summarize { .. } => "summarize",
        Command::Assess { .. } => "assess",
        Command::Stats { .. } => "stats",
        Command::Train { .. } => "train",
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments
    let args = Args::parse();

    // 2. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging(args.verbose);
    tracing::info!("Starting {}", command_name(&args.command));

    // 3. Validate configuration and dispatch
    let summary = match args.command {
        Command::Segment { input_dirs, output } => {
            let config = SegmentConfig::new(input_dirs, output)?;
            let summary = pipeline::segment::run(&config)?;
            summary.log("Segmentation");
            if summary.processed == 0 && summary.failed > 0 {
                return Err(AppError::Processing(format!(
                    "Failed to read any of {} documents",
                    summary.failed
                )));
            }
            summary
        }
        Command::Summarize { input, output, template, generation } => {
            let sampling = generation.sampling(SamplingParams::summary())?;
            let config = SummarizeConfig::new(input, output, template, sampling)?;
            let client = ChatClient::new(&generation.to_config()?)?;
            let summary = pipeline::summarize::run(&client, &config).await?;
            summary.log("Summarization");
            summary
        }
        Command::Assess { input, output, generation } => {
            let sampling = generation.sampling(SamplingParams::scoring())?;
            let config = AssessConfig::new(input, output, sampling)?;
            let client = ChatClient::new(&generation.to_config()?)?;
            let summary = pipeline::assess::run(&client, &config).await?;
            summary.log("Assessment");
            summary
        }
        Command::Stats { input, output } => {
            let config = StatsConfig::new(input, output)?;
            let report = pipeline::stats::run(&config)?;
            print!("{}", pipeline::stats::render(&report));
            return Ok(());
        }
        Command::Train { generated, reference, output, instruction } => {
            let config = TrainConfig::new(generated, reference, output, instruction)?;
            let count = pipeline::train::run(&config)?;
            tracing::info!("Training set written to {} ({} examples)", config.output.display(), count);
            return Ok(());
        }
    };

    tracing::debug!("Run summary: {:?}", summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_assess_arguments_parse() {
        let args = Args::try_parse_from([
            "review_extractor",
            "assess",
            "--input",
            "in.jsonl",
            "--output",
            "out.jsonl",
            "--endpoint",
            "http://localhost:8000/v1",
            "--model",
            "qwen",
            "--temperature",
            "0.2",
        ])
        .unwrap();
        match args.command {
            Command::Assess { generation, .. } => {
                assert_eq!(generation.model, "qwen");
                assert_eq!(generation.temperature, Some(0.2));
                assert_eq!(generation.timeout_secs, 600);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
