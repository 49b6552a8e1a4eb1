// src/config.rs
//! Validated run configuration.
//!
//! CLI arguments are collected by clap and turned into these structs once, at
//! startup; every pipeline receives its config explicitly.

use crate::llm::models::SamplingParams;
use crate::utils::AppError;
use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection settings for the generation service.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub endpoint: reqwest::Url,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Generation service arguments shared by `summarize` and `assess`.
#[derive(Args, Debug, Clone)]
pub struct GenerationArgs {
    /// Base URL of an OpenAI-compatible API (e.g. http://localhost:8000/v1)
    #[arg(long, env = "REVIEW_LLM_ENDPOINT")]
    pub endpoint: String,

    /// Model name passed to the endpoint
    #[arg(long, env = "REVIEW_LLM_MODEL")]
    pub model: String,

    /// Bearer token, if the endpoint requires one
    #[arg(long, env = "REVIEW_LLM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "600")]
    pub timeout_secs: u64,

    /// Override sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Override nucleus sampling threshold
    #[arg(long)]
    pub top_p: Option<f32>,

    /// Override the generation length limit
    #[arg(long)]
    pub max_tokens: Option<u32>,
}

impl GenerationArgs {
    pub fn to_config(&self) -> Result<GenerationConfig, AppError> {
        let endpoint = reqwest::Url::parse(self.endpoint.trim())
            .map_err(|e| AppError::Config(format!("Invalid endpoint '{}': {}", self.endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "Endpoint must be http or https, got '{}'",
                endpoint.scheme()
            )));
        }
        if self.model.trim().is_empty() {
            return Err(AppError::Config("Model name must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(AppError::Config("Timeout must be greater than zero".to_string()));
        }
        Ok(GenerationConfig {
            endpoint,
            model: self.model.trim().to_string(),
            api_key: self.api_key.clone().filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }

    /// Applies the overrides to `base` and validates the result.
    pub fn sampling(&self, base: SamplingParams) -> Result<SamplingParams, AppError> {
        let sampling = SamplingParams {
            temperature: self.temperature.unwrap_or(base.temperature),
            top_p: self.top_p.unwrap_or(base.top_p),
            max_tokens: self.max_tokens.unwrap_or(base.max_tokens),
            ..base
        };
        if !(0.0..=2.0).contains(&sampling.temperature) {
            return Err(AppError::Config(format!(
                "Temperature {} outside [0, 2]",
                sampling.temperature
            )));
        }
        if !(sampling.top_p > 0.0 && sampling.top_p <= 1.0) {
            return Err(AppError::Config(format!("top_p {} outside (0, 1]", sampling.top_p)));
        }
        if sampling.max_tokens == 0 {
            return Err(AppError::Config("max_tokens must be greater than zero".to_string()));
        }
        Ok(sampling)
    }
}

#[derive(Debug, Clone)]
pub struct SegmentConfig {
    pub input_dirs: Vec<PathBuf>,
    pub output: PathBuf,
}

impl SegmentConfig {
    pub fn new(input_dirs: Vec<PathBuf>, output: PathBuf) -> Result<Self, AppError> {
        if input_dirs.is_empty() {
            return Err(AppError::Config("At least one input folder is required".to_string()));
        }
        for dir in &input_dirs {
            require_dir(dir)?;
        }
        require_output(&output)?;
        Ok(Self { input_dirs, output })
    }
}

#[derive(Debug, Clone)]
pub struct SummarizeConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub template: PathBuf,
    pub sampling: SamplingParams,
}

impl SummarizeConfig {
    pub fn new(
        input: PathBuf,
        output: PathBuf,
        template: PathBuf,
        sampling: SamplingParams,
    ) -> Result<Self, AppError> {
        require_file(&input)?;
        require_file(&template)?;
        require_output(&output)?;
        require_distinct(&input, &output)?;
        Ok(Self { input, output, template, sampling })
    }
}

#[derive(Debug, Clone)]
pub struct AssessConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub sampling: SamplingParams,
}

impl AssessConfig {
    pub fn new(input: PathBuf, output: PathBuf, sampling: SamplingParams) -> Result<Self, AppError> {
        require_file(&input)?;
        require_output(&output)?;
        require_distinct(&input, &output)?;
        Ok(Self { input, output, sampling })
    }
}

#[derive(Debug, Clone)]
pub struct StatsConfig {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
}

impl StatsConfig {
    pub fn new(input: PathBuf, output: Option<PathBuf>) -> Result<Self, AppError> {
        require_file(&input)?;
        if let Some(out) = &output {
            require_output(out)?;
        }
        Ok(Self { input, output })
    }
}

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub generated: PathBuf,
    pub reference: PathBuf,
    pub output: PathBuf,
    pub instruction: String,
}

impl TrainConfig {
    pub fn new(
        generated: PathBuf,
        reference: PathBuf,
        output: PathBuf,
        instruction: String,
    ) -> Result<Self, AppError> {
        require_file(&generated)?;
        require_file(&reference)?;
        require_output(&output)?;
        if instruction.trim().is_empty() {
            return Err(AppError::Config("Instruction must not be empty".to_string()));
        }
        Ok(Self { generated, reference, output, instruction })
    }
}

fn require_file(path: &Path) -> Result<(), AppError> {
    if path.as_os_str().is_empty() {
        return Err(AppError::Config("Input file path must not be empty".to_string()));
    }
    if !path.is_file() {
        return Err(AppError::Config(format!("Input file not found: {}", path.display())));
    }
    Ok(())
}

fn require_dir(path: &Path) -> Result<(), AppError> {
    if !path.is_dir() {
        return Err(AppError::Config(format!("Input folder not found: {}", path.display())));
    }
    Ok(())
}

fn require_output(path: &Path) -> Result<(), AppError> {
    if path.as_os_str().is_empty() {
        return Err(AppError::Config("Output path must not be empty".to_string()));
    }
    if path.is_dir() {
        return Err(AppError::Config(format!("Output path is a directory: {}", path.display())));
    }
    Ok(())
}

fn require_distinct(input: &Path, output: &Path) -> Result<(), AppError> {
    if input == output {
        return Err(AppError::Config(format!(
            "Output would overwrite input: {}",
            input.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generation_args(endpoint: &str, model: &str) -> GenerationArgs {
        GenerationArgs {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key: Some(String::new()),
            timeout_secs: 30,
            temperature: None,
            top_p: None,
            max_tokens: None,
        }
    }

    #[test]
    fn test_generation_config_validation() {
        let config = generation_args("http://localhost:8000/v1", " qwen ").to_config().unwrap();
        assert_eq!(config.model, "qwen");
        assert_eq!(config.api_key, None);
        assert_eq!(config.timeout, Duration::from_secs(30));

        assert!(generation_args("not a url", "qwen").to_config().is_err());
        assert!(generation_args("ftp://host/v1", "qwen").to_config().is_err());
        assert!(generation_args("http://localhost:8000/v1", "  ").to_config().is_err());
    }

    #[test]
    fn test_sampling_overrides_and_bounds() {
        let mut args = generation_args("http://localhost:8000/v1", "qwen");
        args.temperature = Some(0.7);
        let sampling = args.sampling(SamplingParams::scoring()).unwrap();
        assert_eq!(sampling.temperature, 0.7);
        assert_eq!(sampling.top_k, Some(50));

        args.top_p = Some(0.0);
        assert!(args.sampling(SamplingParams::scoring()).is_err());

        args.top_p = None;
        args.temperature = Some(3.0);
        assert!(args.sampling(SamplingParams::summary()).is_err());
    }

    #[test]
    fn test_path_validation() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.jsonl");
        std::fs::write(&input, "").unwrap();
        let output = dir.path().join("out.jsonl");

        assert!(AssessConfig::new(input.clone(), output.clone(), SamplingParams::scoring()).is_ok());
        assert!(AssessConfig::new(input.clone(), input.clone(), SamplingParams::scoring()).is_err());
        assert!(AssessConfig::new(dir.path().join("missing.jsonl"), output.clone(), SamplingParams::scoring()).is_err());
        assert!(StatsConfig::new(input.clone(), Some(dir.path().to_path_buf())).is_err());

        assert!(SegmentConfig::new(vec![dir.path().to_path_buf()], output.clone()).is_ok());
        assert!(SegmentConfig::new(Vec::new(), output.clone()).is_err());
        assert!(SegmentConfig::new(vec![input.clone()], output).is_err());

        let reference = dir.path().join("ref.jsonl");
        std::fs::write(&reference, "").unwrap();
        assert!(TrainConfig::new(input.clone(), reference.clone(), dir.path().join("t.json"), " ".to_string()).is_err());
        assert!(TrainConfig::new(input, reference, dir.path().join("t.json"), "优化".to_string()).is_ok());
    }
}
