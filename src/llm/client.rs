// src/llm/client.rs
use crate::config::GenerationConfig;
use crate::extractors::score::GENERATION_FAILURE_MARKER;
use crate::llm::models::{ChatCompletionRequest, ChatCompletionResponse, GenerationRequest};
use crate::utils::error::GenerationError;
use reqwest::header;

const USER_AGENT: &str = concat!("review_extractor/", env!("CARGO_PKG_VERSION"));

/// Anything that turns a chat request into generated text.
#[allow(async_fn_in_trait)]
pub trait TextGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct ChatClient {
    http: reqwest::Client,
    completions_url: String,
    model: String,
    api_key: Option<String>,
}

/// Creates a reqwest client configured for the generation service.
fn build_http_client(config: &GenerationConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout)
        .build()
}

impl ChatClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let http = build_http_client(config)?;
        let completions_url = format!(
            "{}/chat/completions",
            config.endpoint.as_str().trim_end_matches('/')
        );
        tracing::debug!("Generation endpoint: {} (model {})", completions_url, config.model);
        Ok(Self {
            http,
            completions_url,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

impl TextGenerator for ChatClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = ChatCompletionRequest::new(&self.model, request);

        let mut builder = self
            .http
            .post(&self.completions_url)
            .header(header::ACCEPT, "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?; // Propagates reqwest::Error as GenerationError::Network

        let status = response.status();
        if !status.is_success() {
            tracing::error!("HTTP error status: {} from {}", status, self.completions_url);
            return Err(GenerationError::Http(status));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .first_content()
            .ok_or_else(|| GenerationError::MalformedResponse("no choices[0].message.content".to_string()))
    }
}

/// Runs one generation, folding any failure into a sentinel string the
/// score extractor recognises.
pub async fn generate_or_sentinel<G: TextGenerator>(generator: &G, request: &GenerationRequest) -> String {
    match generator.generate(request).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            tracing::error!("Generation returned empty output");
            format!("{GENERATION_FAILURE_MARKER}：输出为空或格式不正确")
        }
        Err(e) => {
            tracing::error!("Generation failed: {}", e);
            format!("{GENERATION_FAILURE_MARKER}: {e}")
        }
    }
}
