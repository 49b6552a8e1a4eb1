// src/llm/models.rs
use serde::{Deserialize, Serialize};

/// One chat turn sent to the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Decoding parameters for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: Option<u32>,
    pub max_tokens: u32,
    pub stop: Vec<String>,
}

impl SamplingParams {
    /// Low-temperature, narrow nucleus for rubric scoring.
    pub fn scoring() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.3,
            top_k: Some(50),
            max_tokens: 4096,
            stop: vec!["<|im_end|>".to_string(), "<|endoftext|>".to_string()],
        }
    }

    /// Long-form summaries.
    pub fn summary() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.8,
            top_k: None,
            max_tokens: 20480,
            stop: Vec::new(),
        }
    }
}

/// What a pipeline asks the generator for; the client adds model and endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingParams,
}

/// Body of `POST {endpoint}/chat/completions` (OpenAI-compatible, as served by vLLM).
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
    pub top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub stop: &'a [String],
}

impl<'a> ChatCompletionRequest<'a> {
    pub fn new(model: &'a str, request: &'a GenerationRequest) -> Self {
        Self {
            model,
            messages: &request.messages,
            temperature: request.sampling.temperature,
            top_p: request.sampling.top_p,
            top_k: request.sampling.top_k,
            max_tokens: request.sampling.max_tokens,
            stop: &request.sampling.stop,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if the service returned one.
    pub fn first_content(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|c| c.message.content)
    }
}
