// src/llm/mod.rs
pub mod client;
pub mod models;
pub mod prompts;

#[allow(unused_imports)]
pub use client::{generate_or_sentinel, ChatClient, TextGenerator};
#[allow(unused_imports)]
pub use models::{ChatMessage, GenerationRequest, SamplingParams};
