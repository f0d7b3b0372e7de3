//! Wire and result types for the completion backend
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;

/// Sampling parameters sent with every completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub repeat_penalty: f32,
    pub stop: Vec<String>,
}

impl From<&GenerationConfig> for GenerationParams {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            repeat_penalty: config.repeat_penalty,
            stop: config.stop.clone(),
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

/// `POST /v1/completions` body
#[derive(Debug, Serialize)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    #[serde(flatten)]
    pub params: &'a GenerationParams,
    pub stream: bool,
}

/// `POST /v1/completions` response
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// A successful completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Text exactly as the backend returned it
    pub raw: String,
    /// Text after post-processing; may be empty
    pub text: String,
}

/// Advisory view of the backend, updated by health checks and calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BackendState {
    Unknown = 0,
    Healthy = 1,
    Unavailable = 2,
}

impl BackendState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => BackendState::Healthy,
            2 => BackendState::Unavailable,
            _ => BackendState::Unknown,
        }
    }
}

/// Where the text of an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// Model completion
    Generated,
    /// Quoted from the top retrieved document
    Extractive,
    /// Fixed message; nothing could be generated or quoted
    Apology,
}

/// Answer text plus its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    pub text: String,
    pub source: AnswerSource,
}

impl GeneratedAnswer {
    pub fn new(text: impl Into<String>, source: AnswerSource) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}
