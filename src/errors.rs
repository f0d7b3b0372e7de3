//! Error types for the kiosk answer pipeline
//!
//! Each stage reports failures through [`PipelineError`]. The orchestrator
//! decides which variants degrade (retrieval, rerank, generation) and which
//! abort the request with an apology (embedding).

use thiserror::Error;

/// Main error type for the retrieval-augmented answer pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Query could not be embedded
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Vector store unreachable or returned an error
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// Cross-encoder scoring failed
    #[error("Reranking failed: {0}")]
    Rerank(String),

    /// Generation backend did not answer within the bounded wait
    #[error("Generation timed out after {duration_ms}ms")]
    GenerationTimeout { duration_ms: u64 },

    /// Generation backend answered with a non-2xx status
    #[error("Generation server error (HTTP {status}): {message}")]
    GenerationServer { status: u16, message: String },

    /// Generation backend unreachable or marked uninitialized
    #[error("Generation backend unavailable: {0}")]
    GenerationUnavailable(String),

    /// Local model loading or inference errors
    #[error("Model error: {0}")]
    Model(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything not modeled above
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// True for the generation failures that degrade to the extractive answer
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            PipelineError::GenerationTimeout { .. }
                | PipelineError::GenerationServer { .. }
                | PipelineError::GenerationUnavailable(_)
        )
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Convert anyhow errors (model loading helpers) to PipelineError
impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Model(format!("{:#}", err))
    }
}

impl From<candle_core::Error> for PipelineError {
    fn from(err: candle_core::Error) -> Self {
        PipelineError::Model(err.to_string())
    }
}
