//! Configuration management for kioskrag
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.kioskrag/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{PipelineError, Result};

/// Environment variable overriding `generation.server_url`
pub const GENERATION_URL_ENV: &str = "KIOSKRAG_GENERATION_URL";

/// Complete configuration for the answer pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub reranker: RerankerConfig,
    pub context: ContextConfig,
    pub generation: GenerationConfig,
    pub session: SessionConfig,
    pub vector_store: VectorStoreConfig,
    pub logging: LoggingConfig,
}

/// Query embedding model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// HuggingFace model id of a BERT sentence-embedding model
    pub model_id: String,
    /// Expected vector length
    pub dimensions: usize,
    /// Tokens beyond this are truncated before inference
    pub max_length: usize,
}

/// First-stage similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates fetched from the vector store (over-fetch for the reranker)
    pub initial_k: usize,
    /// Documents kept after reranking
    pub final_top_k: usize,
    /// Minimum similarity post-filter
    pub similarity_threshold: Option<f32>,
    /// Fetch only `final_top_k` candidates when the reranker is unavailable
    pub reduce_fanout_without_reranker: bool,
}

/// Cross-encoder reranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    pub enabled: bool,
    pub model_id: String,
    pub max_length: usize,
}

/// Context assembly budgets (characters)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub char_budget: usize,
    pub per_document_chars: usize,
}

/// Generation backend and sampling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub server_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub repeat_penalty: f32,
    pub stop: Vec<String>,
    pub request_timeout_secs: u64,
    pub health_timeout_secs: u64,
}

/// Conversation history bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// User/assistant exchanges kept; the turn cap is twice this
    pub max_history_exchanges: usize,
}

/// Which vector store backend serves similarity search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// In-process store loaded from a JSON snapshot
    Memory,
    Qdrant,
}

/// Vector store connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: VectorBackend,
    pub qdrant_url: String,
    pub collection: String,
    /// JSON knowledge-base snapshot for the memory backend
    pub snapshot_path: String,
}

/// Log output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    pub json: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
            max_length: 256,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            initial_k: 20,
            final_top_k: 5,
            similarity_threshold: None,
            reduce_fanout_without_reranker: false,
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_id: "cross-encoder/ms-marco-MiniLM-L-6-v2".to_string(),
            max_length: 512,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            char_budget: 1500,
            per_document_chars: 600,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            max_tokens: 200,
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.15,
            stop: default_stop_sequences(),
            request_timeout_secs: 30,
            health_timeout_secs: 2,
        }
    }
}

/// Role markers and section delimiters the backend must stop on
pub fn default_stop_sequences() -> Vec<String> {
    ["User:", "Assistant:", "Question:", "\n\n\n", "==="]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history_exchanges: 10,
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Memory,
            qdrant_url: "http://localhost:6334".to_string(),
            collection: "knowledge_documents".to_string(),
            snapshot_path: "~/.kioskrag/knowledge_base.json".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl GenerationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

impl SessionConfig {
    /// Maximum number of turns kept in history
    pub fn max_turns(&self) -> usize {
        self.max_history_exchanges * 2
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(config_path) = path {
            Self::load_from_file(&config_path)?
        } else {
            Self::load_default()?
        };

        if let Ok(url) = std::env::var(GENERATION_URL_ENV) {
            if !url.trim().is_empty() {
                config.generation.server_url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Standard configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".kioskrag").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimensions == 0 {
            return Err(PipelineError::Config(
                "embedding.dimensions must be greater than 0".to_string(),
            ));
        }

        if self.retrieval.final_top_k == 0 {
            return Err(PipelineError::Config(
                "retrieval.final_top_k must be greater than 0".to_string(),
            ));
        }

        if self.retrieval.initial_k < self.retrieval.final_top_k {
            return Err(PipelineError::Config(
                "retrieval.initial_k must be at least retrieval.final_top_k".to_string(),
            ));
        }

        if let Some(threshold) = self.retrieval.similarity_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(PipelineError::Config(
                    "retrieval.similarity_threshold must be between 0.0 and 1.0".to_string(),
                ));
            }
        }

        if self.context.char_budget == 0 || self.context.per_document_chars == 0 {
            return Err(PipelineError::Config(
                "context budgets must be greater than 0".to_string(),
            ));
        }

        if self.context.per_document_chars > self.context.char_budget {
            return Err(PipelineError::Config(
                "context.per_document_chars must not exceed context.char_budget".to_string(),
            ));
        }

        if self.generation.server_url.trim().is_empty() {
            return Err(PipelineError::Config(
                "generation.server_url must not be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(PipelineError::Config(
                "generation.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.generation.top_p) || self.generation.top_p == 0.0 {
            return Err(PipelineError::Config(
                "generation.top_p must be in (0.0, 1.0]".to_string(),
            ));
        }

        if self.generation.max_tokens == 0 {
            return Err(PipelineError::Config(
                "generation.max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.generation.request_timeout_secs == 0 || self.generation.health_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "generation timeouts must be greater than 0".to_string(),
            ));
        }

        if self.session.max_history_exchanges == 0 {
            return Err(PipelineError::Config(
                "session.max_history_exchanges must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PipelineError::Config(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| PipelineError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Knowledge-base snapshot path for the memory backend
    pub fn snapshot_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.snapshot_path)
    }
}
