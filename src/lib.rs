//! kioskrag - retrieval-augmented question answering for a campus kiosk
//!
//! # Architecture
//!
//! A question flows through six stages, each producing a new typed value:
//!
//! - **Embedding**: query text to a dense vector (`embedding`)
//! - **Retrieval**: similarity search over the knowledge base (`rag::retrieval`, `store`)
//! - **Reranking**: optional cross-encoder reordering (`rag::reranking`)
//! - **Context**: budgeted, source-attributed blocks (`rag::context`)
//! - **Prompt**: instruction, context, recent turns, question (`rag::prompt`)
//! - **Generation**: completion backend with extractive fallback (`generation`)
//!
//! [`rag::RagPipeline`] wires the stages and always produces an answer.

pub mod errors;
pub mod types;

// Configuration and logging
pub mod config;
pub mod logging;

// Pipeline stages
pub mod embedding;
pub mod store;
pub mod rag;
pub mod generation;

// Session state and CLI
pub mod session;
pub mod cli;

// Re-export commonly used types
pub use config::Config;
pub use errors::{PipelineError, Result};
pub use rag::{PipelineAnswer, RagPipeline};
