//! Type definitions module
//!
//! Shared data model for the answer pipeline.

pub mod conversation;
pub mod document;

// Re-export commonly used types
pub use conversation::{ConversationTurn, Role};
pub use document::{
    descending_score, Document, DocumentMetadata, RankedDocuments, RerankedResult, SearchResult,
    UNTITLED,
};
