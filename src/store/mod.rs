//! Vector-similarity search contract consumed by the retriever
//!
//! Index internals live behind [`VectorSearch`]; the pipeline only sends an
//! embedding plus optional filters and reads back ranked documents.

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::Result;
use crate::types::SearchResult;

pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantVectorStore;

/// One similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub embedding: Vec<f32>,
    pub k: usize,
    /// Exact-match metadata filters
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    /// Minimum similarity, applied by backends that support it natively
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
}

/// Summary of the knowledge base behind a store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_documents: u64,
    pub categories: Vec<String>,
    pub unique_sources: usize,
}

/// A vector store answering similarity queries
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Up to `k` documents ordered by descending similarity, ranks from 1
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>>;

    /// Document counts for diagnostics
    async fn stats(&self) -> Result<StoreStats>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Map cosine similarity from [-1, 1] onto [0, 1]
pub fn normalize_similarity(cosine: f32) -> f32 {
    ((cosine + 1.0) / 2.0).clamp(0.0, 1.0)
}
