// Reranking stage: cross-encoder scoring with passthrough degradation
pub mod cross_encoder;
pub mod scorer;

use async_trait::async_trait;

use crate::errors::Result;

pub use cross_encoder::CandleCrossEncoder;
pub use scorer::{PassthroughReason, RerankOutcome, Reranker};

/// Relevance model scoring (query, document) pairs jointly
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    /// One score per document, in input order; higher is more relevant
    async fn score(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>>;
}
