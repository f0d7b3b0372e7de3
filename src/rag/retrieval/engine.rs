// Retrieval engine: query embedding + vector similarity search
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::embedding::Embedder;
use crate::errors::{PipelineError, Result};
use crate::store::{SearchRequest, VectorSearch};
use crate::types::{descending_score, SearchResult};

/// First pipeline stage: embeds the query once and asks the vector store
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorSearch>,
}

impl Retriever {
    /// Create new retriever
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorSearch>) -> Self {
        Self { embedder, store }
    }

    /// Search for up to `k` documents similar to `query`
    ///
    /// Results are ordered by descending similarity with storage order
    /// breaking ties, and ranked from 1. A threshold that filters out every
    /// candidate yields an empty list, not an error.
    #[instrument(skip(self, filters), fields(store = self.store.name()))]
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filters: Option<&BTreeMap<String, String>>,
        similarity_threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(query).await.map_err(|e| match e {
            PipelineError::Embedding(_) => e,
            other => PipelineError::Embedding(other.to_string()),
        })?;

        if embedding.len() != self.embedder.dimensions() {
            return Err(PipelineError::Embedding(format!(
                "expected {} dimensions, got {}",
                self.embedder.dimensions(),
                embedding.len()
            )));
        }

        let request = SearchRequest {
            embedding,
            k,
            filters: filters.cloned().unwrap_or_default(),
            similarity_threshold,
        };

        let candidates = self.store.search(&request).await.map_err(|e| match e {
            PipelineError::Retrieval(_) => e,
            other => PipelineError::Retrieval(other.to_string()),
        })?;

        let results = Self::finalize(candidates, k, similarity_threshold);
        if results.is_empty() {
            warn!("No documents matched the query");
        } else {
            debug!(
                results = results.len(),
                top_similarity = results[0].similarity,
                "Retrieved documents"
            );
        }
        Ok(results)
    }

    /// Threshold post-filter, stable descending sort, truncation and re-ranking
    fn finalize(
        mut candidates: Vec<SearchResult>,
        k: usize,
        similarity_threshold: Option<f32>,
    ) -> Vec<SearchResult> {
        if let Some(threshold) = similarity_threshold {
            candidates.retain(|r| r.similarity >= threshold);
        }

        // Backends already return descending order; the stable sort only
        // repairs misbehaving ones without disturbing ties.
        candidates.sort_by(|a, b| descending_score(a.similarity, b.similarity));
        candidates.truncate(k);

        for (idx, result) in candidates.iter_mut().enumerate() {
            result.rank = idx + 1;
        }
        candidates
    }

}
