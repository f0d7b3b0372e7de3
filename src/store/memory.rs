//! In-memory vector store using cosine similarity
//!
//! Documents are kept in insertion order, which doubles as the storage order
//! used to break similarity ties. Suitable for a kiosk-sized knowledge base
//! loaded from a JSON snapshot, and for tests.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::embedding::{cosine_similarity, Embedder};
use crate::errors::{PipelineError, Result};
use crate::store::{normalize_similarity, SearchRequest, StoreStats, VectorSearch};
use crate::types::{descending_score, Document, SearchResult};

/// In-process store, safe to share across concurrent requests
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    documents: RwLock<Vec<Document>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-embedded documents in the given order
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Append a document; documents with an existing id are replaced in place
    pub async fn upsert(&self, document: Document) {
        let mut documents = self.documents.write().await;
        match documents.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => documents.push(document),
        }
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Load a JSON array of documents, embedding any that arrive without a vector
    pub async fn load_snapshot(path: &Path, embedder: &dyn Embedder) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        let mut documents: Vec<Document> = serde_json::from_str(&contents)?;

        let mut embedded = 0usize;
        for document in &mut documents {
            if document.embedding.is_empty() {
                document.embedding = embedder.embed(&document.content).await?;
                embedded += 1;
            }
        }

        info!(
            path = %path.display(),
            documents = documents.len(),
            embedded,
            "Loaded knowledge base snapshot"
        );
        Ok(Self::from_documents(documents))
    }
}

#[async_trait]
impl VectorSearch for InMemoryVectorStore {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let documents = self.documents.read().await;

        let mut scored = Vec::new();
        for document in documents.iter() {
            if !document.metadata.matches(&request.filters) {
                continue;
            }
            if document.embedding.len() != request.embedding.len() {
                return Err(PipelineError::Retrieval(format!(
                    "document '{}' has {} dimensions, query has {}",
                    document.id,
                    document.embedding.len(),
                    request.embedding.len()
                )));
            }
            let similarity =
                normalize_similarity(cosine_similarity(&document.embedding, &request.embedding));
            if request
                .similarity_threshold
                .is_some_and(|threshold| similarity < threshold)
            {
                continue;
            }
            scored.push((document, similarity));
        }

        // Stable sort keeps storage order for equal scores
        scored.sort_by(|a, b| descending_score(a.1, b.1));
        scored.truncate(request.k);

        debug!(candidates = scored.len(), k = request.k, "In-memory search complete");

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(idx, (document, similarity))| SearchResult {
                document: document.clone(),
                similarity,
                rank: idx + 1,
            })
            .collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let documents = self.documents.read().await;
        let categories: BTreeSet<String> = documents
            .iter()
            .filter_map(|d| d.metadata.category.clone())
            .collect();
        let sources: BTreeSet<&str> = documents
            .iter()
            .filter_map(|d| d.metadata.source.as_deref())
            .collect();

        Ok(StoreStats {
            total_documents: documents.len() as u64,
            categories: categories.into_iter().collect(),
            unique_sources: sources.len(),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
