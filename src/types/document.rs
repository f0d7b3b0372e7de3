//! Knowledge-base records and the per-query values derived from them
//!
//! A [`Document`] belongs to the storage collaborator; the pipeline only
//! reads it. [`SearchResult`] and [`RerankedResult`] are produced fresh for
//! every query and never persisted.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Title rendered when a document carries none
pub const UNTITLED: &str = "Untitled";

/// Metadata attached to a knowledge-base document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Source URL or identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Information framework (Campus, Academic, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,
    /// Keys the pipeline does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            title: None,
            category: None,
            source: None,
            framework: None,
            tags: Vec::new(),
            language: default_language(),
            chunk_index: None,
            total_chunks: None,
            extra: BTreeMap::new(),
        }
    }
}

impl DocumentMetadata {
    /// Look up a metadata field by name as a string
    ///
    /// `tags` is not handled here since it is multi-valued; see [`Self::matches`].
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "title" => self.title.clone(),
            "category" => self.category.clone(),
            "source" => self.source.clone(),
            "framework" => self.framework.clone(),
            "language" => Some(self.language.clone()),
            "chunk_index" => self.chunk_index.map(|i| i.to_string()),
            "total_chunks" => self.total_chunks.map(|i| i.to_string()),
            other => self.extra.get(other).map(|value| match value {
                serde_json::Value::String(s) => s.clone(),
                v => v.to_string(),
            }),
        }
    }

    /// Exact-match every filter against this metadata
    ///
    /// A `tags` filter matches when any tag equals the value.
    pub fn matches(&self, filters: &BTreeMap<String, String>) -> bool {
        filters.iter().all(|(key, expected)| {
            if key == "tags" {
                self.tags.iter().any(|tag| tag == expected)
            } else {
                self.get(key).as_deref() == Some(expected.as_str())
            }
        })
    }
}

/// Immutable knowledge-base record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
}

impl Document {
    /// Title for attribution, falling back to [`UNTITLED`]
    pub fn title(&self) -> &str {
        self.metadata
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(UNTITLED)
    }
}

/// Document returned by similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub document: Document,
    /// Cosine similarity in [0, 1], 1.0 = identical
    pub similarity: f32,
    /// 1-based position in the retriever's output
    pub rank: usize,
}

/// Search result re-scored by the cross-encoder
///
/// `rerank_score` is only comparable with other scores from the same call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankedResult {
    pub result: SearchResult,
    pub rerank_score: f32,
}

/// Ordering for sorting scores high to low; NaN sorts after every number
pub fn descending_score(a: f32, b: f32) -> Ordering {
    let key = |score: f32| if score.is_nan() { f32::NEG_INFINITY } else { score };
    key(b).total_cmp(&key(a))
}

/// Ordered documents handed to the context assembler
///
/// The variant records which ordering is authoritative: a reranked list is
/// kept exactly as the reranker returned it, a similarity list may be
/// re-sorted by similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ordering", content = "documents", rename_all = "snake_case")]
pub enum RankedDocuments {
    Reranked(Vec<RerankedResult>),
    Similarity(Vec<SearchResult>),
}

impl RankedDocuments {
    pub fn len(&self) -> usize {
        match self {
            RankedDocuments::Reranked(docs) => docs.len(),
            RankedDocuments::Similarity(docs) => docs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this order came from a successful rerank
    pub fn is_authoritative(&self) -> bool {
        matches!(self, RankedDocuments::Reranked(_))
    }

    /// Documents with their applicable score, in the stored order
    pub fn scored(&self) -> Vec<(&Document, f32)> {
        match self {
            RankedDocuments::Reranked(docs) => docs
                .iter()
                .map(|r| (&r.result.document, r.rerank_score))
                .collect(),
            RankedDocuments::Similarity(docs) => {
                docs.iter().map(|r| (&r.document, r.similarity)).collect()
            }
        }
    }

    /// First document in the stored order
    pub fn top(&self) -> Option<&Document> {
        match self {
            RankedDocuments::Reranked(docs) => docs.first().map(|r| &r.result.document),
            RankedDocuments::Similarity(docs) => docs.first().map(|r| &r.document),
        }
    }
}
