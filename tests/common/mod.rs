//! Shared fixtures: a keyword embedder and a three-document campus knowledge base

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kioskrag::config::Config;
use kioskrag::embedding::Embedder;
use kioskrag::errors::{PipelineError, Result};
use kioskrag::generation::GenerationClient;
use kioskrag::rag::{CrossEncoder, RagPipeline, Reranker};
use kioskrag::store::{InMemoryVectorStore, SearchRequest, StoreStats, VectorSearch};
use kioskrag::types::{Document, DocumentMetadata, SearchResult};

/// Topic axes: admissions, library, hostels
const TOPICS: [&[&str]; 3] = [
    &["apply", "admission", "application", "enrol"],
    &["library", "book", "borrow", "study"],
    &["hostel", "room", "accommodation", "dorm"],
];

/// Maps text onto topic axes by keyword; a small floor keeps vectors non-zero
pub struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        Ok(TOPICS
            .iter()
            .map(|words| {
                let hits = words.iter().filter(|w| lower.contains(*w)).count();
                hits as f32 + 0.05
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        3
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(PipelineError::Embedding("model offline".to_string()))
    }

    fn dimensions(&self) -> usize {
        3
    }
}

pub struct FailingStore;

#[async_trait]
impl VectorSearch for FailingStore {
    async fn search(&self, _request: &SearchRequest) -> Result<Vec<SearchResult>> {
        Err(PipelineError::Retrieval("connection refused".to_string()))
    }

    async fn stats(&self) -> Result<StoreStats> {
        Err(PipelineError::Retrieval("connection refused".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Wraps a store and records the `k` of every request
pub struct CountingStore {
    pub inner: InMemoryVectorStore,
    pub last_k: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: InMemoryVectorStore) -> Self {
        Self {
            inner,
            last_k: AtomicUsize::new(0),
        }
    }

    pub fn last_k(&self) -> usize {
        self.last_k.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorSearch for CountingStore {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        self.last_k.store(request.k, Ordering::SeqCst);
        self.inner.search(request).await
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.inner.stats().await
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// Scores documents in the reverse of their input order
pub struct ReversingEncoder;

#[async_trait]
impl CrossEncoder for ReversingEncoder {
    async fn score(&self, _query: &str, documents: &[&str]) -> Result<Vec<f32>> {
        Ok((0..documents.len()).map(|i| i as f32).collect())
    }
}

pub struct FailingEncoder;

#[async_trait]
impl CrossEncoder for FailingEncoder {
    async fn score(&self, _query: &str, _documents: &[&str]) -> Result<Vec<f32>> {
        Err(PipelineError::Rerank("inference crashed".to_string()))
    }
}

pub fn document(
    id: &str,
    title: &str,
    category: &str,
    content: &str,
    embedding: Vec<f32>,
) -> Document {
    Document {
        id: id.to_string(),
        content: content.to_string(),
        metadata: DocumentMetadata {
            title: Some(title.to_string()),
            category: Some(category.to_string()),
            source: Some(format!("https://campus.example/{}", id)),
            ..Default::default()
        },
        embedding,
    }
}

/// Admissions, Library, Hostels with one-hot topic embeddings
pub fn campus_documents() -> Vec<Document> {
    vec![
        document(
            "admissions",
            "Admissions",
            "Admissions",
            "Apply online through the admissions portal before 30 June. Upload transcripts and a photo ID.",
            vec![1.0, 0.0, 0.0],
        ),
        document(
            "library",
            "Library",
            "Library",
            "The main library opens at 8 AM and closes at 10 PM on weekdays. Students may borrow ten books.",
            vec![0.0, 1.0, 0.0],
        ),
        document(
            "hostels",
            "Hostels",
            "Accommodation",
            "Hostel rooms are allocated in August. Apply for a room through the accommodation office.",
            vec![0.0, 0.0, 1.0],
        ),
    ]
}

pub fn campus_store() -> InMemoryVectorStore {
    InMemoryVectorStore::from_documents(campus_documents())
}

/// Config pointing generation at `server_url`
pub fn test_config(server_url: &str) -> Config {
    let mut config = Config::default();
    config.generation.server_url = server_url.to_string();
    config.retrieval.initial_k = 3;
    config.retrieval.final_top_k = 2;
    config
}

/// Client that never touches the network
pub fn offline_generator(config: &Config) -> GenerationClient {
    let client = GenerationClient::new(&config.generation).expect("client");
    client.mark_uninitialized();
    client
}

pub fn pipeline(
    config: &Config,
    store: Arc<dyn VectorSearch>,
    reranker: Reranker,
    generator: GenerationClient,
) -> RagPipeline {
    RagPipeline::new(config, Arc::new(KeywordEmbedder), store, reranker, generator)
}

pub fn no_filters() -> BTreeMap<String, String> {
    BTreeMap::new()
}
