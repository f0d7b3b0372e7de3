//! Text embedding
//!
//! The pipeline treats the embedder as a pure function `embed(text) -> vector`.
//! [`BertEmbedder`] is the local implementation; tests substitute their own.

pub mod engine;
pub mod loader;

use async_trait::async_trait;

use crate::errors::Result;

pub use engine::BertEmbedder;

/// A model that turns text into a fixed-length vector
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this embedder produces
    fn dimensions(&self) -> usize;
}

/// Cosine similarity between two vectors, 0.0 if either has zero magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
