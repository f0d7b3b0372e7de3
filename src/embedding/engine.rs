//! Local sentence embeddings via a BERT model running on Candle
use anyhow::Context;
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_transformers::models::bert::BertModel;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::config::EmbeddingConfig;
use crate::embedding::loader::{load_bert, pad_batch};
use crate::embedding::Embedder;
use crate::errors::{PipelineError, Result};

struct Inner {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimensions: usize,
}

/// Sentence embedder: BERT forward pass, masked mean pooling, L2 normalization
#[derive(Clone)]
pub struct BertEmbedder {
    inner: Arc<Inner>,
}

impl BertEmbedder {
    /// Create new embedder (downloads model on first use)
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        // CPU only; kiosk hardware has no GPU
        let device = Device::Cpu;

        info!(model = %config.model_id, "Loading embedding model");
        let loaded = load_bert(&config.model_id, config.max_length, &device)
            .context("Failed to load embedding model")?;

        if loaded.config.hidden_size != config.dimensions {
            return Err(PipelineError::Config(format!(
                "embedding.dimensions is {} but {} produces {}",
                config.dimensions, config.model_id, loaded.config.hidden_size
            )));
        }

        Ok(Self {
            inner: Arc::new(Inner {
                model: loaded.model,
                tokenizer: loaded.tokenizer,
                device,
                dimensions: config.dimensions,
            }),
        })
    }

    /// Generate embeddings for multiple texts (batched for efficiency)
    pub fn embed_batch_blocking(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let inner = &self.inner;

        let encodings = inner
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| PipelineError::Embedding(format!("Tokenization failed: {}", e)))?;

        let ids: Vec<Vec<u32>> = encodings.iter().map(|e| e.get_ids().to_vec()).collect();
        let (flat_ids, flat_types, flat_mask, max_len) = pad_batch(&ids, &[]);
        let batch_size = texts.len();

        let token_ids = Tensor::from_vec(flat_ids, (batch_size, max_len), &inner.device)?;
        let token_type_ids = Tensor::from_vec(flat_types, (batch_size, max_len), &inner.device)?;
        let attention_mask = Tensor::from_vec(flat_mask, (batch_size, max_len), &inner.device)?;

        let hidden = inner
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))?;

        let pooled = Self::mean_pool(&hidden, &attention_mask)?;
        let normalized = Self::l2_normalize(&pooled)?;

        debug!(batch = batch_size, tokens = max_len, "Embedded batch");
        Ok(normalized.to_vec2::<f32>()?)
    }

    /// Mean pooling with attention mask
    fn mean_pool(hidden: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
        let mask = attention_mask
            .to_dtype(DType::F32)?
            .unsqueeze(2)?
            .broadcast_as(hidden.shape())?;

        let summed = (hidden * &mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
        summed.broadcast_div(&counts)
    }

    fn l2_normalize(pooled: &Tensor) -> candle_core::Result<Tensor> {
        let norms = pooled.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12, f64::MAX)?;
        pooled.broadcast_div(&norms)
    }
}

#[async_trait]
impl Embedder for BertEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let this = self.clone();
        let text = text.to_string();

        let task = tokio::task::spawn_blocking(move || this.embed_batch_blocking(&[text.as_str()]));
        let mut vectors = task
            .await
            .map_err(|e| PipelineError::Internal(format!("Embedding task panicked: {}", e)))?
            .map_err(|e| match e {
                PipelineError::Embedding(_) => e,
                other => PipelineError::Embedding(other.to_string()),
            })?;

        vectors
            .pop()
            .ok_or_else(|| PipelineError::Embedding("Model returned no vector".to_string()))
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Integration test - requires model download
    async fn test_embed_single_text() {
        let config = EmbeddingConfig::default();
        let engine = BertEmbedder::new(&config).expect("Failed to create engine");
        let embedding = engine.embed("Where is the library?").await.expect("Failed to embed");
        assert_eq!(embedding.len(), config.dimensions);

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[test]
    #[ignore] // Integration test - requires model download
    fn test_embed_batch() {
        let engine =
            BertEmbedder::new(&EmbeddingConfig::default()).expect("Failed to create engine");
        let embeddings = engine
            .embed_batch_blocking(&["Admissions", "Library", "Hostels"])
            .expect("Failed to embed batch");
        assert_eq!(embeddings.len(), 3);
    }

    #[test]
    #[ignore] // Integration test - requires model download
    fn test_embed_empty_batch() {
        let engine =
            BertEmbedder::new(&EmbeddingConfig::default()).expect("Failed to create engine");
        let embeddings = engine.embed_batch_blocking(&[]).expect("Failed to embed empty batch");
        assert!(embeddings.is_empty());
    }
}
