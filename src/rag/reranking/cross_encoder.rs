//! Cross-encoder relevance model on Candle
//!
//! A BERT sequence-classification checkpoint (e.g. ms-marco MiniLM) scores
//! each (query, document) pair jointly: encoder, pooler over `[CLS]`, then a
//! single-logit classifier head. Higher logits mean more relevant.

use anyhow::Context;
use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::{Linear, Module};
use candle_transformers::models::bert::BertModel;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::config::RerankerConfig;
use crate::embedding::loader::{load_bert, pad_batch};
use crate::errors::{PipelineError, Result};
use crate::rag::reranking::CrossEncoder;

struct Inner {
    model: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
}

#[derive(Clone)]
pub struct CandleCrossEncoder {
    inner: Arc<Inner>,
}

impl CandleCrossEncoder {
    /// Load the cross-encoder named by `config.model_id` (downloads on first use)
    pub fn new(config: &RerankerConfig) -> Result<Self> {
        let device = Device::Cpu;

        info!(model = %config.model_id, "Loading cross-encoder");
        let loaded = load_bert(&config.model_id, config.max_length, &device)
            .context("Failed to load cross-encoder model")?;

        let hidden = loaded.config.hidden_size;
        let bert = loaded.vars.pp("bert");
        let pooler = candle_nn::linear(hidden, hidden, bert.pp("pooler").pp("dense"))
            .context("Failed to load pooler weights")?;
        let classifier = candle_nn::linear(hidden, 1, loaded.vars.pp("classifier"))
            .context("Failed to load classifier head")?;

        Ok(Self {
            inner: Arc::new(Inner {
                model: loaded.model,
                pooler,
                classifier,
                tokenizer: loaded.tokenizer,
                device,
            }),
        })
    }

    /// Score pairs synchronously; call from a blocking context
    pub fn score_blocking(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let inner = &self.inner;

        let pairs: Vec<(&str, &str)> = documents.iter().map(|doc| (query, *doc)).collect();
        let encodings = inner
            .tokenizer
            .encode_batch(pairs, true)
            .map_err(|e| PipelineError::Rerank(format!("Tokenization failed: {}", e)))?;

        let ids: Vec<Vec<u32>> = encodings.iter().map(|e| e.get_ids().to_vec()).collect();
        let types: Vec<Vec<u32>> = encodings.iter().map(|e| e.get_type_ids().to_vec()).collect();
        let (flat_ids, flat_types, flat_mask, max_len) = pad_batch(&ids, &types);
        let batch_size = documents.len();

        let token_ids = Tensor::from_vec(flat_ids, (batch_size, max_len), &inner.device)?;
        let token_type_ids = Tensor::from_vec(flat_types, (batch_size, max_len), &inner.device)?;
        let attention_mask = Tensor::from_vec(flat_mask, (batch_size, max_len), &inner.device)?;

        let hidden = inner
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))?;

        // [CLS] token -> pooler (tanh) -> relevance logit
        let cls = hidden.narrow(1, 0, 1)?.squeeze(1)?;
        let pooled = inner.pooler.forward(&cls)?.tanh()?;
        let logits = inner.classifier.forward(&pooled)?.squeeze(1)?;

        debug!(pairs = batch_size, tokens = max_len, "Scored pairs");
        Ok(logits.to_vec1::<f32>()?)
    }
}

#[async_trait]
impl CrossEncoder for CandleCrossEncoder {
    async fn score(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>> {
        let this = self.clone();
        let query = query.to_string();
        let documents: Vec<String> = documents.iter().map(|d| d.to_string()).collect();

        tokio::task::spawn_blocking(move || {
            let docs: Vec<&str> = documents.iter().map(String::as_str).collect();
            this.score_blocking(&query, &docs)
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("Rerank task panicked: {}", e)))?
        .map_err(|e| match e {
            PipelineError::Rerank(_) => e,
            other => PipelineError::Rerank(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Integration test - requires model download
    fn test_relevant_document_scores_higher() {
        let encoder =
            CandleCrossEncoder::new(&RerankerConfig::default()).expect("Failed to load model");
        let scores = encoder
            .score_blocking(
                "When does the library open?",
                &[
                    "Hostel rooms are allocated in August.",
                    "The library opens at 8 AM on weekdays.",
                ],
            )
            .expect("Failed to score");

        assert_eq!(scores.len(), 2);
        assert!(scores[1] > scores[0]);
    }

    #[tokio::test]
    #[ignore] // Integration test - requires model download
    async fn test_score_empty_documents() {
        let encoder =
            CandleCrossEncoder::new(&RerankerConfig::default()).expect("Failed to load model");
        let scores = encoder.score("anything", &[]).await.expect("Failed to score");
        assert!(scores.is_empty());
    }
}
