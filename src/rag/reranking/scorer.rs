// Reranker: reorders retrieval candidates by cross-encoder relevance
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::rag::reranking::CrossEncoder;
use crate::types::{descending_score, RankedDocuments, RerankedResult, SearchResult};

/// Why the reranker returned candidates unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum PassthroughReason {
    /// Disabled in configuration
    Disabled,
    /// Model never loaded
    Uninitialized,
    /// Scoring failed for this request
    Failed(String),
}

impl fmt::Display for PassthroughReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassthroughReason::Disabled => write!(f, "reranker disabled"),
            PassthroughReason::Uninitialized => write!(f, "reranker model not loaded"),
            PassthroughReason::Failed(msg) => write!(f, "reranking failed: {}", msg),
        }
    }
}

/// Result of one rerank call
#[derive(Debug, Clone, PartialEq)]
pub enum RerankOutcome {
    /// Sorted by descending relevance, truncated to top_k
    Reranked(Vec<RerankedResult>),
    /// First top_k candidates in input order
    Passthrough {
        results: Vec<SearchResult>,
        reason: PassthroughReason,
    },
}

impl RerankOutcome {
    /// Whether reranking was actually applied
    pub fn applied(&self) -> bool {
        matches!(self, RerankOutcome::Reranked(_))
    }

    pub fn len(&self) -> usize {
        match self {
            RerankOutcome::Reranked(results) => results.len(),
            RerankOutcome::Passthrough { results, .. } => results.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand the ordering downstream, tagged with which order is authoritative
    pub fn into_ranked(self) -> RankedDocuments {
        match self {
            RerankOutcome::Reranked(results) => RankedDocuments::Reranked(results),
            RerankOutcome::Passthrough { results, .. } => RankedDocuments::Similarity(results),
        }
    }
}

/// Reorders retrieved candidates with an optional cross-encoder
///
/// Never fails: a disabled, unloaded or failing model degrades to
/// passing the first `top_k` candidates through unchanged.
#[derive(Clone)]
pub struct Reranker {
    model: Option<Arc<dyn CrossEncoder>>,
    enabled: bool,
}

impl Reranker {
    /// Create with a loaded model
    pub fn new(model: Arc<dyn CrossEncoder>) -> Self {
        Self {
            model: Some(model),
            enabled: true,
        }
    }

    /// Create without a model; every call passes through
    pub fn uninitialized() -> Self {
        Self {
            model: None,
            enabled: true,
        }
    }

    /// Create a reranker that is switched off
    pub fn disabled() -> Self {
        Self {
            model: None,
            enabled: false,
        }
    }

    /// True when calls will actually score with a model
    pub fn is_available(&self) -> bool {
        self.enabled && self.model.is_some()
    }

    fn passthrough(
        documents: &[SearchResult],
        top_k: usize,
        reason: PassthroughReason,
    ) -> RerankOutcome {
        RerankOutcome::Passthrough {
            results: documents.iter().take(top_k).cloned().collect(),
            reason,
        }
    }

    /// Score every candidate against the query and keep the best `top_k`
    pub async fn rerank(
        &self,
        query: &str,
        documents: &[SearchResult],
        top_k: usize,
    ) -> RerankOutcome {
        if !self.enabled {
            return Self::passthrough(documents, top_k, PassthroughReason::Disabled);
        }
        let Some(model) = &self.model else {
            return Self::passthrough(documents, top_k, PassthroughReason::Uninitialized);
        };
        if documents.is_empty() {
            return RerankOutcome::Reranked(Vec::new());
        }

        let texts: Vec<&str> = documents
            .iter()
            .map(|r| r.document.content.as_str())
            .collect();

        let scores = match model.score(query, &texts).await {
            Ok(scores) if scores.len() != documents.len() => Err(format!(
                "expected {} scores, got {}",
                documents.len(),
                scores.len()
            )),
            Ok(scores) if scores.iter().any(|s| !s.is_finite()) => {
                Err("model produced a non-finite score".to_string())
            }
            Ok(scores) => Ok(scores),
            Err(e) => Err(e.to_string()),
        };
        let scores = match scores {
            Ok(scores) => scores,
            Err(message) => {
                let reason = PassthroughReason::Failed(message);
                warn!(%reason, "Falling back to similarity order");
                return Self::passthrough(documents, top_k, reason);
            }
        };

        let mut ranked: Vec<RerankedResult> = documents
            .iter()
            .cloned()
            .zip(scores)
            .map(|(result, rerank_score)| RerankedResult {
                result,
                rerank_score,
            })
            .collect();

        // Sort by rerank score descending; stable, so ties keep retrieval order
        ranked.sort_by(|a, b| descending_score(a.rerank_score, b.rerank_score));
        ranked.truncate(top_k);

        info!(
            candidates = documents.len(),
            kept = ranked.len(),
            top_score = ranked.first().map(|r| r.rerank_score),
            "Reranked candidates"
        );
        RerankOutcome::Reranked(ranked)
    }
}

impl fmt::Debug for Reranker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reranker")
            .field("enabled", &self.enabled)
            .field("loaded", &self.model.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{PipelineError, Result};
    use crate::types::{Document, DocumentMetadata};
    use async_trait::async_trait;

    /// Scores by content length
    struct LengthScorer;

    #[async_trait]
    impl CrossEncoder for LengthScorer {
        async fn score(&self, _query: &str, documents: &[&str]) -> Result<Vec<f32>> {
            Ok(documents.iter().map(|d| d.len() as f32).collect())
        }
    }

    struct FailingScorer;

    #[async_trait]
    impl CrossEncoder for FailingScorer {
        async fn score(&self, _query: &str, _documents: &[&str]) -> Result<Vec<f32>> {
            Err(PipelineError::Rerank("model crashed".to_string()))
        }
    }

    struct ShortScorer;

    #[async_trait]
    impl CrossEncoder for ShortScorer {
        async fn score(&self, _query: &str, _documents: &[&str]) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }
    }

    /// Returns fixed scores regardless of input
    struct FixedScorer(Vec<f32>);

    #[async_trait]
    impl CrossEncoder for FixedScorer {
        async fn score(&self, _query: &str, _documents: &[&str]) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn create_test_result(id: &str, content: &str, similarity: f32, rank: usize) -> SearchResult {
        SearchResult {
            document: Document {
                id: id.to_string(),
                content: content.to_string(),
                metadata: DocumentMetadata::default(),
                embedding: Vec::new(),
            },
            similarity,
            rank,
        }
    }

    fn five_candidates() -> Vec<SearchResult> {
        vec![
            create_test_result("1", "a", 0.9, 1),
            create_test_result("2", "bbbbb", 0.8, 2),
            create_test_result("3", "ccc", 0.7, 3),
            create_test_result("4", "dddd", 0.6, 4),
            create_test_result("5", "ee", 0.5, 5),
        ]
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.document.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_rerank_sorts_by_score() {
        let reranker = Reranker::new(Arc::new(LengthScorer));
        let outcome = reranker.rerank("query", &five_candidates(), 3).await;

        assert!(outcome.applied());
        let RerankOutcome::Reranked(ranked) = outcome else {
            panic!("expected reranked outcome");
        };
        let order: Vec<&str> = ranked.iter().map(|r| r.result.document.id.as_str()).collect();
        assert_eq!(order, vec!["2", "4", "3"]);
        assert!(ranked.windows(2).all(|w| w[0].rerank_score >= w[1].rerank_score));
    }

    #[tokio::test]
    async fn test_failure_passes_first_top_k_through() {
        let reranker = Reranker::new(Arc::new(FailingScorer));
        let outcome = reranker.rerank("query", &five_candidates(), 3).await;

        assert!(!outcome.applied());
        match outcome {
            RerankOutcome::Passthrough { results, reason } => {
                assert_eq!(ids(&results), vec!["1", "2", "3"]);
                assert!(matches!(reason, PassthroughReason::Failed(_)));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_score_count_mismatch_passes_through() {
        let reranker = Reranker::new(Arc::new(ShortScorer));
        let outcome = reranker.rerank("query", &five_candidates(), 2).await;
        assert!(!outcome.applied());
        assert_eq!(outcome.len(), 2);
    }

    #[tokio::test]
    async fn test_non_finite_score_passes_through() {
        let candidates = vec![
            create_test_result("low", "a", 0.9, 1),
            create_test_result("broken", "b", 0.8, 2),
            create_test_result("high", "c", 0.7, 3),
        ];
        let reranker = Reranker::new(Arc::new(FixedScorer(vec![1.0, f32::NAN, 3.0])));
        let outcome = reranker.rerank("query", &candidates, 1).await;

        match outcome {
            RerankOutcome::Passthrough { results, reason } => {
                assert_eq!(ids(&results), vec!["low"]);
                assert!(matches!(reason, PassthroughReason::Failed(_)));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_finite_scores_pick_highest() {
        let candidates = vec![
            create_test_result("low", "a", 0.9, 1),
            create_test_result("mid", "b", 0.8, 2),
            create_test_result("high", "c", 0.7, 3),
        ];
        let reranker = Reranker::new(Arc::new(FixedScorer(vec![1.0, -2.0, 3.0])));
        let outcome = reranker.rerank("query", &candidates, 1).await;
        let RerankOutcome::Reranked(ranked) = outcome else {
            panic!("expected reranked outcome");
        };
        assert_eq!(ranked[0].result.document.id, "high");
    }

    #[tokio::test]
    async fn test_disabled_and_uninitialized() {
        let candidates = five_candidates();

        let disabled = Reranker::disabled().rerank("q", &candidates, 10).await;
        assert!(matches!(
            disabled,
            RerankOutcome::Passthrough {
                reason: PassthroughReason::Disabled,
                ..
            }
        ));
        assert_eq!(disabled.len(), 5);

        let reranker = Reranker::uninitialized();
        assert!(!reranker.is_available());
        let outcome = reranker.rerank("q", &candidates, 3).await;
        assert!(matches!(
            outcome,
            RerankOutcome::Passthrough {
                reason: PassthroughReason::Uninitialized,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let reranker = Reranker::new(Arc::new(LengthScorer));
        let outcome = reranker.rerank("q", &[], 3).await;
        assert!(outcome.applied());
        assert!(outcome.is_empty());
    }

    #[tokio::test]
    async fn test_into_ranked_tags_ordering() {
        let reranked = Reranker::new(Arc::new(LengthScorer))
            .rerank("q", &five_candidates(), 2)
            .await
            .into_ranked();
        assert!(reranked.is_authoritative());

        let passthrough = Reranker::disabled()
            .rerank("q", &five_candidates(), 2)
            .await
            .into_ranked();
        assert!(!passthrough.is_authoritative());
        assert_eq!(passthrough.len(), 2);
    }
}
