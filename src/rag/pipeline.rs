// End-to-end answer pipeline: retrieve -> rerank -> assemble -> prompt -> generate
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::config::{Config, VectorBackend};
use crate::embedding::{BertEmbedder, Embedder};
use crate::errors::{PipelineError, Result};
use crate::generation::fallback::{EMBEDDING_APOLOGY, INTERNAL_APOLOGY};
use crate::generation::{AnswerSource, GenerationClient, GenerationParams};
use crate::rag::context::{AssembledContext, ContextAssembler};
use crate::rag::prompt::PromptBuilder;
use crate::rag::reranking::{CandleCrossEncoder, Reranker};
use crate::rag::retrieval::Retriever;
use crate::store::{InMemoryVectorStore, QdrantVectorStore, VectorSearch};
use crate::types::{ConversationTurn, RankedDocuments};

/// Final answer with everything that went into it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineAnswer {
    pub question: String,
    pub text: String,
    pub source: AnswerSource,
    pub context: AssembledContext,
    pub documents: RankedDocuments,
    /// Whether the cross-encoder ordering was applied
    pub reranked: bool,
    pub elapsed_ms: u64,
}

/// Knobs the orchestrator reads on every request
#[derive(Debug, Clone)]
struct PipelineSettings {
    initial_k: usize,
    final_top_k: usize,
    similarity_threshold: Option<f32>,
    reduce_fanout_without_reranker: bool,
    params: GenerationParams,
}

/// Shared, read-only pipeline; wrap in an `Arc` to serve concurrent requests
pub struct RagPipeline {
    retriever: Retriever,
    store: Arc<dyn VectorSearch>,
    reranker: Reranker,
    assembler: ContextAssembler,
    prompt_builder: PromptBuilder,
    generator: GenerationClient,
    settings: PipelineSettings,
}

impl RagPipeline {
    /// Wire already-constructed stages together
    pub fn new(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorSearch>,
        reranker: Reranker,
        generator: GenerationClient,
    ) -> Self {
        Self {
            retriever: Retriever::new(embedder, Arc::clone(&store)),
            store,
            reranker,
            assembler: ContextAssembler::with_config(config.context.clone()),
            prompt_builder: PromptBuilder::new(config.session.max_turns()),
            generator,
            settings: PipelineSettings {
                initial_k: config.retrieval.initial_k,
                final_top_k: config.retrieval.final_top_k,
                similarity_threshold: config.retrieval.similarity_threshold,
                reduce_fanout_without_reranker: config.retrieval.reduce_fanout_without_reranker,
                params: GenerationParams::from(&config.generation),
            },
        }
    }

    /// Load models and connect backends as configured
    ///
    /// The embedder and vector store are required. A reranker model that
    /// fails to load leaves reranking uninitialized instead of failing.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedding_config = config.embedding.clone();
        let embedder = tokio::task::spawn_blocking(move || BertEmbedder::new(&embedding_config))
            .await
            .map_err(|e| PipelineError::Internal(format!("Model loading task panicked: {}", e)))??;
        let embedder: Arc<dyn Embedder> = Arc::new(embedder);

        let store: Arc<dyn VectorSearch> = match config.vector_store.backend {
            VectorBackend::Qdrant => {
                Arc::new(QdrantVectorStore::connect(&config.vector_store).await?)
            }
            VectorBackend::Memory => {
                let path = config.snapshot_path();
                if path.exists() {
                    Arc::new(
                        InMemoryVectorStore::load_snapshot(&path, embedder.as_ref()).await?,
                    )
                } else {
                    warn!(
                        path = %path.display(),
                        "Knowledge base snapshot not found, starting empty"
                    );
                    Arc::new(InMemoryVectorStore::new())
                }
            }
        };

        let reranker = if config.reranker.enabled {
            let reranker_config = config.reranker.clone();
            let loading =
                tokio::task::spawn_blocking(move || CandleCrossEncoder::new(&reranker_config));
            match loading.await {
                Ok(Ok(model)) => Reranker::new(Arc::new(model)),
                Ok(Err(e)) => {
                    warn!(error = %e, "Cross-encoder failed to load, reranking disabled");
                    Reranker::uninitialized()
                }
                Err(e) => {
                    warn!(error = %e, "Cross-encoder loading task failed, reranking disabled");
                    Reranker::uninitialized()
                }
            }
        } else {
            Reranker::disabled()
        };

        let generator = GenerationClient::new(&config.generation)?;

        info!(
            store = store.name(),
            reranker = reranker.is_available(),
            server = generator.base_url(),
            "Pipeline ready"
        );
        Ok(Self::new(config, embedder, store, reranker, generator))
    }

    pub fn generator(&self) -> &GenerationClient {
        &self.generator
    }

    pub fn store(&self) -> &Arc<dyn VectorSearch> {
        &self.store
    }

    pub fn reranker(&self) -> &Reranker {
        &self.reranker
    }

    /// Answer without metadata filters
    pub async fn answer(&self, question: &str, history: &[ConversationTurn]) -> PipelineAnswer {
        self.answer_with_filters(question, history, &BTreeMap::new())
            .await
    }

    /// Run every stage for one question; always produces an answer
    #[instrument(skip(self, history, filters), fields(history = history.len()))]
    pub async fn answer_with_filters(
        &self,
        question: &str,
        history: &[ConversationTurn],
        filters: &BTreeMap<String, String>,
    ) -> PipelineAnswer {
        let started = Instant::now();
        let settings = &self.settings;

        let fetch_k = if settings.reduce_fanout_without_reranker && !self.reranker.is_available() {
            settings.final_top_k
        } else {
            settings.initial_k
        };
        let filters = (!filters.is_empty()).then_some(filters);

        // Step 1: Retrieve candidates
        let candidates = match self
            .retriever
            .search(question, fetch_k, filters, settings.similarity_threshold)
            .await
        {
            Ok(results) => results,
            Err(PipelineError::Embedding(msg)) => {
                error!(error = %msg, "Query embedding failed");
                return Self::fixed(question, EMBEDDING_APOLOGY, started);
            }
            Err(PipelineError::Retrieval(msg)) => {
                warn!(error = %msg, "Retrieval failed, answering without documents");
                Vec::new()
            }
            Err(e) => {
                error!(error = %e, "Unexpected retrieval error");
                return Self::fixed(question, INTERNAL_APOLOGY, started);
            }
        };

        // Step 2: Rerank down to the final set
        let outcome = self
            .reranker
            .rerank(question, &candidates, settings.final_top_k)
            .await;
        let reranked = outcome.applied();
        let documents = outcome.into_ranked();

        // Step 3: Assemble context
        let context = self.assembler.build(&documents);

        // Step 4: Prompt
        let prompt = self.prompt_builder.build(question, &context, history);

        // Step 5: Generate, with fallback
        let answer = self
            .generator
            .answer_or_fallback(&prompt, &settings.params, &context, &documents)
            .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            retrieved = candidates.len(),
            in_context = context.blocks().len(),
            reranked,
            source = ?answer.source,
            elapsed_ms,
            "Answered question"
        );

        PipelineAnswer {
            question: question.to_string(),
            text: answer.text,
            source: answer.source,
            context,
            documents,
            reranked,
            elapsed_ms,
        }
    }

    fn fixed(question: &str, text: &str, started: Instant) -> PipelineAnswer {
        PipelineAnswer {
            question: question.to_string(),
            text: text.to_string(),
            source: AnswerSource::Apology,
            context: AssembledContext::NoContext,
            documents: RankedDocuments::Similarity(Vec::new()),
            reranked: false,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}
