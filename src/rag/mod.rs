// Retrieval-augmented answer pipeline
//
// Stages, in request order:
// - Retrieval: embed the question, similarity search over the knowledge base
// - Reranking: cross-encoder reordering, passthrough when unavailable
// - Context: budgeted, source-attributed blocks
// - Prompt: instruction, context, recent turns, question
// - Pipeline: end-to-end orchestration with generation and fallbacks

pub mod context;
pub mod pipeline;
pub mod prompt;
pub mod reranking;
pub mod retrieval;

// Re-export key types
pub use context::{AssembledContext, ContextAssembler, SourceBlock};
pub use pipeline::{PipelineAnswer, RagPipeline};
pub use prompt::PromptBuilder;
pub use reranking::{CrossEncoder, PassthroughReason, RerankOutcome, Reranker};
pub use retrieval::Retriever;
