// Retrieval stage
pub mod engine;

pub use engine::Retriever;
