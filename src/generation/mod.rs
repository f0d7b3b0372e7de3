//! Generation stage: completion backend client, response cleanup and
//! extractive fallback

pub mod client;
pub mod fallback;
pub mod postprocess;
pub mod types;

pub use client::GenerationClient;
pub use postprocess::clean_response;
pub use types::{
    AnswerSource, BackendState, Completion, GeneratedAnswer, GenerationParams,
};
