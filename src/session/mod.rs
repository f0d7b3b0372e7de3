//! Session state owned by the caller and passed to the pipeline as a slice

pub mod history;

pub use history::ConversationHistory;
