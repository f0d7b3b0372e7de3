//! Fixed user-facing messages and the extractive fallback answer
use crate::generation::types::{AnswerSource, GeneratedAnswer};
use crate::rag::context::{truncate_chars, AssembledContext};
use crate::types::RankedDocuments;

/// Generation exceeded the bounded wait
pub const TIMEOUT_MESSAGE: &str =
    "Sorry, that took too long to answer. Please try again in a moment.";

/// Nothing retrieved and no generator to fall back on
pub const NO_CONTEXT_APOLOGY: &str = "I'm sorry, I can't answer that right now: \
     I found no matching information in the knowledge base and the answer service is unavailable. \
     Please ask at the information desk.";

/// The question could not be processed at all
pub const EMBEDDING_APOLOGY: &str =
    "I'm sorry, I couldn't process your question just now. Please try again.";

/// Unexpected internal failure
pub const INTERNAL_APOLOGY: &str =
    "I'm sorry, something went wrong on my side. Please try again or ask at the information desk.";

/// Longest excerpt quoted in an extractive answer
pub const EXCERPT_CHARS: usize = 300;

/// Quote the top source block, or apologize when there is none
///
/// When retrieval found documents but none fit the context budget, the
/// top-ranked document is quoted directly.
pub fn extractive_answer(
    context: &AssembledContext,
    documents: &RankedDocuments,
) -> GeneratedAnswer {
    let quoted = match context.blocks().first() {
        Some(block) => Some((block.title.as_str(), block.excerpt.as_str())),
        None => documents
            .top()
            .map(|document| (document.title(), document.content.as_str())),
    };

    match quoted {
        Some((title, content)) => GeneratedAnswer::new(
            format!(
                "Here is what I found about {}: {}",
                title,
                excerpt(content, EXCERPT_CHARS)
            ),
            AnswerSource::Extractive,
        ),
        None => GeneratedAnswer::new(NO_CONTEXT_APOLOGY, AnswerSource::Apology),
    }
}

/// Whitespace-normalized excerpt, cut at the last sentence end that fits
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }

    let window: String = flat.chars().take(max_chars).collect();
    match window.rfind(". ") {
        Some(end) if end > max_chars / 4 => window[..=end].to_string(),
        _ => truncate_chars(&flat, max_chars),
    }
}
