// Context assembler: ranked documents -> budgeted source blocks for the prompt
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ContextConfig;
use crate::types::{descending_score, Document, RankedDocuments};

/// Separator between source blocks; counts against the budget
pub const BLOCK_SEPARATOR: &str = "\n\n";

const ELLIPSIS: &str = "...";

/// One formatted source inside the context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBlock {
    pub document_id: String,
    pub title: String,
    pub score: f32,
    /// Document content after the per-document cap
    pub excerpt: String,
    /// `[Document n] title (score: s)` header plus excerpt
    pub text: String,
}

/// Formatted context handed to the prompt builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssembledContext {
    /// Nothing retrieved, or nothing fit the budget
    NoContext,
    Sources {
        blocks: Vec<SourceBlock>,
        /// Blocks joined by the separator
        text: String,
        /// Length of `text` in characters
        char_count: usize,
    },
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        matches!(self, AssembledContext::NoContext)
    }

    pub fn blocks(&self) -> &[SourceBlock] {
        match self {
            AssembledContext::NoContext => &[],
            AssembledContext::Sources { blocks, .. } => blocks,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            AssembledContext::NoContext => "",
            AssembledContext::Sources { text, .. } => text,
        }
    }

    pub fn char_count(&self) -> usize {
        match self {
            AssembledContext::NoContext => 0,
            AssembledContext::Sources { char_count, .. } => *char_count,
        }
    }

    pub fn document_ids(&self) -> Vec<&str> {
        self.blocks().iter().map(|b| b.document_id.as_str()).collect()
    }
}

/// Context builder bounded by a total character budget
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    config: ContextConfig,
}

impl ContextAssembler {
    pub fn new() -> Self {
        Self {
            config: ContextConfig::default(),
        }
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Assemble with the configured budget
    pub fn build(&self, documents: &RankedDocuments) -> AssembledContext {
        self.assemble(documents, self.config.char_budget)
    }

    /// Assemble blocks in ranked order until the next one would exceed `char_budget`
    ///
    /// A reranked list is used exactly as given. A similarity list is
    /// re-sorted by descending similarity (stable), which is a no-op for
    /// well-formed retriever output.
    pub fn assemble(&self, documents: &RankedDocuments, char_budget: usize) -> AssembledContext {
        let mut ordered = documents.scored();
        if !documents.is_authoritative() {
            ordered.sort_by(|a, b| descending_score(a.1, b.1));
        }

        let separator_chars = BLOCK_SEPARATOR.chars().count();
        let mut blocks: Vec<SourceBlock> = Vec::new();
        let mut total = 0usize;

        for (document, score) in ordered {
            let block = self.format_block(blocks.len() + 1, document, score);
            let block_chars = block.text.chars().count();
            let added = if blocks.is_empty() {
                block_chars
            } else {
                block_chars + separator_chars
            };

            if total + added > char_budget {
                break;
            }
            total += added;
            blocks.push(block);
        }

        if blocks.is_empty() {
            if !documents.is_empty() {
                warn!(char_budget, "No document fit the context budget");
            }
            return AssembledContext::NoContext;
        }

        let text = blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR);
        debug!(
            documents = blocks.len(),
            chars = total,
            "Assembled context"
        );

        AssembledContext::Sources {
            blocks,
            text,
            char_count: total,
        }
    }

    fn format_block(&self, index: usize, document: &Document, score: f32) -> SourceBlock {
        let title = document.title().to_string();
        let excerpt = truncate_chars(&document.content, self.config.per_document_chars);
        let text = format!(
            "[Document {}] {} (score: {:.3})\n{}",
            index, title, score, excerpt
        );
        SourceBlock {
            document_id: document.id.clone(),
            title,
            score,
            excerpt,
            text,
        }
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Cap `text` at `max_chars` characters, ellipsis included
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let ellipsis_chars = ELLIPSIS.chars().count();
    if max_chars <= ellipsis_chars {
        return text.chars().take(max_chars).collect();
    }

    let mut truncated: String = text.chars().take(max_chars - ellipsis_chars).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}
