//! Prompt construction for the completion backend
//!
//! Layout, top to bottom: system instruction, `CONTEXT:` section (omitted
//! when nothing was retrieved), recent conversation turns, then
//! `Question:` and a trailing `Answer:` cue. The post-processor truncates
//! completions at these same markers if the model echoes them.

use crate::rag::context::AssembledContext;
use crate::types::ConversationTurn;

/// Exact reply the model is told to give when the context lacks the answer
pub const UNKNOWN_ANSWER: &str = "I don't have that information.";

/// Header introducing the retrieved sources
pub const CONTEXT_HEADER: &str = "CONTEXT:";

/// Default system instruction for the campus kiosk
pub fn default_instruction() -> String {
    format!(
        "You are a helpful assistant at a campus information kiosk. \
         Answer the question using only the information in the CONTEXT section. \
         If the context does not contain the answer, reply exactly: \"{}\" \
         Answer directly in one to three sentences. \
         Do not start with phrases such as \"According to the context\" or \"Based on the documents\".",
        UNKNOWN_ANSWER
    )
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    instruction: String,
    max_history_turns: usize,
}

impl PromptBuilder {
    /// Builder keeping at most `max_history_turns` trailing turns
    pub fn new(max_history_turns: usize) -> Self {
        Self {
            instruction: default_instruction(),
            max_history_turns,
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Render the full prompt for one question
    pub fn build(
        &self,
        question: &str,
        context: &AssembledContext,
        history: &[ConversationTurn],
    ) -> String {
        let mut prompt = String::with_capacity(
            self.instruction.len() + context.text().len() + question.len() + 256,
        );
        prompt.push_str(self.instruction.trim());
        prompt.push_str("\n\n");

        if let AssembledContext::Sources { text, .. } = context {
            prompt.push_str(CONTEXT_HEADER);
            prompt.push('\n');
            prompt.push_str(text);
            prompt.push_str("\n\n");
        }

        let skip = history.len().saturating_sub(self.max_history_turns);
        let recent = &history[skip..];
        if !recent.is_empty() {
            prompt.push_str("Conversation so far:\n");
            for turn in recent {
                prompt.push_str(turn.role.label());
                prompt.push_str(": ");
                prompt.push_str(turn.content.trim());
                prompt.push('\n');
            }
            prompt.push('\n');
        }

        prompt.push_str("Question: ");
        prompt.push_str(question.trim());
        prompt.push_str("\nAnswer:");
        prompt
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(20)
    }
}
