//! Bounded per-session conversation history
//!
//! FIFO queue of turns; pushing beyond capacity evicts the oldest turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::generation::AnswerSource;
use crate::types::{ConversationTurn, Role};

/// Conversation history for one kiosk session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    session_id: Uuid,
    started_at: DateTime<Utc>,
    max_turns: usize,
    turns: VecDeque<ConversationTurn>,
    /// Exchanges recorded since start, including evicted ones
    exchange_count: usize,
}

impl ConversationHistory {
    /// New session keeping at most `max_turns` turns
    pub fn new(max_turns: usize) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            max_turns,
            turns: VecDeque::with_capacity(max_turns),
            exchange_count: 0,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.max_turns())
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn capacity(&self) -> usize {
        self.max_turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn exchange_count(&self) -> usize {
        self.exchange_count
    }

    /// Append one turn, evicting the oldest at capacity
    pub fn push(&mut self, turn: ConversationTurn) {
        if self.max_turns == 0 {
            return;
        }
        while self.turns.len() >= self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Record a question and the answer given to it
    pub fn record_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.push(ConversationTurn::new(Role::User, question));
        self.push(ConversationTurn::new(Role::Assistant, answer));
        self.exchange_count += 1;
    }

    /// Record an exchange only when the answer was generated
    ///
    /// Apologies and extractive quotes are not kept. Returns whether the
    /// exchange was recorded.
    pub fn record_answer(
        &mut self,
        question: impl Into<String>,
        answer: impl Into<String>,
        source: AnswerSource,
    ) -> bool {
        if source != AnswerSource::Generated {
            return false;
        }
        self.record_exchange(question, answer);
        true
    }

    /// Turns oldest first, as a contiguous slice for the pipeline
    pub fn turns(&mut self) -> &[ConversationTurn] {
        self.turns.make_contiguous()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    /// Forget all turns; the session id is kept
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
