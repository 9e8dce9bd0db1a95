//! Bounded conversation context sent along with every request.
//!
//! Token counts are a rough estimate: whitespace-separated words times 1.3,
//! rounded down. Good enough to keep request bodies from growing without
//! bound; not a real tokenizer.
use std::collections::VecDeque;

/// Default token budget for the context window.
pub const DEFAULT_CONTEXT_BUDGET: u32 = 2000;

/// One question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

impl Turn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// Estimated token count of a turn.
pub fn estimate_tokens(turn: &Turn) -> u32 {
    let words = turn.user.split_whitespace().count() + turn.assistant.split_whitespace().count();
    let estimate = words as u64 * 13 / 10;
    estimate.min(u64::from(u32::MAX)) as u32
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationContext {
    turns: VecDeque<(Turn, u32)>,
    total_tokens: u32,
    budget: u32,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::with_budget(DEFAULT_CONTEXT_BUDGET)
    }
}

impl ConversationContext {
    pub fn with_budget(budget: u32) -> Self {
        Self {
            turns: VecDeque::new(),
            total_tokens: 0,
            budget,
        }
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    pub fn total_tokens(&self) -> u32 {
        self.total_tokens
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Records a turn, then drops the oldest turns while over budget.
    ///
    /// A single turn larger than the whole budget is dropped as well.
    pub fn push(&mut self, turn: Turn) {
        let tokens = estimate_tokens(&turn);
        self.total_tokens = self.total_tokens.saturating_add(tokens);
        self.turns.push_back((turn, tokens));
        while self.total_tokens > self.budget {
            match self.turns.pop_front() {
                Some((_, dropped)) => self.total_tokens -= dropped,
                None => break,
            }
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.total_tokens = 0;
    }

    /// Turns in chronological order.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.iter().map(|(turn, _)| turn.clone()).collect()
    }
}
