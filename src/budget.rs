// Context-window budgeting
//
// Keeps the newest messages that fit a provider's token budget. Token counts
// are estimated with a conservative 3-chars-per-token heuristic rather than a
// real tokenizer, so a fixed per-message overhead absorbs role framing and
// estimation error.

use crate::conversation::{split_system, Message};
use crate::errors::{ParleyError, Result};

/// Added to every non-system message's estimate.
pub const PER_MESSAGE_OVERHEAD: usize = 200;

/// Estimated token cost of `text`: one token per three characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() + 2) / 3
}

/// Estimated token cost of a whole conversation, overhead included for every
/// non-system message.
pub fn estimate_conversation_tokens(conversation: &[Message]) -> usize {
    let (system, rest) = split_system(conversation);
    system.map(|m| estimate_tokens(&m.content)).unwrap_or(0)
        + rest
            .iter()
            .map(|m| estimate_tokens(&m.content) + PER_MESSAGE_OVERHEAD)
            .sum::<usize>()
}

#[derive(Debug, Clone, Copy)]
pub struct TokenBudgetPlanner {
    overhead: usize,
}

impl Default for TokenBudgetPlanner {
    fn default() -> Self {
        Self {
            overhead: PER_MESSAGE_OVERHEAD,
        }
    }
}

impl TokenBudgetPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the leading system message plus the longest run of newest
    /// messages whose estimated cost fits `max_context_tokens`.
    ///
    /// The newest message is always kept, even when it alone exceeds the
    /// budget, so the latest user turn is never silently dropped.
    pub fn plan(&self, conversation: &[Message], max_context_tokens: usize) -> Result<Vec<Message>> {
        if conversation.is_empty() {
            return Err(ParleyError::validation("conversation is empty"));
        }

        let (system, history) = split_system(conversation);
        let mut total = system.map(|m| estimate_tokens(&m.content)).unwrap_or(0);

        let mut keep_from = history.len();
        for (idx, message) in history.iter().enumerate().rev() {
            let estimate = estimate_tokens(&message.content) + self.overhead;
            if total + estimate > max_context_tokens {
                break;
            }
            total += estimate;
            keep_from = idx;
        }

        if keep_from == history.len() && !history.is_empty() {
            keep_from = history.len() - 1;
        }

        let dropped = keep_from;
        if dropped > 0 {
            tracing::debug!(
                dropped,
                kept = history.len() - keep_from,
                max_context_tokens,
                "Trimmed conversation to fit context budget"
            );
        }

        let mut planned = Vec::with_capacity(history.len() - keep_from + 1);
        if let Some(system) = system {
            planned.push(system.clone());
        }
        planned.extend(history[keep_from..].iter().cloned());
        Ok(planned)
    }
}
