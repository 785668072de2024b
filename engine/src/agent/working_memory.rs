//! Bounded message history for one agent turn
//!
//! The first messages of a turn (instructions, team transcript, the
//! manager's instruction) are pinned. Tool traffic that follows is trimmed
//! oldest first once the estimate passes the context limit, always keeping
//! the latest exchange.

use crate::llm::Message;

/// Default context limit in tokens
const DEFAULT_CONTEXT_LIMIT: usize = 32_000;

/// Rough estimate: 1 token ≈ 4 characters
const CHARS_PER_TOKEN: usize = 4;

/// Role and framing overhead per message
const MESSAGE_OVERHEAD: usize = 10;

#[derive(Debug, Clone)]
pub struct WorkingMemory {
    messages: Vec<Message>,
    pinned: usize,
    context_limit: usize,
    token_count: usize,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_CONTEXT_LIMIT)
    }

    pub fn with_limit(context_limit: usize) -> Self {
        Self {
            messages: Vec::new(),
            pinned: 0,
            context_limit,
            token_count: 0,
        }
    }

    /// Add a message that is never trimmed. Pinned messages must come
    /// before any unpinned ones.
    pub fn pin(&mut self, message: Message) {
        debug_assert_eq!(self.pinned, self.messages.len(), "pin after push");
        self.token_count += Self::estimate_tokens(&message);
        self.messages.push(message);
        self.pinned += 1;
    }

    /// Add a message, trimming older unpinned messages when over the limit
    pub fn push(&mut self, message: Message) {
        self.token_count += Self::estimate_tokens(&message);
        self.messages.push(message);

        if self.token_count > self.context_limit {
            self.trim();
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    /// Drop the oldest unpinned messages, keeping the last two
    fn trim(&mut self) {
        while self.token_count > self.context_limit && self.messages.len() > self.pinned + 2 {
            let removed = self.messages.remove(self.pinned);
            self.token_count = self
                .token_count
                .saturating_sub(Self::estimate_tokens(&removed));
        }
    }

    fn estimate_tokens(message: &Message) -> usize {
        let chars = message.content.len()
            + message.tool_call_id.as_ref().map(|id| id.len()).unwrap_or(0);
        chars.div_ceil(CHARS_PER_TOKEN) + MESSAGE_OVERHEAD
    }
}

impl Default for WorkingMemory {
    fn default() -> Self {
        Self::new()
    }
}
