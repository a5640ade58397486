//! In-memory message store — rendered-id set + monotonic cursor.
//!
//! DESIGN
//! ======
//! The store is the single de-duplication point for both the bootstrap
//! batch and the messages poll channel. Admission normalizes the raw
//! payload, rejects empty or already-seen messages, and advances the
//! incremental-fetch cursor. The cursor only ever grows, so a poll cycle
//! that races a send response can never re-deliver older messages.

use std::collections::HashSet;

use serde_json::Value;

use crate::message::{Message, normalize_message};

/// Ordered log of admitted messages plus de-duplication bookkeeping.
#[derive(Debug, Default)]
pub struct MessageStore {
    log: Vec<Message>,
    rendered: HashSet<i64>,
    cursor: i64,
}

impl MessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest persisted message id seen so far; `after_id` for the next
    /// messages poll.
    #[must_use]
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// All messages admitted so far, in admission order.
    #[must_use]
    pub fn log(&self) -> &[Message] {
        &self.log
    }

    /// Clear everything. Called on bootstrap and on thread switch.
    pub fn reset(&mut self) {
        self.log.clear();
        self.rendered.clear();
        self.cursor = 0;
    }

    /// Admit a raw payload: normalize, de-duplicate, advance the cursor.
    ///
    /// Returns the admitted message, or `None` when the payload is not an
    /// object, normalizes to empty text, or carries a nonzero id that was
    /// already admitted. `id == 0` lines (synthetic system notices) are
    /// never deduplicated and never move the cursor.
    pub fn admit(&mut self, raw: &Value) -> Option<Message> {
        let msg = normalize_message(raw)?;
        if msg.text.is_empty() {
            return None;
        }
        if msg.id > 0 {
            if !self.rendered.insert(msg.id) {
                return None;
            }
            self.cursor = self.cursor.max(msg.id);
        }
        self.log.push(msg.clone());
        Some(msg)
    }

    /// Admit a synthetic system line that never came from the server.
    pub fn admit_system(&mut self, text: impl Into<String>) -> Option<Message> {
        let text = text.into();
        if text.is_empty() {
            return None;
        }
        let msg = Message {
            id: 0,
            sender: crate::message::Sender::System,
            text,
            author: "System".to_owned(),
            created_at: None,
        };
        self.log.push(msg.clone());
        Some(msg)
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
