//! Canonical message type + alias-tolerant payload normalization.
//!
//! DESIGN
//! ======
//! The backend (and the operator-side integrations behind it) emit
//! loosely-typed message payloads with several field-name dialects:
//! `id`/`message_id`/`pk`, `text`/`content`/`message`, an explicit
//! `sender` or an LLM-style `role`. Normalization happens in exactly one
//! place with a fixed precedence order so every consumer sees the same
//! canonical [`Message`].
//!
//! Precedence:
//! - id: `id` → `message_id` → `pk`; non-numeric resolves to 0
//!   (0 means "not persisted by the server").
//! - text: `text` → `content` → `message`.
//! - sender: explicit `sender` wins; else `role` maps `user`→visitor,
//!   `assistant`→operator, `system`→system; else **operator**. The
//!   operator default is deliberate: an unlabeled payload on the messages
//!   channel is an operator reply, and defaulting to system would
//!   misattribute it.
//! - author: `author` → `username` → derived from sender.
//! - created at: `created_at` → `createdAt` → `created`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// TYPES
// =============================================================================

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Visitor,
    Operator,
    System,
}

impl Sender {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Visitor => "visitor",
            Self::Operator => "operator",
            Self::System => "system",
        }
    }

    /// Display name used when the payload carries no author field.
    #[must_use]
    pub fn default_author(self) -> &'static str {
        match self {
            Self::Visitor => "Visitor",
            Self::Operator => "Operator",
            Self::System => "System",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized chat message. Identity is `id`; `id == 0` marks synthetic
/// lines that were never persisted (and are exempt from de-duplication).
///
/// Serializes in canonical form (lowercase sender, `created_at` omitted
/// when absent) so embedders can persist or re-emit the log as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender: Sender,
    pub text: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

// =============================================================================
// NORMALIZATION
// =============================================================================

/// First non-null value among `keys`, in order.
fn first_present<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| raw.get(k))
        .find(|v| !v.is_null())
}

fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_to_id(v: &Value) -> i64 {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
    .max(0)
}

fn sender_from_str(s: &str) -> Option<Sender> {
    match s.to_ascii_lowercase().as_str() {
        "visitor" => Some(Sender::Visitor),
        "operator" => Some(Sender::Operator),
        "system" => Some(Sender::System),
        _ => None,
    }
}

fn sender_from_role(role: &str) -> Option<Sender> {
    match role.to_ascii_lowercase().as_str() {
        "user" => Some(Sender::Visitor),
        "assistant" => Some(Sender::Operator),
        "system" => Some(Sender::System),
        _ => None,
    }
}

/// Normalize a loosely-typed payload into a [`Message`].
///
/// Returns `None` only for non-object payloads; empty-text rejection is
/// the store's job, so callers can still inspect what was said.
#[must_use]
pub fn normalize_message(raw: &Value) -> Option<Message> {
    if !raw.is_object() {
        return None;
    }

    let id = first_present(raw, &["id", "message_id", "pk"])
        .map(value_to_id)
        .unwrap_or(0);

    let text = first_present(raw, &["text", "content", "message"])
        .and_then(value_to_string)
        .unwrap_or_default();

    let sender = raw
        .get("sender")
        .and_then(Value::as_str)
        .and_then(sender_from_str)
        .or_else(|| {
            raw.get("role")
                .and_then(Value::as_str)
                .and_then(sender_from_role)
        })
        .unwrap_or(Sender::Operator);

    let author = first_present(raw, &["author", "username"])
        .and_then(value_to_string)
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| sender.default_author().to_owned());

    let created_at = first_present(raw, &["created_at", "createdAt", "created"])
        .and_then(value_to_string);

    Some(Message { id, sender, text, author, created_at })
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
