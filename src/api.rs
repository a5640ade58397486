//! Typed endpoint wrappers over [`Transport`].
//!
//! DESIGN
//! ======
//! Thin call + pure parsing, split so the parsers are testable without a
//! network. The send wrapper owns the one-time JSON→form encoding
//! fallback: some deployments of the backend reject JSON bodies (wrong
//! content type handling), so a failed JSON POST is retried exactly once
//! form-encoded before the failure is surfaced to the caller.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::sync::watch;
use tracing::warn;

use crate::config::WidgetConfig;
use crate::transport::{Encoding, Transport, TransportError};

// =============================================================================
// RESPONSE SHAPES
// =============================================================================

/// An inline system notice shipped alongside bootstrap/send responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemLine {
    pub text: String,
    /// `info`, `warning` or `error`; free-form, defaults to `info`.
    pub level: String,
}

#[derive(Debug)]
pub struct Bootstrap {
    pub thread_id: Option<String>,
    /// Raw message payloads; normalization is the store's job.
    pub messages: Vec<Value>,
    pub system_lines: Vec<SystemLine>,
}

#[derive(Debug)]
pub struct SendOutcome {
    /// The persisted copy of the visitor's message (`user_message` wins
    /// over `message` when both are present).
    pub message: Option<Value>,
    pub system_lines: Vec<SystemLine>,
    /// Application-level error delivered inside a 2xx response.
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct NewThread {
    pub thread_id: Option<String>,
    pub messages: Vec<Value>,
}

// =============================================================================
// CALLS
// =============================================================================

/// `GET bootstrap` — thread id + full history + pending system lines.
pub async fn bootstrap(
    transport: &dyn Transport,
    config: &WidgetConfig,
) -> Result<Bootstrap, TransportError> {
    let body = transport.get(&config.bootstrap_path, &[], None).await?;
    Ok(parse_bootstrap(&body))
}

/// `GET messages?after_id=..&timeout=..` — long-poll for new messages.
pub async fn poll_messages(
    transport: &dyn Transport,
    config: &WidgetConfig,
    after_id: i64,
    cancel: watch::Receiver<bool>,
) -> Result<Vec<Value>, TransportError> {
    let query = [
        ("after_id", after_id.to_string()),
        ("timeout", config.poll_timeout_secs.to_string()),
    ];
    let body = transport
        .get(&config.messages_path, &query, Some(cancel))
        .await?;
    Ok(message_array(&body, "messages"))
}

/// `GET system?timeout=..` — long-poll for the pending-notification count.
pub async fn poll_system_count(
    transport: &dyn Transport,
    config: &WidgetConfig,
    cancel: watch::Receiver<bool>,
) -> Result<u64, TransportError> {
    let query = [("timeout", config.poll_timeout_secs.to_string())];
    let body = transport
        .get(&config.system_path, &query, Some(cancel))
        .await?;
    Ok(body.get("count").and_then(Value::as_u64).unwrap_or(0))
}

/// `POST send` — JSON first, one form-encoded retry on any failure.
///
/// The payload carries the text under both `text` and `content` because
/// backend revisions disagreed on the key.
pub async fn send_message(
    transport: &dyn Transport,
    config: &WidgetConfig,
    text: &str,
    thread_id: Option<&str>,
) -> Result<SendOutcome, TransportError> {
    let mut payload = Map::new();
    payload.insert("text".to_owned(), json!(text));
    payload.insert("content".to_owned(), json!(text));
    if let Some(id) = thread_id {
        payload.insert("thread_id".to_owned(), json!(id));
    }
    let payload = Value::Object(payload);

    let body = match transport
        .post(&config.send_path, &payload, Encoding::Json)
        .await
    {
        Ok(body) => body,
        Err(err) => {
            warn!(error = %err, "json send failed; retrying form-encoded");
            transport
                .post(&config.send_path, &payload, Encoding::Form)
                .await?
        }
    };
    Ok(parse_send(&body))
}

/// `POST new-thread` — discard the current thread, start a fresh one.
pub async fn new_thread(
    transport: &dyn Transport,
    config: &WidgetConfig,
) -> Result<NewThread, TransportError> {
    let body = transport
        .post(&config.new_thread_path, &json!({}), Encoding::Json)
        .await?;
    Ok(NewThread { thread_id: thread_id_of(&body), messages: message_array(&body, "messages") })
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_bootstrap(body: &Value) -> Bootstrap {
    Bootstrap {
        thread_id: thread_id_of(body),
        messages: message_array(body, "messages"),
        system_lines: system_lines_of(body),
    }
}

fn parse_send(body: &Value) -> SendOutcome {
    let message = body
        .get("user_message")
        .filter(|v| !v.is_null())
        .or_else(|| body.get("message").filter(|v| !v.is_null()))
        .cloned();
    let error = body
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_owned);
    SendOutcome { message, system_lines: system_lines_of(body), error }
}

/// `thread_id` or `threadId`; numbers are stringified (the id is opaque
/// to the client).
fn thread_id_of(body: &Value) -> Option<String> {
    let v = body
        .get("thread_id")
        .filter(|v| !v.is_null())
        .or_else(|| body.get("threadId").filter(|v| !v.is_null()))?;
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn message_array(body: &Value, key: &str) -> Vec<Value> {
    body.get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn system_lines_of(body: &Value) -> Vec<SystemLine> {
    body.get("system_messages")
        .and_then(Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .filter_map(|line| {
                    let text = line
                        .get("content")
                        .or_else(|| line.get("text"))
                        .and_then(Value::as_str)?
                        .to_owned();
                    if text.is_empty() {
                        return None;
                    }
                    let level = line
                        .get("level")
                        .and_then(Value::as_str)
                        .unwrap_or("info")
                        .to_owned();
                    Some(SystemLine { text, level })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
