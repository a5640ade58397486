//! HTTP transport — credentialed GET/POST with cancellation.
//!
//! DESIGN
//! ======
//! Thin wrapper over reqwest behind the [`Transport`] trait so the poll
//! engine and controller can be exercised against scripted stubs. Every
//! request carries the caller-supplied session cookie and, when present,
//! an `X-CSRFToken` header (the backend reads the token from its
//! `csrftoken` cookie and expects it echoed in that header). GETs disable
//! HTTP caching and accept a shutdown signal; a cancelled GET resolves to
//! [`TransportError::Cancelled`], which callers must never treat as a
//! delivery failure.
//!
//! No retry policy lives here — the poll engine and the send fallback own
//! their own retry decisions. The client applies no overall timeout: the
//! long-poll hold time is the server's to enforce.

use std::time::Duration;

use reqwest::header::{CACHE_CONTROL, COOKIE};
use serde_json::Value;
use tokio::sync::watch;

const CSRF_HEADER: &str = "X-CSRFToken";
const CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// TYPES
// =============================================================================

/// Outbound body encoding for POST requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// `Content-Type: application/json`.
    Json,
    /// `Content-Type: application/x-www-form-urlencoded`; the JSON object
    /// is flattened to string fields, nulls skipped.
    Form,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),

    /// The request never produced a response (DNS, connect, reset).
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-2xx status.
    #[error("unexpected status {status}")]
    Status { status: u16, body: String },

    /// The response body was not valid JSON.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// The in-flight request was cancelled by its channel's shutdown
    /// signal. Never a delivery failure: no backoff, no user-visible error.
    #[error("request cancelled")]
    Cancelled,
}

impl TransportError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Outbound HTTP seam. One implementation talks to the real backend;
/// tests inject scripted stubs.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Long-poll capable GET. `cancel` is the owning channel's shutdown
    /// signal; when it fires mid-flight the call resolves to
    /// [`TransportError::Cancelled`].
    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<Value, TransportError>;

    /// One-shot POST with the given body encoding.
    async fn post(&self, path: &str, body: &Value, encoding: Encoding)
    -> Result<Value, TransportError>;
}

// =============================================================================
// HTTP TRANSPORT
// =============================================================================

pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    /// Raw `Cookie` header value, e.g. `sessionid=...; csrftoken=...`.
    cookie_header: Option<String>,
    csrf_token: Option<String>,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        cookie_header: Option<String>,
        csrf_token: Option<String>,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.into(), cookie_header, csrf_token })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn apply_credentials(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(cookie) = &self.cookie_header {
            req = req.header(COOKIE, cookie);
        }
        if let Some(token) = &self.csrf_token {
            req = req.header(CSRF_HEADER, token);
        }
        req
    }

    async fn read_json(resp: reqwest::Response) -> Result<Value, TransportError> {
        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(TransportError::Status { status, body: text });
        }
        serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<Value, TransportError> {
        let req = self
            .apply_credentials(self.http.get(self.url(path)))
            .header(CACHE_CONTROL, "no-store")
            .query(query);

        let request = async {
            let resp = req
                .send()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))?;
            Self::read_json(resp).await
        };

        match cancel {
            None => request.await,
            Some(mut rx) => {
                if *rx.borrow() {
                    return Err(TransportError::Cancelled);
                }
                tokio::select! {
                    result = request => result,
                    _ = rx.changed() => Err(TransportError::Cancelled),
                }
            }
        }
    }

    async fn post(
        &self,
        path: &str,
        body: &Value,
        encoding: Encoding,
    ) -> Result<Value, TransportError> {
        let req = self.apply_credentials(self.http.post(self.url(path)));
        let req = match encoding {
            Encoding::Json => req.json(body),
            Encoding::Form => req.form(&form_fields(body)),
        };
        let resp = req
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Self::read_json(resp).await
    }
}

// =============================================================================
// HELPERS
// =============================================================================

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Flatten a JSON object into form fields. Nulls and missing values are
/// skipped; scalars are stringified; nested structures are serialized as
/// JSON text (the backend only ever receives flat payloads in practice).
pub(crate) fn form_fields(body: &Value) -> Vec<(String, String)> {
    let Some(map) = body.as_object() else {
        return Vec::new();
    };
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let field = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), field)
        })
        .collect()
}

// =============================================================================
// TEST SUPPORT
// =============================================================================


#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
