//! Widget configuration — endpoint paths and polling knobs.
//!
//! DESIGN
//! ======
//! Defaults match the original deployment; every value can be overridden
//! through `LIVECHAT_*` environment variables (and again by CLI flags in
//! the binary). Paths are joined onto `base_url` by the transport.

use std::time::Duration;

const DEFAULT_BOOTSTRAP_PATH: &str = "/chat/api/bootstrap/";
const DEFAULT_MESSAGES_PATH: &str = "/chat/api/messages/";
const DEFAULT_SYSTEM_PATH: &str = "/chat/api/system/";
const DEFAULT_SEND_PATH: &str = "/chat/api/send/";
const DEFAULT_NEW_THREAD_PATH: &str = "/chat/api/new-thread/";

/// Server-side long-poll hold time, in seconds.
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 20;

/// First retry delay after a poll failure.
const DEFAULT_BACKOFF_FLOOR_MS: u64 = 500;
/// Retry delay ceiling; doubling stops here.
const DEFAULT_BACKOFF_CEILING_MS: u64 = 8_000;

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Endpoint paths and polling knobs for one widget instance.
#[derive(Debug, Clone)]
pub struct WidgetConfig {
    /// Origin of the chat backend, e.g. `https://example.org`.
    pub base_url: String,
    pub bootstrap_path: String,
    pub messages_path: String,
    pub system_path: String,
    pub send_path: String,
    pub new_thread_path: String,
    /// Long-poll hold time passed to the server as `timeout=<secs>`.
    pub poll_timeout_secs: u64,
    /// Backoff floor for failed poll cycles.
    pub backoff_floor: Duration,
    /// Backoff ceiling for failed poll cycles.
    pub backoff_ceiling: Duration,
}

impl WidgetConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bootstrap_path: DEFAULT_BOOTSTRAP_PATH.to_owned(),
            messages_path: DEFAULT_MESSAGES_PATH.to_owned(),
            system_path: DEFAULT_SYSTEM_PATH.to_owned(),
            send_path: DEFAULT_SEND_PATH.to_owned(),
            new_thread_path: DEFAULT_NEW_THREAD_PATH.to_owned(),
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            backoff_floor: Duration::from_millis(DEFAULT_BACKOFF_FLOOR_MS),
            backoff_ceiling: Duration::from_millis(DEFAULT_BACKOFF_CEILING_MS),
        }
    }

    /// Build a config from `LIVECHAT_*` environment variables, falling back
    /// to the defaults above.
    #[must_use]
    pub fn from_env(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bootstrap_path: env_string("LIVECHAT_BOOTSTRAP_PATH", DEFAULT_BOOTSTRAP_PATH),
            messages_path: env_string("LIVECHAT_MESSAGES_PATH", DEFAULT_MESSAGES_PATH),
            system_path: env_string("LIVECHAT_SYSTEM_PATH", DEFAULT_SYSTEM_PATH),
            send_path: env_string("LIVECHAT_SEND_PATH", DEFAULT_SEND_PATH),
            new_thread_path: env_string("LIVECHAT_NEW_THREAD_PATH", DEFAULT_NEW_THREAD_PATH),
            poll_timeout_secs: env_parse("LIVECHAT_POLL_TIMEOUT_SECS", DEFAULT_POLL_TIMEOUT_SECS),
            backoff_floor: Duration::from_millis(env_parse(
                "LIVECHAT_BACKOFF_FLOOR_MS",
                DEFAULT_BACKOFF_FLOOR_MS,
            )),
            backoff_ceiling: Duration::from_millis(env_parse(
                "LIVECHAT_BACKOFF_CEILING_MS",
                DEFAULT_BACKOFF_CEILING_MS,
            )),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
