//! Unsent-draft persistence.
//!
//! A guest's compose text is saved when a send is blocked by the sign-in
//! gate and restored on the next authenticated open, so the draft
//! survives the login round-trip. The file-backed store is what the
//! terminal client uses; tests and embedders get the in-memory one.

use std::path::PathBuf;
use std::sync::Mutex;

use tracing::debug;

/// Client-local storage for one pending draft.
pub trait DraftStore: Send + Sync {
    fn save(&self, text: &str);
    fn load(&self) -> Option<String>;
    fn clear(&self);
}

/// Volatile draft storage.
#[derive(Default)]
pub struct MemoryDraftStore {
    draft: Mutex<Option<String>>,
}

impl MemoryDraftStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for MemoryDraftStore {
    fn save(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        *self.draft.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            Some(text.to_owned());
    }

    fn load(&self) -> Option<String> {
        self.draft
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn clear(&self) {
        *self.draft.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }
}

/// Draft storage backed by a single file. Write failures are logged and
/// otherwise ignored: losing a draft beats failing a send twice.
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl DraftStore for FileDraftStore {
    fn save(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Err(e) = std::fs::write(&self.path, text) {
            debug!(error = %e, path = %self.path.display(), "draft save failed");
        }
    }

    fn load(&self) -> Option<String> {
        std::fs::read_to_string(&self.path)
            .ok()
            .filter(|s| !s.is_empty())
    }

    fn clear(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
#[path = "draft_test.rs"]
mod tests;
