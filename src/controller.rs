//! Widget controller — session/open-state machine over the two channels.
//!
//! DESIGN
//! ======
//! The controller owns everything mutable: the message store, the shared
//! session flags, both poll channels, and the event channel to the
//! front-end. Poll cycles receive `Arc` clones of the store and session
//! state and mutate them only in short synchronous sections after their
//! request resolves; the controller's own methods are the only other
//! writers.
//!
//! Channel lifecycle rules:
//! - messages channel: runs iff panel open ∧ authenticated ∧ document
//!   visible;
//! - system channel: runs iff authenticated ∧ document visible — it
//!   survives panel close so the unread badge stays current.
//!
//! ERROR HANDLING
//! ==============
//! Nothing here returns an error to the caller. One-shot failures
//! (bootstrap, send, new-thread) surface a single inline system notice;
//! poll failures are retried silently by the channels; a failed send
//! additionally emits [`WidgetEvent::InputRestored`] so the front-end can
//! put the draft back. The widget stays interactive after any failure.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::api;
use crate::backoff::Backoff;
use crate::config::WidgetConfig;
use crate::draft::DraftStore;
use crate::message::Message;
use crate::poll::{CycleOutcome, PollChannel, PollCycle};
use crate::store::MessageStore;
use crate::transport::Transport;

const SIGNIN_PROMPT: &str = "Sign in or register to send messages.";
const BOOTSTRAP_FAILED: &str = "Could not load the chat. Try again later.";
const SEND_FAILED: &str = "Message was not sent.";
const NEW_THREAD_FAILED: &str = "Could not start a new conversation.";

// =============================================================================
// EVENTS
// =============================================================================

/// What the front-end hears from the widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    /// A newly admitted message to append to the conversation view.
    MessageRendered(Message),
    /// An inline system notice (`level` is `info`/`warning`/`error`).
    Notice { text: String, level: String },
    /// Unread system-notification badge value (0 clears the badge).
    UnreadCount(u64),
    /// The user must sign in before this action can proceed.
    SignInRequired,
    /// Put this text back into the compose input (draft restore, or a
    /// failed send returning the user's words).
    InputRestored(String),
}

/// Flags shared between the controller and the system-count cycle.
#[derive(Debug, Default)]
struct SessionShared {
    is_open: bool,
    unread: u64,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// POLL CYCLES
// =============================================================================

/// Heavy channel: long-polls for new messages after the store cursor.
struct MessagesCycle {
    transport: Arc<dyn Transport>,
    config: WidgetConfig,
    store: Arc<Mutex<MessageStore>>,
    events: mpsc::UnboundedSender<WidgetEvent>,
}

#[async_trait::async_trait]
impl PollCycle for MessagesCycle {
    async fn run(&self, cancel: watch::Receiver<bool>) -> CycleOutcome {
        let after_id = lock(&self.store).cursor();
        match api::poll_messages(self.transport.as_ref(), &self.config, after_id, cancel.clone())
            .await
        {
            Ok(batch) => {
                if *cancel.borrow() {
                    // Resolved after the channel was stopped: discard.
                    return CycleOutcome::Cancelled;
                }
                let admitted: Vec<Message> = {
                    let mut store = lock(&self.store);
                    batch.iter().filter_map(|raw| store.admit(raw)).collect()
                };
                for msg in admitted {
                    let _ = self.events.send(WidgetEvent::MessageRendered(msg));
                }
                CycleOutcome::Progress
            }
            Err(e) if e.is_cancelled() => CycleOutcome::Cancelled,
            Err(e) => {
                debug!(error = %e, "messages poll failed");
                CycleOutcome::Failed
            }
        }
    }
}

/// Light channel: long-polls the pending-notification count. The count
/// only becomes a badge while the panel is closed; an open panel means
/// the user is already looking at the conversation.
struct SystemCountCycle {
    transport: Arc<dyn Transport>,
    config: WidgetConfig,
    session: Arc<Mutex<SessionShared>>,
    events: mpsc::UnboundedSender<WidgetEvent>,
}

#[async_trait::async_trait]
impl PollCycle for SystemCountCycle {
    async fn run(&self, cancel: watch::Receiver<bool>) -> CycleOutcome {
        match api::poll_system_count(self.transport.as_ref(), &self.config, cancel.clone()).await {
            Ok(count) => {
                if *cancel.borrow() {
                    return CycleOutcome::Cancelled;
                }
                // Re-emit even when the count is unchanged: the badge is a
                // display refresh, not an edge trigger.
                let update = {
                    let mut session = lock(&self.session);
                    if !session.is_open && count > 0 {
                        session.unread = count;
                        Some(count)
                    } else {
                        None
                    }
                };
                if let Some(count) = update {
                    let _ = self.events.send(WidgetEvent::UnreadCount(count));
                }
                CycleOutcome::Progress
            }
            Err(e) if e.is_cancelled() => CycleOutcome::Cancelled,
            Err(e) => {
                debug!(error = %e, "system poll failed");
                CycleOutcome::Failed
            }
        }
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

pub struct WidgetController {
    config: WidgetConfig,
    transport: Arc<dyn Transport>,
    drafts: Arc<dyn DraftStore>,
    store: Arc<Mutex<MessageStore>>,
    session: Arc<Mutex<SessionShared>>,
    events: mpsc::UnboundedSender<WidgetEvent>,
    is_authenticated: bool,
    thread_id: Option<String>,
    signin_prompted: bool,
    messages_channel: PollChannel,
    system_channel: PollChannel,
    messages_cycle: Arc<MessagesCycle>,
    system_cycle: Arc<SystemCountCycle>,
}

impl WidgetController {
    /// Build a controller and the event stream the front-end listens on.
    /// `is_authenticated` is fixed at page load, like the original widget's
    /// server-rendered auth flag.
    #[must_use]
    pub fn new(
        config: WidgetConfig,
        transport: Arc<dyn Transport>,
        drafts: Arc<dyn DraftStore>,
        is_authenticated: bool,
    ) -> (Self, mpsc::UnboundedReceiver<WidgetEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let store = Arc::new(Mutex::new(MessageStore::new()));
        let session = Arc::new(Mutex::new(SessionShared::default()));

        let messages_cycle = Arc::new(MessagesCycle {
            transport: transport.clone(),
            config: config.clone(),
            store: store.clone(),
            events: events.clone(),
        });
        let system_cycle = Arc::new(SystemCountCycle {
            transport: transport.clone(),
            config: config.clone(),
            session: session.clone(),
            events: events.clone(),
        });

        let controller = Self {
            config,
            transport,
            drafts,
            store,
            session,
            events,
            is_authenticated,
            thread_id: None,
            signin_prompted: false,
            messages_channel: PollChannel::new("messages"),
            system_channel: PollChannel::new("system"),
            messages_cycle,
            system_cycle,
        };
        (controller, events_rx)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        lock(&self.session).is_open
    }

    #[must_use]
    pub fn unread_count(&self) -> u64 {
        lock(&self.session).unread
    }

    #[must_use]
    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    fn backoff(&self) -> Backoff {
        Backoff::new(self.config.backoff_floor, self.config.backoff_ceiling)
    }

    fn notice(&self, text: &str, level: &str) {
        lock(&self.store).admit_system(text);
        let _ = self
            .events
            .send(WidgetEvent::Notice { text: text.to_owned(), level: level.to_owned() });
    }

    fn start_messages_channel(&mut self) {
        let backoff = self.backoff();
        self.messages_channel.start(self.messages_cycle.clone(), backoff);
    }

    fn start_system_channel(&mut self) {
        let backoff = self.backoff();
        self.system_channel.start(self.system_cycle.clone(), backoff);
    }

    /// Called once when the hosting page loads: the light channel runs
    /// even while the panel is closed, so the badge works from the start.
    pub fn page_load(&mut self) {
        if self.is_authenticated {
            self.start_system_channel();
        }
    }

    /// Open the chat panel.
    pub async fn open(&mut self) {
        lock(&self.session).is_open = true;

        if !self.is_authenticated {
            if !self.signin_prompted {
                self.signin_prompted = true;
                self.notice(SIGNIN_PROMPT, "info");
                let _ = self.events.send(WidgetEvent::SignInRequired);
            }
            return;
        }

        match api::bootstrap(self.transport.as_ref(), &self.config).await {
            Ok(boot) => {
                self.thread_id = boot.thread_id;

                let admitted: Vec<Message> = {
                    let mut store = lock(&self.store);
                    store.reset();
                    boot.messages.iter().filter_map(|raw| store.admit(raw)).collect()
                };
                for msg in admitted {
                    let _ = self.events.send(WidgetEvent::MessageRendered(msg));
                }
                for line in boot.system_lines {
                    self.notice(&line.text, &line.level);
                }

                // The conversation is on screen now; the badge is stale.
                let clear_badge = {
                    let mut session = lock(&self.session);
                    std::mem::take(&mut session.unread) != 0
                };
                if clear_badge {
                    let _ = self.events.send(WidgetEvent::UnreadCount(0));
                }

                if let Some(draft) = self.drafts.load() {
                    self.drafts.clear();
                    let _ = self.events.send(WidgetEvent::InputRestored(draft));
                }

                self.start_messages_channel();
                self.start_system_channel();
            }
            Err(e) => {
                warn!(error = %e, "bootstrap failed");
                self.notice(BOOTSTRAP_FAILED, "error");
                // Both channels stay stopped; re-opening retries.
            }
        }
    }

    /// Close the chat panel. The system channel keeps running so the
    /// unread badge stays current.
    pub fn close(&mut self) {
        lock(&self.session).is_open = false;
        self.messages_channel.stop();
    }

    /// The hosting document went hidden: no background network activity.
    pub fn document_hidden(&mut self) {
        self.messages_channel.stop();
        self.system_channel.stop();
    }

    /// The hosting document is visible again.
    pub fn document_visible(&mut self) {
        if !self.is_authenticated {
            return;
        }
        self.start_system_channel();
        if self.is_open() {
            self.start_messages_channel();
        }
    }

    /// Compose-submit. `raw` is the input exactly as typed; on a confirmed
    /// failure the same text comes back via [`WidgetEvent::InputRestored`].
    pub async fn submit(&mut self, raw: &str) {
        let text = raw.trim();
        if text.is_empty() {
            return;
        }

        if !self.is_authenticated {
            self.drafts.save(text);
            let _ = self.events.send(WidgetEvent::SignInRequired);
            return;
        }

        match api::send_message(
            self.transport.as_ref(),
            &self.config,
            text,
            self.thread_id.as_deref(),
        )
        .await
        {
            Ok(outcome) => {
                if let Some(raw_msg) = &outcome.message {
                    let admitted = lock(&self.store).admit(raw_msg);
                    if let Some(msg) = admitted {
                        let _ = self.events.send(WidgetEvent::MessageRendered(msg));
                    }
                }
                if let Some(error) = outcome.error {
                    self.notice(&error, "error");
                }
                for line in outcome.system_lines {
                    self.notice(&line.text, &line.level);
                }
            }
            Err(e) => {
                warn!(error = %e, "send failed after fallback");
                self.notice(SEND_FAILED, "error");
                let _ = self.events.send(WidgetEvent::InputRestored(raw.to_owned()));
            }
        }
    }

    /// Discard the current thread and start a fresh one.
    pub async fn new_thread(&mut self) {
        if !self.is_authenticated {
            return;
        }
        match api::new_thread(self.transport.as_ref(), &self.config).await {
            Ok(fresh) => {
                self.thread_id = fresh.thread_id;
                let admitted: Vec<Message> = {
                    let mut store = lock(&self.store);
                    store.reset();
                    fresh.messages.iter().filter_map(|raw| store.admit(raw)).collect()
                };
                for msg in admitted {
                    let _ = self.events.send(WidgetEvent::MessageRendered(msg));
                }
            }
            Err(e) => {
                warn!(error = %e, "new thread failed");
                self.notice(NEW_THREAD_FAILED, "error");
            }
        }
    }

    /// Page unload: stop everything.
    pub fn shutdown(&mut self) {
        self.messages_channel.stop();
        self.system_channel.stop();
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
