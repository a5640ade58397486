//! Long-poll channel state machine.
//!
//! DESIGN
//! ======
//! One [`PollChannel`] per channel (messages, system count). A started
//! channel runs a single task that executes its [`PollCycle`] strictly
//! sequentially: success re-arms immediately (the server rate-limits via
//! its long-poll hold time), failure re-arms after an exponential backoff
//! delay, cancellation exits to `Idle` without re-arming. The shutdown
//! signal is a `watch::channel(false)`; it is raced against both the
//! in-flight request (inside the cycle) and the backoff sleep.
//!
//! The two channels never share cancellation or backoff state.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::backoff::Backoff;

/// Result of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The request resolved and its payload was applied. Re-arm now.
    Progress,
    /// The request failed (non-cancellation). Re-arm after backoff.
    Failed,
    /// The channel's shutdown signal fired. Do not re-arm.
    Cancelled,
}

/// One unit of channel work: issue the long-poll request and apply its
/// response. Implementations must re-check the shutdown signal after the
/// request resolves and report [`CycleOutcome::Cancelled`] instead of
/// applying a stale response.
#[async_trait::async_trait]
pub trait PollCycle: Send + Sync {
    async fn run(&self, cancel: watch::Receiver<bool>) -> CycleOutcome;
}

// =============================================================================
// CHANNEL
// =============================================================================

/// `Idle → Polling → {Idle, Polling}` state machine wrapper around the
/// polling task. `start` on a running channel is a no-op; `stop` cancels
/// any in-flight request and transitions to `Idle` unconditionally.
pub struct PollChannel {
    name: &'static str,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl PollChannel {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name, shutdown: None, task: None }
    }

    /// `true` while the channel is in the `Polling` state.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shutdown.is_some()
    }

    /// Begin polling. Idempotent: a channel that is already `Polling`
    /// keeps its current task and in-flight request.
    pub fn start(&mut self, cycle: Arc<dyn PollCycle>, mut backoff: Backoff) {
        if self.is_running() {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let name = self.name;
        debug!(channel = name, "poll channel started");

        let task = tokio::spawn(async move {
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                match cycle.run(shutdown_rx.clone()).await {
                    CycleOutcome::Progress => backoff.reset(),
                    CycleOutcome::Cancelled => break,
                    CycleOutcome::Failed => {
                        let delay = backoff.next_delay();
                        debug!(
                            channel = name,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "poll cycle failed; backing off"
                        );
                        tokio::select! {
                            () = tokio::time::sleep(delay) => {}
                            _ = shutdown_rx.changed() => break,
                        }
                    }
                }
            }
            debug!(channel = name, "poll channel stopped");
        });

        self.shutdown = Some(shutdown_tx);
        self.task = Some(task);
    }

    /// Cancel any in-flight request and return to `Idle`. The polling task
    /// exits cooperatively; its late result, if any, is discarded by the
    /// cycle's own shutdown re-check.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        self.task = None;
    }
}

impl Drop for PollChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "poll_test.rs"]
mod tests;
