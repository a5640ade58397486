use super::*;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use crate::backoff::Backoff;

/// Plays back scripted outcomes, recording run start times and the peak
/// number of concurrent runs. When the script runs dry it parks until the
/// shutdown signal fires, like a server holding a long-poll open.
struct ScriptedCycle {
    script: Mutex<Vec<CycleOutcome>>,
    runs: Mutex<Vec<Instant>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedCycle {
    fn new(script: Vec<CycleOutcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            runs: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }

    fn run_times(&self) -> Vec<Instant> {
        self.runs.lock().unwrap().clone()
    }

    fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl PollCycle for ScriptedCycle {
    async fn run(&self, mut cancel: watch::Receiver<bool>) -> CycleOutcome {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        self.runs.lock().unwrap().push(Instant::now());

        let scripted = {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() { None } else { Some(script.remove(0)) }
        };
        let outcome = match scripted {
            Some(outcome) => outcome,
            None => {
                if !*cancel.borrow() {
                    let _ = cancel.changed().await;
                }
                CycleOutcome::Cancelled
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

fn backoff() -> Backoff {
    Backoff::new(Duration::from_millis(500), Duration::from_millis(1_000))
}

// =========================================================================
// re-arm + backoff policy
// =========================================================================

#[tokio::test(start_paused = true)]
async fn failures_back_off_success_rearms_immediately_and_resets() {
    use CycleOutcome::{Failed, Progress};

    let cycle = ScriptedCycle::new(vec![Failed, Failed, Failed, Progress, Failed]);
    let mut channel = PollChannel::new("test");
    channel.start(cycle.clone(), backoff());

    tokio::time::sleep(Duration::from_secs(30)).await;
    channel.stop();

    let times = cycle.run_times();
    assert_eq!(times.len(), 6, "5 scripted runs + 1 parked run");
    let diffs: Vec<u64> = times
        .windows(2)
        .map(|w| (w[1] - w[0]).as_millis() as u64)
        .collect();
    // 500 → 1000 → 1000 (ceiling), immediate after success, 500 (reset).
    assert_eq!(diffs, vec![500, 1_000, 1_000, 0, 500]);
}

#[tokio::test(start_paused = true)]
async fn requests_are_strictly_sequential() {
    use CycleOutcome::{Failed, Progress};

    let cycle = ScriptedCycle::new(vec![Progress, Failed, Progress, Failed]);
    let mut channel = PollChannel::new("test");
    channel.start(cycle.clone(), backoff());

    tokio::time::sleep(Duration::from_secs(10)).await;
    channel.stop();

    assert_eq!(cycle.max_active.load(Ordering::SeqCst), 1);
}

// =========================================================================
// idempotent start / stop
// =========================================================================

#[tokio::test(start_paused = true)]
async fn start_while_polling_is_a_no_op() {
    let first = ScriptedCycle::new(vec![]);
    let second = ScriptedCycle::new(vec![]);
    let mut channel = PollChannel::new("test");

    channel.start(first.clone(), backoff());
    channel.start(second.clone(), backoff());
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(channel.is_running());
    assert_eq!(first.run_count(), 1, "single in-flight request");
    assert_eq!(second.run_count(), 0, "second start must not spawn");
    channel.stop();
}

#[tokio::test(start_paused = true)]
async fn stop_transitions_to_idle_and_restart_works() {
    let cycle = ScriptedCycle::new(vec![]);
    let mut channel = PollChannel::new("test");

    channel.start(cycle.clone(), backoff());
    tokio::time::sleep(Duration::from_millis(10)).await;
    channel.stop();
    assert!(!channel.is_running());

    channel.start(cycle.clone(), backoff());
    assert!(channel.is_running());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(cycle.run_count(), 2);
    channel.stop();
}

#[tokio::test(start_paused = true)]
async fn stop_before_start_is_harmless() {
    let mut channel = PollChannel::new("test");
    channel.stop();
    assert!(!channel.is_running());
}

// =========================================================================
// cancellation silence
// =========================================================================

#[tokio::test(start_paused = true)]
async fn cancellation_never_triggers_backoff_or_rearm() {
    let cycle = ScriptedCycle::new(vec![]);
    let mut channel = PollChannel::new("test");

    channel.start(cycle.clone(), backoff());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(cycle.run_count(), 1);

    channel.stop();
    // Well past any backoff ceiling: a Failed outcome would have re-armed.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(cycle.run_count(), 1, "cancelled cycle must not re-arm");
}

#[tokio::test(start_paused = true)]
async fn cancelled_outcome_exits_without_retry() {
    let cycle = ScriptedCycle::new(vec![CycleOutcome::Cancelled]);
    let mut channel = PollChannel::new("test");

    channel.start(cycle.clone(), backoff());
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(cycle.run_count(), 1);
}
