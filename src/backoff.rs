//! Exponential backoff state for a single poll channel.

use std::time::Duration;

/// Doubling backoff clamped to a ceiling. Each channel owns its own
/// instance; the two channels never share backoff state.
#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    current: Option<Duration>,
}

impl Backoff {
    #[must_use]
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self { floor, ceiling: ceiling.max(floor), current: None }
    }

    /// Delay to wait before the next retry. First failure waits the floor,
    /// each subsequent failure doubles, clamped at the ceiling.
    pub fn next_delay(&mut self) -> Duration {
        let next = match self.current {
            None => self.floor,
            Some(d) => d.saturating_mul(2).min(self.ceiling),
        };
        self.current = Some(next);
        next
    }

    /// Called after a successful cycle; the next failure starts at the floor.
    pub fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
#[path = "backoff_test.rs"]
mod tests;
