//! Progressive slowdown.
//!
//! Each request past `delay_after` in a window is held back by one more
//! `delay_increment` than the last. There is no ceiling unless `max_delay`
//! is configured.

use std::time::{Duration, Instant};

/// Per-key slowdown state. Keeps its own window start, independent of the
/// request counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayState {
    pub window_start: Instant,
    pub requests_in_window: u64,
}

impl DelayState {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            requests_in_window: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DelayAccumulator {
    delay_after: u64,
    delay_increment: Duration,
    window: Duration,
    max_delay: Option<Duration>,
}

impl DelayAccumulator {
    pub fn new(delay_after: u64, delay_increment: Duration, window: Duration) -> Self {
        Self {
            delay_after,
            delay_increment,
            window,
            max_delay: None,
        }
    }

    /// Clamp every computed delay to `max_delay`.
    pub fn with_max_delay(mut self, max_delay: Option<Duration>) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_expired(&self, state: &DelayState, now: Instant) -> bool {
        now.saturating_duration_since(state.window_start) >= self.window
    }

    pub fn record_and_delay(&self, state: &mut DelayState, now: Instant) -> Duration {
        if self.is_expired(state, now) {
            state.window_start = now;
            state.requests_in_window = 0;
        }

        state.requests_in_window = state.requests_in_window.saturating_add(1);
        self.delay_for(state.requests_in_window)
    }

    /// Delay owed by the `n`th request of a window.
    pub fn delay_for(&self, n: u64) -> Duration {
        let excess = n.saturating_sub(self.delay_after);
        let excess = u32::try_from(excess).unwrap_or(u32::MAX);
        let delay = self.delay_increment.saturating_mul(excess);

        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}
