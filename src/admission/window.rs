//! Fixed-window request counting.

use std::time::{Duration, Instant};

/// Per-key counter state for the current window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowState {
    pub window_start: Instant,
    pub count: u64,
}

impl WindowState {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
        }
    }
}

/// Result of recording one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOutcome {
    pub count: u64,
    pub over_limit: bool,
}

/// Fixed-window counter with an exclusive upper bound: requests `1..=limit`
/// pass, request `limit + 1` is the first one over.
#[derive(Debug, Clone)]
pub struct WindowCounter {
    limit: u64,
    window: Duration,
}

impl WindowCounter {
    pub fn new(limit: u64, window: Duration) -> Self {
        Self { limit, window }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether `state`'s window has elapsed at `now`.
    pub fn is_expired(&self, state: &WindowState, now: Instant) -> bool {
        now.saturating_duration_since(state.window_start) >= self.window
    }

    pub fn record_and_check(&self, state: &mut WindowState, now: Instant) -> WindowOutcome {
        if self.is_expired(state, now) {
            state.window_start = now;
            state.count = 0;
        }

        state.count = state.count.saturating_add(1);

        WindowOutcome {
            count: state.count,
            over_limit: state.count > self.limit,
        }
    }

    /// Requests left before the limit is hit.
    pub fn remaining(&self, state: &WindowState) -> u64 {
        self.limit.saturating_sub(state.count)
    }

    /// Time until `state`'s window rolls over.
    pub fn reset_after(&self, state: &WindowState, now: Instant) -> Duration {
        match state.window_start.checked_add(self.window) {
            Some(end) => end.saturating_duration_since(now),
            None => Duration::MAX,
        }
    }
}
