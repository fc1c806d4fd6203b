//! Admission verdicts.
//!
//! # Flow per request
//! ```text
//! get_or_create(key)           ── capacity exhausted ──▶ Reject(StoreCapacityExceeded)
//!     → record_and_check        ── over limit ─────────▶ Reject(RateLimitExceeded)
//!     → record_and_delay        ── delay > 0 ──────────▶ AllowWithDelay(delay)
//!                               ── otherwise ──────────▶ Allow
//! ```
//!
//! The per-key guard is dropped before the verdict is returned, so a caller
//! that sleeps on `AllowWithDelay` never holds up other requests.

use std::fmt;
use std::time::{Duration, Instant};

use crate::admission::clock::{Clock, SystemClock};
use crate::admission::delay::DelayAccumulator;
use crate::admission::key::Key;
use crate::admission::store::{StateStore, StoreError};
use crate::admission::window::WindowCounter;
use crate::config::AdmissionConfig;
use crate::observability::metrics;

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    RateLimitExceeded,
    StoreCapacityExceeded,
}

impl RejectReason {
    /// Machine-readable code for response bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::RateLimitExceeded => "rate_limit_exceeded",
            RejectReason::StoreCapacityExceeded => "store_capacity_exceeded",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of evaluating one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// Admit, but only after the caller has waited this long.
    AllowWithDelay(Duration),
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Verdict::Reject(_))
    }

    /// Wait owed before proceeding; zero for `Allow` and `Reject`.
    pub fn delay(&self) -> Duration {
        match self {
            Verdict::AllowWithDelay(delay) => *delay,
            _ => Duration::ZERO,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Allow => "allow",
            Verdict::AllowWithDelay(_) => "delay",
            Verdict::Reject(_) => "reject",
        }
    }
}

/// Counter position after a request, for rate-limit response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u64,
    pub remaining: u64,
    pub reset_after: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub verdict: Verdict,
    pub quota: Quota,
}

pub struct AdmissionPolicy<C = SystemClock> {
    counter: WindowCounter,
    slowdown: DelayAccumulator,
    store: StateStore,
    idle_threshold: Duration,
    clock: C,
}

impl<C: Clock> AdmissionPolicy<C> {
    /// Idle threshold defaults to twice the longer of the two windows.
    pub fn new(counter: WindowCounter, slowdown: DelayAccumulator, clock: C) -> Self {
        let stale_after = counter.window().max(slowdown.window());
        Self {
            counter,
            slowdown,
            store: StateStore::new(stale_after),
            idle_threshold: stale_after.saturating_mul(2),
            clock,
        }
    }

    pub fn from_config(config: &AdmissionConfig, clock: C) -> Self {
        let counter = WindowCounter::new(config.request_limit, config.window());
        let slowdown = DelayAccumulator::new(
            config.delay_after,
            config.delay_increment(),
            config.slowdown_window(),
        )
        .with_max_delay(config.max_delay());

        Self::new(counter, slowdown, clock)
            .with_idle_threshold(config.idle_eviction())
            .with_max_keys(config.max_keys)
    }

    pub fn with_idle_threshold(mut self, idle_threshold: Duration) -> Self {
        self.idle_threshold = idle_threshold;
        self
    }

    /// Cap the number of tracked keys. Meant for construction time: any
    /// entries already tracked are discarded.
    pub fn with_max_keys(mut self, max_keys: Option<usize>) -> Self {
        let stale_after = self.counter.window().max(self.slowdown.window());
        self.store = StateStore::new(stale_after).with_max_keys(max_keys);
        self
    }

    pub fn evaluate(&self, key: &Key, now: Instant) -> Verdict {
        self.evaluate_detailed(key, now).verdict
    }

    /// Evaluate with the clock's current time.
    pub fn admit(&self, key: &Key) -> Admission {
        self.evaluate_detailed(key, self.clock.now())
    }

    pub fn evaluate_detailed(&self, key: &Key, now: Instant) -> Admission {
        let mut entry = match self.store.get_or_create(key, now) {
            Ok(entry) => entry,
            Err(StoreError::CapacityExceeded { .. }) => {
                let admission = Admission {
                    verdict: Verdict::Reject(RejectReason::StoreCapacityExceeded),
                    quota: Quota {
                        limit: self.counter.limit(),
                        remaining: 0,
                        reset_after: self.counter.window(),
                    },
                };
                metrics::record_verdict(&admission.verdict);
                return admission;
            }
        };

        let outcome = self.counter.record_and_check(&mut entry.window, now);
        let verdict = if outcome.over_limit {
            Verdict::Reject(RejectReason::RateLimitExceeded)
        } else {
            match self.slowdown.record_and_delay(&mut entry.delay, now) {
                delay if delay.is_zero() => Verdict::Allow,
                delay => Verdict::AllowWithDelay(delay),
            }
        };
        entry.last_accessed = now;

        let quota = Quota {
            limit: self.counter.limit(),
            remaining: self.counter.remaining(&entry.window),
            reset_after: self.counter.reset_after(&entry.window, now),
        };
        drop(entry);

        match verdict {
            Verdict::Reject(reason) => {
                tracing::warn!(key = %key, count = outcome.count, reason = %reason, "Request rejected");
            }
            Verdict::AllowWithDelay(delay) => {
                tracing::debug!(key = %key, count = outcome.count, delay = ?delay, "Request slowed down");
            }
            Verdict::Allow => {}
        }
        metrics::record_verdict(&verdict);

        Admission { verdict, quota }
    }

    /// Evict entries idle for longer than the configured threshold.
    pub fn sweep(&self, now: Instant) -> usize {
        self.store.sweep(now, self.idle_threshold)
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn idle_threshold(&self) -> Duration {
        self.idle_threshold
    }

    pub fn limit(&self) -> u64 {
        self.counter.limit()
    }

    pub fn window(&self) -> Duration {
        self.counter.window()
    }
}
