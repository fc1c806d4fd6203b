//! Background eviction of idle admission state.
//!
//! # Responsibilities
//! - Periodically sweep the policy's store
//! - Stop on the shutdown broadcast

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::admission::clock::Clock;
use crate::admission::policy::AdmissionPolicy;

pub struct EvictionSweeper<C: Clock> {
    policy: Arc<AdmissionPolicy<C>>,
    interval: Duration,
}

impl<C: Clock> EvictionSweeper<C> {
    pub fn new(policy: Arc<AdmissionPolicy<C>>, interval: Duration) -> Self {
        Self { policy, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.interval,
            idle_threshold = ?self.policy.idle_threshold(),
            "Eviction sweeper starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        // The first tick completes immediately; there is nothing to sweep yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Eviction sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn sweep_once(&self) -> usize {
        let now = self.policy.clock().now();
        let removed = self.policy.sweep(now);
        let remaining = self.policy.store().len();
        if removed > 0 {
            tracing::info!(removed, remaining, "Evicted idle admission entries");
        } else {
            tracing::debug!(remaining, "Sweep found no idle entries");
        }
        removed
    }
}
