//! Metrics collection and exposition.
//!
//! # Metrics
//! - `admission_verdicts_total` (counter): verdicts by `verdict` and `reason`
//! - `admission_delay_seconds` (histogram): delays handed out
//! - `admission_tracked_keys` (gauge): entries in the state store
//! - `admission_evictions_total` (counter): removed entries by `cause`
//!
//! Without an installed recorder every call is a no-op, so the admission
//! code records unconditionally.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::admission::Verdict;

/// Start the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_verdict(verdict: &Verdict) {
    let reason = match verdict {
        Verdict::Reject(reason) => reason.code(),
        _ => "none",
    };
    counter!("admission_verdicts_total", "verdict" => verdict.label(), "reason" => reason)
        .increment(1);

    if let Verdict::AllowWithDelay(delay) = verdict {
        histogram!("admission_delay_seconds").record(delay.as_secs_f64());
    }
}

pub fn record_tracked_keys(count: usize) {
    gauge!("admission_tracked_keys").set(count as f64);
}

pub fn record_eviction(cause: &'static str, count: u64) {
    counter!("admission_evictions_total", "cause" => cause).increment(count);
}
