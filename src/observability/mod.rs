//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Admission and HTTP layers produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt subscriber)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the HTTP layer and into request spans
//! - Metrics are cheap and recorded unconditionally

pub mod logging;
pub mod metrics;
