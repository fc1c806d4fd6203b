//! HTTP admission control: per-caller fixed-window limits with progressive
//! slowdown, and an Axum front end that enforces the verdicts.

pub mod admission;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use admission::{AdmissionPolicy, Key, Verdict};
pub use config::GateConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
