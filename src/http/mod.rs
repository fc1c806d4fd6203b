//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → middleware/admission.rs (key → verdict → 429 / sleep / pass)
//!     → hosted API handlers (with timeout)
//!     → response.rs (RateLimit-* headers)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{build_router, AppState, GatewayServer, HealthStatus};
