//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::net::TcpListener;

use admission_gate::admission::{AdmissionPolicy, DelayAccumulator, ManualClock, WindowCounter};
use admission_gate::config::GateConfig;
use admission_gate::http::{build_router, AppState};

/// Policy on a manual clock with millisecond-friendly parameters.
#[allow(dead_code)]
pub fn manual_policy(
    limit: u64,
    window: Duration,
    delay_after: u64,
    delay_increment: Duration,
) -> AdmissionPolicy<ManualClock> {
    AdmissionPolicy::new(
        WindowCounter::new(limit, window),
        DelayAccumulator::new(delay_after, delay_increment, window),
        ManualClock::new(),
    )
}

/// A small API with one protected and one unprotected route.
#[allow(dead_code)]
pub fn test_api() -> Router {
    Router::new()
        .route("/api/v1/items", get(|| async { "items" }))
        .route("/public/info", get(|| async { "info" }))
}

/// Router wired exactly as the server wires it, around a caller-supplied
/// policy.
#[allow(dead_code)]
pub fn router_with(config: &GateConfig, policy: Arc<AdmissionPolicy<ManualClock>>) -> Router {
    let state = AppState::new(config, policy);
    build_router(config, state, test_api())
}

/// Serve `router` on an ephemeral port with client addresses attached.
#[allow(dead_code)]
pub async fn spawn_router(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let app = router.into_make_service_with_connect_info::<SocketAddr>();
        let _ = axum::serve(listener, app).await;
    });
    addr
}
