//! Admission Gate
//!
//! Runs an HTTP front end that admits, delays, or rejects each request
//! under the protected prefix based on the caller's recent history.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace ─▶ admission ──┬─ Reject ─────────▶ 429
//!                                              │         ├─ AllowWithDelay ─▶ sleep ─┐
//!                                              │         └─ Allow ───────────────────┤
//!                                              ▼                                     ▼
//!                                       ┌─────────────┐                     ┌──────────────┐
//!                                       │ StateStore  │◀── sweeper          │ API handlers │
//!                                       └─────────────┘                     └──────────────┘
//! ```

use std::path::PathBuf;

use axum::{http::HeaderMap, routing::get, Json, Router};
use clap::Parser;
use tokio::net::TcpListener;

use admission_gate::config::{load_config, GateConfig};
use admission_gate::http::{GatewayServer, X_REQUEST_ID};
use admission_gate::lifecycle::{signals, Shutdown};
use admission_gate::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "admission-gate")]
#[command(about = "HTTP front end with per-client rate limiting and slowdown")]
struct Args {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

/// Minimal API mounted behind the gate.
fn api_router() -> Router {
    Router::new().route(
        "/api/v1/ping",
        get(|headers: HeaderMap| async move {
            let request_id = headers
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            Json(serde_json::json!({ "pong": true, "request_id": request_id }))
        }),
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability)?;
    tracing::info!("admission-gate v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        protected_prefix = %config.admission.protected_prefix,
        request_limit = config.admission.request_limit,
        max_delay_ms = ?config.admission.max_delay_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::listen(shutdown.clone()));

    let server = GatewayServer::new(config, api_router());
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
