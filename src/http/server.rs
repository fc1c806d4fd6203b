//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the health endpoint and the hosted API
//! - Wire up middleware (request ID, tracing, admission, timeout)
//! - Spawn the eviction sweeper alongside the server
//! - Serve with client addresses attached for key extraction

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, middleware, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admission::{
    AdmissionPolicy, ClientIpExtractor, Clock, EvictionSweeper, KeyExtractor, SystemClock,
};
use crate::config::GateConfig;
use crate::http::middleware::admission_middleware;
use crate::http::request::{make_request_span, MakeRequestUuid};
use crate::lifecycle::Shutdown;

/// Application state injected into handlers and middleware.
pub struct AppState<C = SystemClock> {
    pub policy: Arc<AdmissionPolicy<C>>,
    pub extractor: Arc<dyn KeyExtractor>,
    pub enabled: bool,
    pub protected_prefix: Arc<str>,
    pub reject_message: Arc<str>,
    pub environment: Arc<str>,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            extractor: self.extractor.clone(),
            enabled: self.enabled,
            protected_prefix: self.protected_prefix.clone(),
            reject_message: self.reject_message.clone(),
            environment: self.environment.clone(),
        }
    }
}

impl<C: Clock> AppState<C> {
    pub fn new(config: &GateConfig, policy: Arc<AdmissionPolicy<C>>) -> Self {
        Self {
            policy,
            extractor: Arc::new(ClientIpExtractor::from_config(&config.key_extraction)),
            enabled: config.admission.enabled,
            protected_prefix: Arc::from(config.admission.protected_prefix.as_str()),
            reject_message: Arc::from(config.admission.reject_message.as_str()),
            environment: Arc::from(config.observability.environment.as_str()),
        }
    }

    /// Swap in a different key extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn KeyExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// `/api/` also covers the bare `/api`, but not `/apiary`.
    pub fn is_protected(&self, path: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let base = self.protected_prefix.trim_end_matches('/');
        path.starts_with(&*self.protected_prefix) || (!base.is_empty() && path == base)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub tracked_keys: usize,
}

async fn health_handler<C: Clock>(State(state): State<AppState<C>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.environment.to_string(),
        tracked_keys: state.policy.store().len(),
    })
}

/// Build the gate's router around `api`.
///
/// The timeout wraps only `api`, inside the admission layer, so time spent
/// in an admission delay does not count against it.
#[allow(deprecated)]
pub fn build_router<C: Clock>(config: &GateConfig, state: AppState<C>, api: Router) -> Router {
    let api = api.layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

    Router::new()
        .route("/health", get(health_handler::<C>))
        .with_state(state.clone())
        .merge(api)
        .layer(middleware::from_fn_with_state(state, admission_middleware::<C>))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// HTTP front end hosting an API behind admission control.
pub struct GatewayServer {
    router: Router,
    config: GateConfig,
    policy: Arc<AdmissionPolicy>,
}

impl GatewayServer {
    /// Create a new server with the given configuration and business routes.
    pub fn new(config: GateConfig, api: Router) -> Self {
        let policy = Arc::new(AdmissionPolicy::from_config(&config.admission, SystemClock));
        let state = AppState::new(&config, policy.clone());
        let router = build_router(&config, state, api);

        Self {
            router,
            config,
            policy,
        }
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_limit = self.config.admission.request_limit,
            window_secs = self.config.admission.window_secs,
            delay_after = self.config.admission.delay_after,
            delay_increment_ms = self.config.admission.delay_increment_ms,
            "HTTP server starting"
        );

        if self.config.admission.enabled {
            let sweeper = EvictionSweeper::new(
                self.policy.clone(),
                self.config.admission.sweep_interval(),
            );
            let sweeper_shutdown = shutdown.subscribe();
            tokio::spawn(async move {
                sweeper.run(sweeper_shutdown).await;
            });
        }

        let mut server_shutdown = shutdown.subscribe();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn policy(&self) -> &Arc<AdmissionPolicy> {
        &self.policy
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}
