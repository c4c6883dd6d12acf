//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the webhook and health handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener and stop on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::schema::GatewayConfig;
use crate::http::webhook::webhook_handler;
use crate::payments::types::ValidatedNotification;
use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::gate::ResilienceGate;
use crate::security::webhook::WebhookValidator;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub validator: Arc<WebhookValidator>,
    pub gate: Arc<ResilienceGate>,
    pub forward_tx: mpsc::Sender<ValidatedNotification>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub open_circuits: usize,
}

/// Public HTTP server.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &GatewayConfig, state: AppState) -> Self {
        Self {
            router: build_router(config, state),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then finish in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the public router with all middleware layers.
pub fn build_router(config: &GatewayConfig, state: AppState) -> Router {
    let mut router = Router::new().route("/health", get(health_handler));
    if config.webhook.enabled {
        router = router.route(&config.webhook.path, post(webhook_handler));
    }

    router
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.server.request_timeout_secs),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let open_circuits = state
        .gate
        .all_stats()
        .iter()
        .filter(|stats| stats.state == CircuitState::Open)
        .count();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        open_circuits,
    })
}

pub(crate) async fn wait_for(mut shutdown: broadcast::Receiver<()>) {
    let _ = shutdown.recv().await;
    tracing::info!("Shutdown signal received");
}
