//! Authenticated operator API.
//!
//! Served on its own listener (`admin.bind_address`) when `admin.enabled`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::time::Instant;

use crate::http::response::ErrorBody;
use crate::lifecycle::startup::Core;
use crate::resilience::classifier::ErrorClassifier;
use crate::resilience::gate::ResilienceGate;
use crate::security::webhook::WebhookValidator;

use self::auth::admin_auth_middleware;
use self::handlers::*;

#[derive(Clone)]
pub struct AdminState {
    pub gate: Arc<ResilienceGate>,
    pub classifier: Arc<ErrorClassifier>,
    pub validator: Arc<WebhookValidator>,
    pub api_key: Arc<str>,
    pub started: Instant,
}

impl AdminState {
    pub fn new(core: &Core, api_key: &str) -> Self {
        Self {
            gate: core.gate.clone(),
            classifier: core.classifier.clone(),
            validator: core.validator.clone(),
            api_key: Arc::from(api_key),
            started: Instant::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("circuit '{0}' not found")]
    CircuitNotFound(String),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AdminError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AdminError::CircuitNotFound(_) => (StatusCode::NOT_FOUND, "CIRCUIT_NOT_FOUND"),
        };
        (status, Json(ErrorBody::new(code, self.to_string()))).into_response()
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/circuits", get(get_circuits))
        .route("/admin/circuits/{name}", get(get_circuit))
        .route("/admin/circuits/{name}/reset", post(reset_circuit))
        .route("/admin/webhook", get(get_webhook))
        .route("/admin/errors", get(get_errors))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
