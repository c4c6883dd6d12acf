use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::admin::{AdminError, AdminState};
use crate::resilience::circuit_breaker::{CircuitState, CircuitStats};
use crate::resilience::classifier::ClassifierStats;
use crate::security::webhook::{ValidatorMetrics, WebhookConfig};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub circuits: usize,
    pub open_circuits: Vec<String>,
    pub webhooks_received: u64,
    pub errors_classified: u64,
}

#[derive(Serialize)]
pub struct WebhookStatus {
    pub metrics: ValidatorMetrics,
    pub config: WebhookConfig,
}

#[derive(Serialize)]
pub struct ResetResponse {
    pub name: String,
    pub state: CircuitState,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let circuits = state.gate.all_stats();
    let open_circuits = circuits
        .iter()
        .filter(|c| c.state != CircuitState::Closed)
        .map(|c| c.name.clone())
        .collect::<Vec<_>>();
    let status = if open_circuits.is_empty() { "operational" } else { "degraded" };

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status,
        uptime_secs: state.started.elapsed().as_secs(),
        circuits: circuits.len(),
        open_circuits,
        webhooks_received: state.validator.metrics().received,
        errors_classified: state.classifier.stats().total,
    })
}

pub async fn get_circuits(State(state): State<AdminState>) -> Json<Vec<CircuitStats>> {
    Json(state.gate.all_stats())
}

pub async fn get_circuit(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<CircuitStats>, AdminError> {
    state
        .gate
        .stats(&name)
        .map(Json)
        .ok_or(AdminError::CircuitNotFound(name))
}

pub async fn reset_circuit(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<ResetResponse>, AdminError> {
    if !state.gate.reset(&name) {
        return Err(AdminError::CircuitNotFound(name));
    }
    tracing::info!(circuit = %name, "Circuit reset via admin API");
    Ok(Json(ResetResponse {
        name,
        state: CircuitState::Closed,
    }))
}

pub async fn get_webhook(State(state): State<AdminState>) -> Json<WebhookStatus> {
    Json(WebhookStatus {
        metrics: state.validator.metrics(),
        config: state.validator.config(),
    })
}

pub async fn get_errors(State(state): State<AdminState>) -> Json<ClassifierStats> {
    Json(state.classifier.stats())
}
