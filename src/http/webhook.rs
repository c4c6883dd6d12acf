//! Inbound payment notification endpoint.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio::sync::mpsc::error::TrySendError;

use crate::clock::unix_millis;
use crate::http::request::{header_map, header_str, source_ip};
use crate::http::response::{webhook_rejection, ErrorBody};
use crate::http::server::AppState;
use crate::payments::types::ValidatedNotification;
use crate::security::violations::ViolationKind;
use crate::security::webhook::WebhookRequest;

/// `POST {webhook.path}`: validate, then queue for dispatch.
pub async fn webhook_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let config = state.validator.config();
    let (parts, body) = request.into_parts();

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let source = source_ip(&parts.headers, peer, config.trust_forwarded_for);

    // Bodies up to twice the limit reach the validator and are counted.
    let read_limit = config.max_payload_bytes.saturating_mul(2);
    let payload = match axum::body::to_bytes(body, read_limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(source_ip = %source, error = %e, "Webhook body rejected while reading");
            return webhook_rejection(ViolationKind::PayloadTooLarge);
        }
    };

    let webhook = WebhookRequest {
        raw_payload: payload.clone(),
        signature: header_str(&parts.headers, &config.signature_header),
        timestamp: header_str(&parts.headers, &config.timestamp_header),
        source_ip: source.clone(),
        headers: header_map(&parts.headers),
    };

    // Queue space is reserved before validation records the replay key.
    let slot = match state.forward_tx.try_reserve() {
        Ok(slot) => slot,
        Err(TrySendError::Full(())) => {
            tracing::warn!(source_ip = %source, "Notification queue full; asking gateway to redeliver");
            return unavailable();
        }
        Err(TrySendError::Closed(())) => {
            tracing::error!("Notification queue closed");
            return unavailable();
        }
    };

    let result = state.validator.validate(&webhook);
    if !result.is_valid {
        let kind = result.violation.unwrap_or(ViolationKind::InvalidSignature);
        let mut response = webhook_rejection(kind);
        if kind == ViolationKind::RateLimited {
            let window_secs = config.rate_limit_window_ms.div_ceil(1000);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(window_secs));
        }
        return response;
    }

    slot.send(ValidatedNotification {
        source_ip: source,
        received_at_ms: unix_millis(),
        body: payload,
    });
    (StatusCode::OK, Json(serde_json::json!({ "received": true }))).into_response()
}

fn unavailable() -> Response {
    let mut response = (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorBody::new("QUEUE_FULL", "Try again later")),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    response
}
