//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::time::Duration;

use gateway_resilience::clock::unix_secs;
use gateway_resilience::config::GatewayConfig;
use gateway_resilience::resilience::CircuitBreakerConfig;
use gateway_resilience::security::signature::{compute_signature, SignatureAlgorithm};
use gateway_resilience::security::{WebhookConfig, WebhookRequest};

pub const SECRET: &str = "abc";
pub const SOURCE_IP: &str = "203.0.113.10";

/// Hex HMAC-SHA256 of `timestamp.payload` under `secret`.
pub fn sign(secret: &str, timestamp: &str, payload: &[u8]) -> String {
    compute_signature(SignatureAlgorithm::Sha256, secret.as_bytes(), timestamp, payload)
        .expect("HMAC accepts any key length")
}

/// Current Unix time in seconds, as a header value.
pub fn now_ts() -> String {
    unix_secs().to_string()
}

/// A correctly signed delivery from `SOURCE_IP`.
pub fn signed_request(payload: &str) -> WebhookRequest {
    let timestamp = now_ts();
    let signature = sign(SECRET, &timestamp, payload.as_bytes());
    WebhookRequest::new(payload.to_string(), signature, timestamp, SOURCE_IP)
}

pub fn webhook_config() -> WebhookConfig {
    WebhookConfig {
        secret_key: SECRET.to_string(),
        ..WebhookConfig::default()
    }
}

/// The circuit used by the end-to-end scenarios.
pub fn scenario_circuit() -> CircuitBreakerConfig {
    CircuitBreakerConfig::new()
        .with_error_threshold(50.0)
        .with_minimum_requests(10)
        .with_volume_threshold(10)
        .with_reset_timeout(Duration::from_millis(30_000))
}

pub fn gateway_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.webhook = webhook_config();
    config.observability.metrics_enabled = false;
    config
}
