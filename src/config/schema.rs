//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway
//! resilience service. All types derive Serde traits for deserialization from
//! config files, and every section has defaults so a minimal file works.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use crate::resilience::circuit_breaker::CircuitBreakerConfig;
pub use crate::resilience::retries::RetryConfig;
pub use crate::security::webhook::WebhookConfig;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Public listener for webhook ingestion and health.
    pub server: ServerConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Default circuit breaker settings for every dependency.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Per-dependency overrides keyed by circuit name.
    pub circuits: BTreeMap<String, CircuitBreakerConfig>,

    /// Inbound notification validation.
    pub webhook: WebhookConfig,

    /// Retry policy for gateway calls.
    pub retry: RetryConfig,

    /// Outbound payment gateway API.
    pub gateway: GatewayApiConfig,

    /// Core event channel.
    pub events: EventsConfig,
}

/// Public listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total time allowed for one HTTP request, in seconds.
    pub request_timeout_secs: u64,

    /// Capacity of the queue between validation and dispatch.
    pub forward_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            forward_buffer: 1024,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    #[serde(skip_serializing)]
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Outbound payment gateway API.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GatewayApiConfig {
    /// Base URL of the gateway API. Empty disables the HTTP client.
    pub base_url: String,

    /// Gateway API credential.
    #[serde(skip_serializing)]
    pub api_key: String,

    /// Transport-level timeout in milliseconds. Circuit timeouts apply on top.
    pub request_timeout_ms: u64,
}

impl Default for GatewayApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            request_timeout_ms: 15_000,
        }
    }
}

/// Core event channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EventsConfig {
    /// Events buffered per subscriber before the oldest are dropped.
    pub buffer: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { buffer: 1024 }
    }
}

impl GatewayConfig {
    /// Circuit settings for `name`: the override if present, else the defaults.
    pub fn circuit_config(&self, name: &str) -> CircuitBreakerConfig {
        self.circuits
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.circuit_breaker.clone())
    }
}
