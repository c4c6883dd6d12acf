//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds are percentages, timeouts > 0)
//! - Check addresses, CIDR entries and the signing secret
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{CircuitBreakerConfig, GatewayConfig};
use crate::security::access_control::IpAllowList;

/// Sample keys from docs and templates; never accepted for a live admin API.
const PLACEHOLDER_ADMIN_KEYS: &[&str] = &["CHANGE_ME_IN_PRODUCTION", "changeme", "change_me"];

/// One rejected configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "server.bind_address", &config.server.bind_address);
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }
    if config.server.forward_buffer == 0 {
        errors.push(ValidationError::new("server.forward_buffer", "must be > 0"));
    }

    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        let key = config.admin.api_key.trim();
        if key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "required when admin is enabled"));
        } else if PLACEHOLDER_ADMIN_KEYS.iter().any(|p| key.eq_ignore_ascii_case(p)) {
            errors.push(ValidationError::new("admin.api_key", "placeholder key must be replaced"));
        }
    }

    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    check_circuit(&mut errors, "circuit_breaker", &config.circuit_breaker);
    for (name, circuit) in &config.circuits {
        check_circuit(&mut errors, &format!("circuits.{}", name), circuit);
    }

    let webhook = &config.webhook;
    if webhook.enabled {
        if webhook.secret_key.is_empty() {
            errors.push(ValidationError::new(
                "webhook.secret_key",
                "required when webhook ingestion is enabled",
            ));
        }
        if !webhook.path.starts_with('/') {
            errors.push(ValidationError::new("webhook.path", "must start with '/'"));
        }
    }
    if webhook.timestamp_tolerance_secs == 0 {
        errors.push(ValidationError::new("webhook.timestamp_tolerance_secs", "must be > 0"));
    }
    if webhook.max_payload_bytes == 0 {
        errors.push(ValidationError::new("webhook.max_payload_bytes", "must be > 0"));
    }
    if webhook.rate_limit_window_ms == 0 {
        errors.push(ValidationError::new("webhook.rate_limit_window_ms", "must be > 0"));
    }
    if webhook.rate_limit_max_requests == 0 {
        errors.push(ValidationError::new("webhook.rate_limit_max_requests", "must be > 0"));
    }
    if webhook.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("webhook.sweep_interval_secs", "must be > 0"));
    }
    if let Err(e) = IpAllowList::parse(&webhook.ip_whitelist) {
        errors.push(ValidationError::new("webhook.ip_whitelist", e.to_string()));
    }

    let retry = &config.retry;
    if !retry.backoff_multiplier.is_finite() || retry.backoff_multiplier < 1.0 {
        errors.push(ValidationError::new("retry.backoff_multiplier", "must be >= 1.0"));
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        errors.push(ValidationError::new(
            "retry.base_delay_ms",
            "must not exceed retry.max_delay_ms",
        ));
    }

    if !config.gateway.base_url.is_empty() {
        match reqwest::Url::parse(&config.gateway.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(_) => errors.push(ValidationError::new("gateway.base_url", "must be http or https")),
            Err(e) => errors.push(ValidationError::new("gateway.base_url", e.to_string())),
        }
    }

    if config.events.buffer == 0 {
        errors.push(ValidationError::new("events.buffer", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("invalid socket address '{}'", value)));
    }
}

fn check_circuit(errors: &mut Vec<ValidationError>, prefix: &str, circuit: &CircuitBreakerConfig) {
    let percentages = [
        ("error_threshold_percentage", circuit.error_threshold_percentage),
        ("success_threshold_percentage", circuit.success_threshold_percentage),
        ("slow_call_rate_threshold", circuit.slow_call_rate_threshold),
    ];
    for (field, value) in percentages {
        if !(0.0..=100.0).contains(&value) {
            errors.push(ValidationError::new(
                format!("{}.{}", prefix, field),
                "must be between 0 and 100",
            ));
        }
    }

    let positive = [
        ("timeout_ms", circuit.timeout_ms),
        ("reset_timeout_ms", circuit.reset_timeout_ms),
        ("monitoring_window_ms", circuit.monitoring_window_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(format!("{}.{}", prefix, field), "must be > 0"));
        }
    }

    if circuit.sample_capacity == 0 {
        errors.push(ValidationError::new(format!("{}.sample_capacity", prefix), "must be > 0"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.webhook.secret_key = "s3cret".to_string();
        config
    }

    #[test]
    fn test_defaults_with_secret_are_valid() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let errors = validate_config(&GatewayConfig::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "webhook.secret_key");

        let mut config = GatewayConfig::default();
        config.webhook.enabled = false;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = valid();
        config.circuit_breaker.error_threshold_percentage = 150.0;
        config.circuit_breaker.timeout_ms = 0;
        config.webhook.ip_whitelist = "10.0.0.0/8, not-an-ip".to_string();
        config.server.bind_address = "nowhere".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"circuit_breaker.error_threshold_percentage"));
        assert!(fields.contains(&"circuit_breaker.timeout_ms"));
        assert!(fields.contains(&"webhook.ip_whitelist"));
        assert!(fields.contains(&"server.bind_address"));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_circuit_overrides_are_checked() {
        let mut config = valid();
        config.circuits.insert(
            "gateway.create_payment".to_string(),
            CircuitBreakerConfig {
                sample_capacity: 0,
                ..CircuitBreakerConfig::default()
            },
        );
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "circuits.gateway.create_payment.sample_capacity");
    }

    #[test]
    fn test_admin_requires_key() {
        let mut config = valid();
        config.admin.enabled = true;
        config.admin.api_key = " ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "admin.api_key");
    }

    #[test]
    fn test_admin_rejects_placeholder_key() {
        let mut config = valid();
        config.admin.enabled = true;
        config.admin.api_key = "CHANGE_ME_IN_PRODUCTION".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "admin.api_key");
        assert!(errors[0].message.contains("placeholder"));

        config.admin.api_key = "9f2c1e7a54b0d8".to_string();
        assert_eq!(validate_config(&config), Ok(()));

        // Placeholders are harmless while the admin API is off.
        config.admin.enabled = false;
        config.admin.api_key = "changeme".to_string();
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_gateway_url_scheme() {
        let mut config = valid();
        config.gateway.base_url = "ftp://gateway.example".to_string();
        assert!(validate_config(&config).is_err());
        config.gateway.base_url = "https://gateway.example/api".to_string();
        assert_eq!(validate_config(&config), Ok(()));
    }
}
