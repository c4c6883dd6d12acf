//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway resilience metrics (calls, transitions, classifications)
//! - Define webhook ingestion metrics (validations, violations, cache sizes)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `gateway_circuit_transitions_total` (counter): transitions by circuit, target state
//! - `gateway_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_calls_total` (counter): calls by circuit, outcome
//! - `gateway_call_duration_seconds` (histogram): call latency by circuit
//! - `gateway_calls_rejected_total` (counter): fast-failed calls by circuit
//! - `gateway_retries_total` (counter): retry attempts by circuit
//! - `gateway_errors_classified_total` (counter): classifications by type, severity
//! - `gateway_alerts_total` (counter): alert signals by type
//! - `webhook_validations_total` (counter): validations by result
//! - `webhook_violations_total` (counter): violations by type, severity
//! - `webhook_cache_entries` (gauge): replay / rate-limit cache sizes
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Label values are short static strings where possible

use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

static DESCRIBE: Once = Once::new();

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Prometheus metrics endpoint started");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter");
        }
    }
}

fn describe_metrics() {
    DESCRIBE.call_once(|| {
        describe_counter!(
            "gateway_circuit_transitions_total",
            "Circuit breaker state transitions"
        );
        describe_gauge!(
            "gateway_circuit_state",
            "Circuit state (0=closed, 1=half-open, 2=open)"
        );
        describe_counter!("gateway_calls_total", "Gateway calls by outcome");
        describe_histogram!(
            "gateway_call_duration_seconds",
            "Gateway call latency in seconds"
        );
        describe_counter!(
            "gateway_calls_rejected_total",
            "Calls rejected without invoking the gateway"
        );
        describe_counter!("gateway_retries_total", "Retry attempts");
        describe_counter!(
            "gateway_errors_classified_total",
            "Classified gateway errors"
        );
        describe_counter!("gateway_alerts_total", "Alert signals raised");
        describe_counter!("webhook_validations_total", "Webhook validations by result");
        describe_counter!("webhook_violations_total", "Webhook security violations");
        describe_gauge!("webhook_cache_entries", "Entries in webhook security caches");
    });
}

pub fn record_transition(circuit: &str, to: &'static str, gauge_value: f64) {
    counter!(
        "gateway_circuit_transitions_total",
        "circuit" => circuit.to_string(),
        "to" => to
    )
    .increment(1);
    gauge!("gateway_circuit_state", "circuit" => circuit.to_string()).set(gauge_value);
}

pub fn record_call(circuit: &str, outcome: &'static str, duration: Duration) {
    counter!(
        "gateway_calls_total",
        "circuit" => circuit.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        "gateway_call_duration_seconds",
        "circuit" => circuit.to_string()
    )
    .record(duration.as_secs_f64());
}

pub fn record_rejected(circuit: &str) {
    counter!("gateway_calls_rejected_total", "circuit" => circuit.to_string()).increment(1);
}

pub fn record_retry(circuit: &str) {
    counter!("gateway_retries_total", "circuit" => circuit.to_string()).increment(1);
}

pub fn record_classified(error_type: &'static str, severity: &'static str) {
    counter!(
        "gateway_errors_classified_total",
        "type" => error_type,
        "severity" => severity
    )
    .increment(1);
}

pub fn record_alert(error_type: &'static str) {
    counter!("gateway_alerts_total", "type" => error_type).increment(1);
}

pub fn record_validation(result: &'static str) {
    counter!("webhook_validations_total", "result" => result).increment(1);
}

pub fn record_violation(kind: &'static str, severity: &'static str) {
    counter!(
        "webhook_violations_total",
        "type" => kind,
        "severity" => severity
    )
    .increment(1);
}

pub fn record_cache_size(cache: &'static str, entries: usize) {
    gauge!("webhook_cache_entries", "cache" => cache).set(entries as f64);
}
