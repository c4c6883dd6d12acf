//! Error classification and alerting.
//!
//! # Responsibilities
//! - Map a raw `GatewayFault` to a typed, severity-ranked `ClassifiedError`
//! - Attach a safe user message, an error code and an HTTP status
//! - Recommend a retry delay from the retry policy
//! - Raise alerts on critical errors and on bursts of high-severity errors
//!
//! # Classification order
//! ```text
//! security flag → circuit open → timeout → network → 401 → 400 / invalid field
//!   → declined business code → 429 → 5xx → credentials → unknown
//! ```
//!
//! # Design Decisions
//! - `classify` never fails; unrecognised input becomes `Unknown`
//! - The technical message is for logs only and is never serialized
//! - Alert windows are per type and trail the last five minutes

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::clock::unix_millis;
use crate::observability::events::{CoreEvent, ErrorClassifiedEvent, EventBus};
use crate::observability::metrics;
use crate::resilience::fault::GatewayFault;
use crate::resilience::retries::RetryConfig;

/// Trailing window used for burst alerting.
pub const ALERT_WINDOW: Duration = Duration::from_secs(300);

/// High-severity occurrences in the window above which an alert fires.
pub const HIGH_SEVERITY_ALERT_THRESHOLD: usize = 5;

const NETWORK_CODES: &[&str] = &["ECONNRESET", "ECONNREFUSED", "ENOTFOUND", "EPIPE", "EAI_AGAIN"];
const NETWORK_SIGNALS: &[&str] = &[
    "connection reset",
    "connection refused",
    "connection closed",
    "dns error",
    "network",
];
const AUTH_SIGNALS: &[&str] = &["unauthorized", "unauthenticated", "authentication failed"];
const VALIDATION_SIGNALS: &[&str] = &[
    "invalid field",
    "invalid_request",
    "validation",
    "missing required",
];
const RATE_LIMIT_SIGNALS: &[&str] = &["rate limit", "too many requests"];
const CONFIGURATION_SIGNALS: &[&str] = &[
    "credential",
    "api key",
    "api_key",
    "not configured",
    "configuration",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    Network,
    Timeout,
    Authentication,
    Validation,
    PaymentProcessing,
    RateLimit,
    Server,
    Configuration,
    SecurityViolation,
    Unknown,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::Network => "NETWORK",
            ErrorType::Timeout => "TIMEOUT",
            ErrorType::Authentication => "AUTHENTICATION",
            ErrorType::Validation => "VALIDATION",
            ErrorType::PaymentProcessing => "PAYMENT_PROCESSING",
            ErrorType::RateLimit => "RATE_LIMIT",
            ErrorType::Server => "SERVER",
            ErrorType::Configuration => "CONFIGURATION",
            ErrorType::SecurityViolation => "SECURITY_VIOLATION",
            ErrorType::Unknown => "UNKNOWN",
        }
    }

    /// Status a transport layer should answer with.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorType::Authentication => 401,
            ErrorType::Validation => 400,
            ErrorType::PaymentProcessing => 402,
            ErrorType::SecurityViolation => 403,
            ErrorType::RateLimit => 429,
            ErrorType::Network | ErrorType::Timeout | ErrorType::Server => 503,
            ErrorType::Configuration | ErrorType::Unknown => 500,
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            ErrorType::Validation => Severity::Low,
            ErrorType::Network
            | ErrorType::Timeout
            | ErrorType::PaymentProcessing
            | ErrorType::RateLimit
            | ErrorType::Unknown => Severity::Medium,
            ErrorType::Authentication | ErrorType::Server => Severity::High,
            ErrorType::Configuration | ErrorType::SecurityViolation => Severity::Critical,
        }
    }

    pub fn retryable(self) -> bool {
        matches!(
            self,
            ErrorType::Network | ErrorType::Timeout | ErrorType::RateLimit | ErrorType::Server
        )
    }

    fn default_code(self) -> &'static str {
        match self {
            ErrorType::Network => "NETWORK_ERROR",
            ErrorType::Timeout => "GATEWAY_TIMEOUT",
            ErrorType::Authentication => "AUTHENTICATION_FAILED",
            ErrorType::Validation => "INVALID_REQUEST",
            ErrorType::PaymentProcessing => "PAYMENT_DECLINED",
            ErrorType::RateLimit => "RATE_LIMITED",
            ErrorType::Server => "GATEWAY_UNAVAILABLE",
            ErrorType::Configuration => "CONFIGURATION_ERROR",
            ErrorType::SecurityViolation => "SECURITY_VIOLATION",
            ErrorType::Unknown => "UNKNOWN_ERROR",
        }
    }

    fn user_message(self) -> &'static str {
        match self {
            ErrorType::Network | ErrorType::Timeout => {
                "The payment provider could not be reached. Please try again shortly."
            }
            ErrorType::Authentication | ErrorType::Configuration => {
                "Payments are temporarily unavailable. Please contact support if this persists."
            }
            ErrorType::Validation => "Some payment details are invalid. Please check and try again.",
            ErrorType::PaymentProcessing => {
                "The payment was declined. Please use a different payment method."
            }
            ErrorType::RateLimit => "Too many payment attempts. Please wait a moment and try again.",
            ErrorType::Server => "The payment provider is having problems. Please try again later.",
            ErrorType::SecurityViolation => "The request was rejected.",
            ErrorType::Unknown => "Something went wrong while processing the payment.",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// Where a failure happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorContext {
    pub operation: Option<String>,
    /// Zero-based attempt that produced the failure.
    pub attempt: u32,
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &str, attempt: u32) -> Self {
        Self {
            operation: Some(operation.to_string()),
            attempt,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// A failure after classification.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{code}: {technical_message}")]
pub struct ClassifiedError {
    pub error_type: ErrorType,
    pub severity: Severity,
    pub code: String,
    pub retryable: bool,
    #[serde(skip_serializing)]
    pub technical_message: String,
    pub user_message: String,
    pub recommended_delay_ms: u64,
    pub http_status: u16,
    pub alert: bool,
    pub context: ErrorContext,
}

/// Classification totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassifierStats {
    pub total: u64,
    pub alerts: u64,
    pub by_type: BTreeMap<ErrorType, u64>,
    pub by_severity: BTreeMap<Severity, u64>,
    /// Occurrences per type inside the alert window.
    pub recent: BTreeMap<ErrorType, usize>,
}

#[derive(Debug, Default)]
struct ClassifierState {
    total: u64,
    alerts: u64,
    by_type: HashMap<ErrorType, u64>,
    by_severity: HashMap<Severity, u64>,
    recent: HashMap<ErrorType, VecDeque<Instant>>,
}

pub struct ErrorClassifier {
    policy: ArcSwap<RetryConfig>,
    events: EventBus,
    state: Mutex<ClassifierState>,
}

impl ErrorClassifier {
    pub fn new(policy: RetryConfig, events: EventBus) -> Self {
        Self {
            policy: ArcSwap::from_pointee(policy),
            events,
            state: Mutex::new(ClassifierState::default()),
        }
    }

    pub fn policy(&self) -> Arc<RetryConfig> {
        self.policy.load_full()
    }

    pub fn set_policy(&self, policy: RetryConfig) {
        self.policy.store(Arc::new(policy));
    }

    /// Classify a fault. Always returns a result.
    pub fn classify(&self, fault: &GatewayFault, context: ErrorContext) -> ClassifiedError {
        let error_type = detect(fault);
        let severity = error_type.severity();
        let code = match error_type {
            ErrorType::PaymentProcessing => fault
                .gateway_code
                .clone()
                .unwrap_or_else(|| error_type.default_code().to_string()),
            ErrorType::Server if fault.circuit_open => "CIRCUIT_OPEN".to_string(),
            _ => error_type.default_code().to_string(),
        };
        // An open circuit already decided the dependency is down.
        let retryable = error_type.retryable() && !fault.circuit_open;
        let delay = self.policy.load().delay_for(context.attempt, fault.retry_after);
        let alert = self.observe(error_type, severity);

        metrics::record_classified(error_type.as_str(), severity.as_str());
        if alert {
            metrics::record_alert(error_type.as_str());
        }
        tracing::debug!(
            error_type = %error_type,
            severity = severity.as_str(),
            retryable = retryable,
            operation = ?context.operation,
            attempt = context.attempt,
            error = %fault.message,
            "Classified gateway error"
        );

        let classified = ClassifiedError {
            error_type,
            severity,
            code,
            retryable,
            technical_message: fault.message.clone(),
            user_message: error_type.user_message().to_string(),
            recommended_delay_ms: delay.as_millis() as u64,
            http_status: error_type.http_status(),
            alert,
            context,
        };

        self.events
            .publish(CoreEvent::ErrorClassified(ErrorClassifiedEvent {
                error_type,
                severity,
                code: classified.code.clone(),
                retryable,
                recommended_delay_ms: classified.recommended_delay_ms,
                alert,
                timestamp_ms: unix_millis(),
            }));

        classified
    }

    /// Retry iff the error is retryable and attempts remain.
    pub fn should_retry(&self, error: &ClassifiedError, attempt: u32) -> bool {
        self.policy.load().should_retry(attempt, error.retryable)
    }

    fn observe(&self, error_type: ErrorType, severity: Severity) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        state.total += 1;
        *state.by_type.entry(error_type).or_default() += 1;
        *state.by_severity.entry(severity).or_default() += 1;

        let recent = state.recent.entry(error_type).or_default();
        while let Some(front) = recent.front() {
            if now.saturating_duration_since(*front) <= ALERT_WINDOW {
                break;
            }
            recent.pop_front();
        }
        recent.push_back(now);
        let occurrences = recent.len();

        let alert = match severity {
            Severity::Critical => true,
            Severity::High => occurrences > HIGH_SEVERITY_ALERT_THRESHOLD,
            _ => false,
        };
        if alert {
            state.alerts += 1;
        }
        alert
    }

    pub fn stats(&self) -> ClassifierStats {
        let now = Instant::now();
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        ClassifierStats {
            total: state.total,
            alerts: state.alerts,
            by_type: state.by_type.iter().map(|(k, v)| (*k, *v)).collect(),
            by_severity: state.by_severity.iter().map(|(k, v)| (*k, *v)).collect(),
            recent: state
                .recent
                .iter()
                .map(|(k, times)| {
                    let live = times
                        .iter()
                        .filter(|t| now.saturating_duration_since(**t) <= ALERT_WINDOW)
                        .count();
                    (*k, live)
                })
                .filter(|(_, count)| *count > 0)
                .collect(),
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Pick the error type for a fault.
fn detect(fault: &GatewayFault) -> ErrorType {
    let message = fault.message.to_ascii_lowercase();
    let code = fault.error_code.as_deref().unwrap_or_default();

    if fault.security_violation {
        return ErrorType::SecurityViolation;
    }
    if fault.circuit_open {
        return ErrorType::Server;
    }
    if fault.timed_out || code == "ETIMEDOUT" || message.contains("timed out") {
        return ErrorType::Timeout;
    }
    if NETWORK_CODES.contains(&code) || contains_any(&message, NETWORK_SIGNALS) {
        return ErrorType::Network;
    }
    if fault.status == Some(401) || contains_any(&message, AUTH_SIGNALS) {
        return ErrorType::Authentication;
    }
    if fault.status == Some(400) || contains_any(&message, VALIDATION_SIGNALS) {
        return ErrorType::Validation;
    }
    if fault.is_declined() && fault.status != Some(429) {
        return ErrorType::PaymentProcessing;
    }
    if fault.status == Some(429) || contains_any(&message, RATE_LIMIT_SIGNALS) {
        return ErrorType::RateLimit;
    }
    if matches!(fault.status, Some(500..=599)) {
        return ErrorType::Server;
    }
    if contains_any(&message, CONFIGURATION_SIGNALS) {
        return ErrorType::Configuration;
    }
    ErrorType::Unknown
}
