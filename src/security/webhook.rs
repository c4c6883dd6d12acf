//! Inbound payment notification validation.
//!
//! # Responsibilities
//! - Authenticate gateway notifications before anything acts on them
//! - Enforce size, source, rate, freshness and uniqueness limits
//! - Report every rejection as a security violation event
//! - Purge expired replay and rate-limit entries on a schedule
//!
//! # Check order
//! ```text
//! payload size → IP allow-list → rate limit → timestamp → replay → signature
//! ```
//! The first failing check decides the result. A delivery's replay key is
//! recorded only after it passed every check.
//!
//! # Design Decisions
//! - `validate` never fails; it always returns a result value
//! - Settings live behind `ArcSwap` so secret rotation and allow-list edits
//!   apply without restarting or locking the hot path

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use bytes::Bytes;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::clock::{unix_millis, unix_secs};
use crate::observability::events::{CoreEvent, EventBus, SecurityViolationEvent};
use crate::observability::metrics;
use crate::security::access_control::{AllowListError, IpAllowList};
use crate::security::rate_limit::RateLimiter;
use crate::security::replay::{replay_key, ReplayGuard};
use crate::security::signature::{normalize_signature, verify_signature, SignatureAlgorithm};
use crate::security::violations::ViolationKind;

/// Timestamps above this are taken to be in milliseconds.
const MILLISECOND_TIMESTAMP_FLOOR: i64 = 10_000_000_000;

const SCORE_IP: u8 = 15;
const SCORE_RATE: u8 = 10;
const SCORE_TIMESTAMP: u8 = 20;
const SCORE_REPLAY: u8 = 15;
const SCORE_SIGNATURE: u8 = 40;

/// Webhook ingestion configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Mount the ingestion endpoint.
    pub enabled: bool,

    /// Route path for notifications.
    pub path: String,

    /// Shared HMAC secret.
    #[serde(skip_serializing)]
    pub secret_key: String,

    pub algorithm: SignatureAlgorithm,

    /// Maximum clock skew accepted, in seconds.
    pub timestamp_tolerance_secs: u64,

    /// Comma-separated IPs and CIDR ranges. Empty allows every source.
    pub ip_whitelist: String,

    pub max_payload_bytes: usize,

    pub rate_limit_window_ms: u64,

    pub rate_limit_max_requests: u32,

    /// How often expired replay and rate-limit entries are purged.
    pub sweep_interval_secs: u64,

    pub signature_header: String,

    pub timestamp_header: String,

    /// Take the source IP from `X-Forwarded-For` (behind a trusted proxy).
    pub trust_forwarded_for: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/webhooks/payment".to_string(),
            secret_key: String::new(),
            algorithm: SignatureAlgorithm::Sha256,
            timestamp_tolerance_secs: 300,
            ip_whitelist: String::new(),
            max_payload_bytes: 1024 * 1024,
            rate_limit_window_ms: 60_000,
            rate_limit_max_requests: 100,
            sweep_interval_secs: 60,
            signature_header: "x-webhook-signature".to_string(),
            timestamp_header: "x-webhook-timestamp".to_string(),
            trust_forwarded_for: false,
        }
    }
}

impl WebhookConfig {
    pub fn timestamp_tolerance(&self) -> Duration {
        Duration::from_secs(self.timestamp_tolerance_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Age after which replay and rate-limit entries are purged.
    pub fn retention(&self) -> Duration {
        self.timestamp_tolerance() * 2
    }
}

/// An inbound notification as extracted by the transport.
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    pub raw_payload: Bytes,
    pub signature: String,
    /// Unix timestamp as sent by the gateway (seconds or milliseconds).
    pub timestamp: String,
    pub source_ip: String,
    pub headers: HashMap<String, String>,
}

impl WebhookRequest {
    pub fn new(
        raw_payload: impl Into<Bytes>,
        signature: impl Into<String>,
        timestamp: impl Into<String>,
        source_ip: impl Into<String>,
    ) -> Self {
        Self {
            raw_payload: raw_payload.into(),
            signature: signature.into(),
            timestamp: timestamp.into(),
            source_ip: source_ip.into(),
            headers: HashMap::new(),
        }
    }
}

/// Outcome of validating one notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WebhookValidationResult {
    pub is_valid: bool,
    pub signature_valid: bool,
    pub timestamp_valid: bool,
    pub ip_allowed: bool,
    pub replay_detected: bool,
    pub rate_limited: bool,
    /// Sum of the weights of the checks that passed (0-100).
    pub security_score: u8,
    pub reason: String,
    pub violation: Option<ViolationKind>,
}

/// Aggregate validation counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidatorMetrics {
    pub received: u64,
    pub valid: u64,
    pub invalid: u64,
    pub violations: BTreeMap<ViolationKind, u64>,
    pub rate_limit_violations: u64,
    pub replay_cache_entries: usize,
    pub rate_limit_entries: usize,
}

/// Entries removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub replay_purged: usize,
    pub rate_limit_purged: usize,
}

struct ValidatorSettings {
    config: WebhookConfig,
    allow_list: IpAllowList,
}

pub struct WebhookValidator {
    settings: ArcSwap<ValidatorSettings>,
    replay: ReplayGuard,
    rate_limiter: RateLimiter,
    events: EventBus,
    received: AtomicU64,
    valid: AtomicU64,
    invalid: AtomicU64,
    violations: DashMap<ViolationKind, u64>,
}

impl WebhookValidator {
    pub fn new(config: WebhookConfig, events: EventBus) -> Result<Self, AllowListError> {
        let allow_list = IpAllowList::parse(&config.ip_whitelist)?;
        let rate_limiter =
            RateLimiter::new(config.rate_limit_window(), config.rate_limit_max_requests);
        Ok(Self {
            settings: ArcSwap::from_pointee(ValidatorSettings { config, allow_list }),
            replay: ReplayGuard::new(),
            rate_limiter,
            events,
            received: AtomicU64::new(0),
            valid: AtomicU64::new(0),
            invalid: AtomicU64::new(0),
            violations: DashMap::new(),
        })
    }

    /// Swap in new settings. Caches are kept.
    pub fn update(&self, config: WebhookConfig) -> Result<(), AllowListError> {
        let allow_list = IpAllowList::parse(&config.ip_whitelist)?;
        self.rate_limiter
            .set_limits(config.rate_limit_window(), config.rate_limit_max_requests);
        self.settings
            .store(Arc::new(ValidatorSettings { config, allow_list }));
        tracing::info!("Webhook validator settings updated");
        Ok(())
    }

    /// Current configuration.
    pub fn config(&self) -> WebhookConfig {
        self.settings.load().config.clone()
    }

    /// Validate one notification.
    pub fn validate(&self, request: &WebhookRequest) -> WebhookValidationResult {
        self.received.fetch_add(1, Ordering::Relaxed);
        let settings = self.settings.load();
        let config = &settings.config;
        let mut result = WebhookValidationResult::default();

        if request.raw_payload.len() > config.max_payload_bytes {
            return self.reject(ViolationKind::PayloadTooLarge, request, result);
        }

        if !settings.allow_list.allows(&request.source_ip) {
            return self.reject(ViolationKind::IpNotAllowed, request, result);
        }
        result.ip_allowed = true;
        result.security_score += SCORE_IP;

        if !self.rate_limiter.check(&request.source_ip) {
            result.rate_limited = true;
            return self.reject(ViolationKind::RateLimited, request, result);
        }
        result.security_score += SCORE_RATE;

        if !timestamp_is_fresh(&request.timestamp, config.timestamp_tolerance_secs) {
            return self.reject(ViolationKind::StaleTimestamp, request, result);
        }
        result.timestamp_valid = true;
        result.security_score += SCORE_TIMESTAMP;

        // One key per pair, whatever the header's casing or prefix.
        let signature = normalize_signature(config.algorithm, &request.signature);
        let key = replay_key(&signature, &request.timestamp);
        if self.replay.contains(&key) {
            result.replay_detected = true;
            return self.reject(ViolationKind::ReplayDetected, request, result);
        }

        if !verify_signature(
            config.algorithm,
            config.secret_key.as_bytes(),
            &request.timestamp,
            &request.raw_payload,
            &signature,
        ) {
            result.security_score += SCORE_REPLAY;
            return self.reject(ViolationKind::InvalidSignature, request, result);
        }
        result.signature_valid = true;

        if !self.replay.record(key) {
            // A concurrent delivery of the same pair was accepted first.
            result.replay_detected = true;
            result.security_score += SCORE_SIGNATURE;
            return self.reject(ViolationKind::ReplayDetected, request, result);
        }
        result.security_score += SCORE_REPLAY + SCORE_SIGNATURE;

        result.is_valid = true;
        result.reason = "valid".to_string();
        self.valid.fetch_add(1, Ordering::Relaxed);
        metrics::record_validation("valid");
        tracing::debug!(source_ip = %request.source_ip, "Webhook validated");
        result
    }

    fn reject(
        &self,
        kind: ViolationKind,
        request: &WebhookRequest,
        mut result: WebhookValidationResult,
    ) -> WebhookValidationResult {
        result.is_valid = false;
        result.reason = kind.reason().to_string();
        result.violation = Some(kind);

        self.invalid.fetch_add(1, Ordering::Relaxed);
        *self.violations.entry(kind).or_insert(0) += 1;

        let severity = kind.severity();
        metrics::record_validation("invalid");
        metrics::record_violation(kind.as_str(), severity.as_str());

        self.events
            .publish(CoreEvent::SecurityViolation(SecurityViolationEvent {
                violation: kind,
                source_ip: request.source_ip.clone(),
                severity,
                mitigation: kind.mitigation().iter().map(|m| m.to_string()).collect(),
                timestamp_ms: unix_millis(),
            }));
        result
    }

    /// Purge replay entries older than twice the tolerance and rate-limit
    /// windows that are both that old and past their own window.
    pub fn sweep(&self) -> SweepReport {
        let retention = self.settings.load().config.retention();
        let report = SweepReport {
            replay_purged: self.replay.purge(retention),
            rate_limit_purged: self.rate_limiter.purge(retention),
        };
        metrics::record_cache_size("replay", self.replay.len());
        metrics::record_cache_size("rate_limit", self.rate_limiter.len());
        report
    }

    pub fn metrics(&self) -> ValidatorMetrics {
        ValidatorMetrics {
            received: self.received.load(Ordering::Relaxed),
            valid: self.valid.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            violations: self
                .violations
                .iter()
                .map(|e| (*e.key(), *e.value()))
                .collect(),
            rate_limit_violations: self.rate_limiter.violations(),
            replay_cache_entries: self.replay.len(),
            rate_limit_entries: self.rate_limiter.len(),
        }
    }
}

/// True when `timestamp` parses and lies within `tolerance_secs` of now.
fn timestamp_is_fresh(timestamp: &str, tolerance_secs: u64) -> bool {
    let Ok(mut value) = timestamp.trim().parse::<i64>() else {
        return false;
    };
    if value > MILLISECOND_TIMESTAMP_FLOOR {
        value /= 1000;
    }
    let skew = unix_secs().saturating_sub(value).unsigned_abs();
    skew <= tolerance_secs
}
