//! Circuit breaker state machine for one gateway dependency.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a limited number of probe calls test for recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open:      error rate or slow-call rate over threshold,
//!                     once minimum_requests and volume_threshold are met
//! Open → Half-Open:   first admission attempt after next_retry
//! Half-Open → Open:   any probe fails
//! Half-Open → Closed: half_open_max_requests probes recorded and the
//!                     probe success rate reaches success_threshold_percentage
//! ```
//!
//! # Design Decisions
//! - Every transition bumps a generation counter; outcomes carrying an older
//!   generation update metrics but never drive a transition
//! - The record is plain data guarded by the gate's per-name mutex; `now` is
//!   passed in so the machine is deterministic under test

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::clock::unix_millis;
use crate::resilience::statistics::{
    OutcomeSample, RollingStatistics, StatisticsSnapshot, DEFAULT_SAMPLE_CAPACITY,
};

/// Maximum transitions kept in a record's history.
const MAX_HISTORY: usize = 256;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding used for the state gauge.
    pub fn gauge_value(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-dependency circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failure percentage that trips the circuit.
    pub error_threshold_percentage: f64,

    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,

    /// Time spent Open before probing, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Samples required before the error rate is evaluated.
    pub minimum_requests: u32,

    /// Minimum traffic volume before the error rate is evaluated.
    pub volume_threshold: u32,

    /// Concurrent probes admitted in Half-Open; also the number of probe
    /// outcomes needed before the circuit may close.
    pub half_open_max_requests: u32,

    /// Maximum age of samples used for rates, in milliseconds.
    pub monitoring_window_ms: u64,

    /// Probe success percentage required to close from Half-Open.
    pub success_threshold_percentage: f64,

    /// Calls slower than this (milliseconds) count as slow.
    pub slow_call_duration_ms: u64,

    /// Slow-call percentage that trips the circuit.
    pub slow_call_rate_threshold: f64,

    /// Ring buffer capacity for outcome samples.
    pub sample_capacity: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold_percentage: 50.0,
            timeout_ms: 10_000,
            reset_timeout_ms: 30_000,
            minimum_requests: 10,
            volume_threshold: 10,
            half_open_max_requests: 3,
            monitoring_window_ms: 60_000,
            success_threshold_percentage: 60.0,
            slow_call_duration_ms: 5_000,
            slow_call_rate_threshold: 80.0,
            sample_capacity: DEFAULT_SAMPLE_CAPACITY,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error_threshold(mut self, percentage: f64) -> Self {
        self.error_threshold_percentage = percentage;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_minimum_requests(mut self, minimum: u32) -> Self {
        self.minimum_requests = minimum;
        self
    }

    pub fn with_volume_threshold(mut self, volume: u32) -> Self {
        self.volume_threshold = volume;
        self
    }

    pub fn with_half_open_max_requests(mut self, probes: u32) -> Self {
        self.half_open_max_requests = probes;
        self
    }

    pub fn with_success_threshold(mut self, percentage: f64) -> Self {
        self.success_threshold_percentage = percentage;
        self
    }

    pub fn with_slow_call(mut self, duration: Duration, rate_percentage: f64) -> Self {
        self.slow_call_duration_ms = duration.as_millis() as u64;
        self.slow_call_rate_threshold = rate_percentage;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn monitoring_window(&self) -> Duration {
        Duration::from_millis(self.monitoring_window_ms)
    }

    pub fn slow_call_duration(&self) -> Duration {
        Duration::from_millis(self.slow_call_duration_ms)
    }

    fn probe_quota(&self) -> u32 {
        self.half_open_max_requests.max(1)
    }
}

/// One entry in a circuit's state history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateTransition {
    pub from: CircuitState,
    pub to: CircuitState,
    pub reason: String,
    pub timestamp_ms: u64,
}

/// Lifetime call counters for a circuit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CircuitCounters {
    pub total_requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub slow_calls: u64,
    pub rejected: u64,
    pub fallbacks: u64,
}

/// Read-only view of a circuit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitStats {
    pub name: String,
    pub state: CircuitState,
    pub counters: CircuitCounters,
    pub window: StatisticsSnapshot,
    pub active_probes: u32,
    /// Unix milliseconds at which an Open circuit starts probing.
    pub next_retry_at_ms: Option<u64>,
    pub history: Vec<StateTransition>,
}

/// Result of asking a record to admit a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted { generation: u64, probe: bool },
    Rejected {
        state: CircuitState,
        retry_after: Option<Duration>,
    },
}

/// Outcome of one admitted call, as reported back to the record.
#[derive(Debug, Clone, Copy)]
pub struct CallOutcome {
    pub success: bool,
    pub timed_out: bool,
    pub duration: Duration,
}

/// State, counters and history for one dependency.
#[derive(Debug)]
pub struct CircuitRecord {
    name: String,
    config: CircuitBreakerConfig,
    state: CircuitState,
    generation: u64,
    counters: CircuitCounters,
    statistics: RollingStatistics,
    history: VecDeque<StateTransition>,
    next_retry: Option<Instant>,
    next_retry_at_ms: Option<u64>,
    active_probes: u32,
    probe_successes: u32,
    probe_failures: u32,
}

impl CircuitRecord {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let statistics = RollingStatistics::new(config.sample_capacity, config.monitoring_window());
        Self {
            name: name.into(),
            config,
            state: CircuitState::Closed,
            generation: 0,
            counters: CircuitCounters::default(),
            statistics,
            history: VecDeque::new(),
            next_retry: None,
            next_retry_at_ms: None,
            active_probes: 0,
            probe_successes: 0,
            probe_failures: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Apply new settings without touching state or counters. The rolling
    /// window is rebuilt only when its bounds change.
    pub fn reconfigure(&mut self, config: CircuitBreakerConfig) {
        if config.sample_capacity != self.config.sample_capacity
            || config.monitoring_window_ms != self.config.monitoring_window_ms
        {
            self.statistics =
                RollingStatistics::new(config.sample_capacity, config.monitoring_window());
        }
        self.config = config;
    }

    /// Decide whether a call may proceed.
    ///
    /// An Open circuit whose retry time has passed moves to Half-Open here,
    /// before the probe quota is checked. The returned transition, if any,
    /// must be published by the caller.
    pub fn admit(&mut self, now: Instant) -> (Admission, Option<StateTransition>) {
        match self.state {
            CircuitState::Closed => (
                Admission::Admitted {
                    generation: self.generation,
                    probe: false,
                },
                None,
            ),
            CircuitState::Open => {
                let due = self.next_retry.map_or(true, |at| now >= at);
                if due {
                    let transition =
                        self.transition(CircuitState::HalfOpen, "reset timeout elapsed".into(), now);
                    (self.admit_probe(), Some(transition))
                } else {
                    self.counters.rejected += 1;
                    let retry_after = self.next_retry.map(|at| at.saturating_duration_since(now));
                    (
                        Admission::Rejected {
                            state: CircuitState::Open,
                            retry_after,
                        },
                        None,
                    )
                }
            }
            CircuitState::HalfOpen => (self.admit_probe(), None),
        }
    }

    fn admit_probe(&mut self) -> Admission {
        if self.active_probes < self.config.probe_quota() {
            self.active_probes += 1;
            Admission::Admitted {
                generation: self.generation,
                probe: true,
            }
        } else {
            self.counters.rejected += 1;
            Admission::Rejected {
                state: CircuitState::HalfOpen,
                retry_after: None,
            }
        }
    }

    /// Record the outcome of an admitted call.
    pub fn record(
        &mut self,
        generation: u64,
        probe: bool,
        outcome: CallOutcome,
        now: Instant,
    ) -> Option<StateTransition> {
        let slow = outcome.duration > self.config.slow_call_duration();

        self.counters.total_requests += 1;
        if outcome.success {
            self.counters.successes += 1;
        } else {
            self.counters.failures += 1;
        }
        if outcome.timed_out {
            self.counters.timeouts += 1;
        }
        if slow {
            self.counters.slow_calls += 1;
        }

        self.statistics.record(OutcomeSample {
            timestamp: now,
            success: outcome.success,
            duration: outcome.duration,
            slow,
        });

        if generation != self.generation {
            // Admitted under an earlier state; metrics only.
            return None;
        }

        match self.state {
            CircuitState::Closed => self.evaluate_trip(now),
            CircuitState::HalfOpen => {
                if probe {
                    self.active_probes = self.active_probes.saturating_sub(1);
                }
                if !outcome.success {
                    self.probe_failures += 1;
                    let reason = if outcome.timed_out {
                        "half-open probe timed out"
                    } else {
                        "half-open probe failed"
                    };
                    return Some(self.transition(CircuitState::Open, reason.into(), now));
                }

                self.probe_successes += 1;
                let completed = self.probe_successes + self.probe_failures;
                let success_rate = self.probe_successes as f64 * 100.0 / completed as f64;
                if completed >= self.config.probe_quota()
                    && success_rate >= self.config.success_threshold_percentage
                {
                    let reason = format!(
                        "probe success rate {:.1}% reached threshold {}%",
                        success_rate, self.config.success_threshold_percentage
                    );
                    return Some(self.transition(CircuitState::Closed, reason, now));
                }
                None
            }
            _ => None,
        }
    }

    fn evaluate_trip(&mut self, now: Instant) -> Option<StateTransition> {
        let total = self.statistics.len() as u64;
        if total < u64::from(self.config.minimum_requests)
            || total < u64::from(self.config.volume_threshold)
        {
            return None;
        }

        let error_rate = self.statistics.error_rate();
        if error_rate >= self.config.error_threshold_percentage {
            let reason = format!(
                "error rate {:.1}% reached threshold {}%",
                error_rate, self.config.error_threshold_percentage
            );
            return Some(self.transition(CircuitState::Open, reason, now));
        }

        let slow_rate = self.statistics.slow_call_rate();
        if slow_rate >= self.config.slow_call_rate_threshold {
            let reason = format!(
                "slow call rate {:.1}% reached threshold {}%",
                slow_rate, self.config.slow_call_rate_threshold
            );
            return Some(self.transition(CircuitState::Open, reason, now));
        }

        None
    }

    /// Give back a probe slot for a call that never reported an outcome.
    pub fn release_probe(&mut self, generation: u64) {
        if generation == self.generation && self.state == CircuitState::HalfOpen {
            self.active_probes = self.active_probes.saturating_sub(1);
        }
    }

    pub fn record_fallback(&mut self) {
        self.counters.fallbacks += 1;
    }

    /// Force the circuit Closed and wipe counters and history.
    pub fn reset(&mut self, now: Instant) -> StateTransition {
        let from = self.state;
        self.counters = CircuitCounters::default();
        self.statistics.clear();
        self.history.clear();
        self.enter(CircuitState::Closed, now);

        let entry = StateTransition {
            from,
            to: CircuitState::Closed,
            reason: "manual reset".into(),
            timestamp_ms: unix_millis(),
        };
        self.push_history(entry.clone());
        entry
    }

    fn transition(&mut self, to: CircuitState, reason: String, now: Instant) -> StateTransition {
        let from = self.state;
        self.enter(to, now);

        let entry = StateTransition {
            from,
            to,
            reason,
            timestamp_ms: unix_millis(),
        };
        self.push_history(entry.clone());
        entry
    }

    fn enter(&mut self, to: CircuitState, now: Instant) {
        self.state = to;
        self.generation += 1;
        self.active_probes = 0;
        self.probe_successes = 0;
        self.probe_failures = 0;

        match to {
            CircuitState::Open => {
                let reset_timeout = self.config.reset_timeout();
                self.next_retry = Some(now + reset_timeout);
                self.next_retry_at_ms = Some(unix_millis() + reset_timeout.as_millis() as u64);
            }
            CircuitState::Closed => {
                self.next_retry = None;
                self.next_retry_at_ms = None;
                self.statistics.clear();
            }
            CircuitState::HalfOpen => {
                self.next_retry = None;
                self.next_retry_at_ms = None;
            }
        }
    }

    fn push_history(&mut self, entry: StateTransition) {
        if self.history.len() == MAX_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }

    /// Derived rates over the current sample window.
    pub fn window(&self) -> StatisticsSnapshot {
        self.statistics.snapshot()
    }

    pub fn snapshot(&self) -> CircuitStats {
        CircuitStats {
            name: self.name.clone(),
            state: self.state,
            counters: self.counters.clone(),
            window: self.window(),
            active_probes: self.active_probes,
            next_retry_at_ms: self.next_retry_at_ms,
            history: self.history.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_error_threshold(50.0)
            .with_minimum_requests(4)
            .with_volume_threshold(4)
            .with_reset_timeout(Duration::from_secs(30))
            .with_half_open_max_requests(2)
    }

    fn ok() -> CallOutcome {
        CallOutcome {
            success: true,
            timed_out: false,
            duration: Duration::from_millis(5),
        }
    }

    fn failed() -> CallOutcome {
        CallOutcome {
            success: false,
            timed_out: false,
            duration: Duration::from_millis(5),
        }
    }

    fn admit(record: &mut CircuitRecord, now: Instant) -> (u64, bool) {
        match record.admit(now).0 {
            Admission::Admitted { generation, probe } => (generation, probe),
            other => panic!("expected admission, got {:?}", other),
        }
    }

    fn trip(record: &mut CircuitRecord, now: Instant) {
        for _ in 0..4 {
            let (generation, probe) = admit(record, now);
            record.record(generation, probe, failed(), now);
        }
        assert_eq!(record.state(), CircuitState::Open);
    }

    #[test]
    fn test_stays_closed_below_minimum_requests() {
        let now = Instant::now();
        let mut record = CircuitRecord::new("gateway", config());
        for _ in 0..3 {
            let (generation, probe) = admit(&mut record, now);
            assert!(record.record(generation, probe, failed(), now).is_none());
        }
        assert_eq!(record.state(), CircuitState::Closed);
    }

    #[test]
    fn test_trips_once_threshold_reached() {
        let now = Instant::now();
        let mut record = CircuitRecord::new("gateway", config());
        trip(&mut record, now);

        let stats = record.snapshot();
        assert_eq!(stats.history.len(), 1);
        assert_eq!(stats.history[0].from, CircuitState::Closed);
        assert_eq!(stats.history[0].to, CircuitState::Open);
        assert!(stats.next_retry_at_ms.is_some());
    }

    #[test]
    fn test_open_rejects_until_retry_time() {
        let now = Instant::now();
        let mut record = CircuitRecord::new("gateway", config());
        trip(&mut record, now);

        let (admission, transition) = record.admit(now + Duration::from_secs(10));
        assert!(transition.is_none());
        match admission {
            Admission::Rejected { state, retry_after } => {
                assert_eq!(state, CircuitState::Open);
                assert_eq!(retry_after, Some(Duration::from_secs(20)));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(record.snapshot().counters.rejected, 1);
    }

    #[test]
    fn test_moves_to_half_open_before_admission() {
        let now = Instant::now();
        let mut record = CircuitRecord::new("gateway", config());
        trip(&mut record, now);

        let later = now + Duration::from_secs(30);
        let (admission, transition) = record.admit(later);
        let transition = transition.expect("transition to half-open");
        assert_eq!(transition.to, CircuitState::HalfOpen);
        assert!(matches!(admission, Admission::Admitted { probe: true, .. }));
        assert_eq!(record.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_limits_concurrent_probes() {
        let now = Instant::now();
        let mut record = CircuitRecord::new("gateway", config());
        trip(&mut record, now);
        let later = now + Duration::from_secs(31);

        admit(&mut record, later);
        admit(&mut record, later);
        assert!(matches!(
            record.admit(later).0,
            Admission::Rejected {
                state: CircuitState::HalfOpen,
                ..
            }
        ));
    }

    #[test]
    fn test_probe_failure_reopens_and_ignores_other_probes() {
        let now = Instant::now();
        let mut record = CircuitRecord::new("gateway", config());
        trip(&mut record, now);
        let later = now + Duration::from_secs(31);

        let (gen_a, _) = admit(&mut record, later);
        let (gen_b, _) = admit(&mut record, later);

        let transition = record.record(gen_a, true, failed(), later).expect("reopen");
        assert_eq!(transition.to, CircuitState::Open);

        // The second probe succeeds after the circuit already re-opened.
        assert!(record.record(gen_b, true, ok(), later).is_none());
        assert_eq!(record.state(), CircuitState::Open);
    }

    #[test]
    fn test_closes_after_probe_quota_succeeds() {
        let now = Instant::now();
        let mut record = CircuitRecord::new("gateway", config());
        trip(&mut record, now);
        let later = now + Duration::from_secs(31);

        let (gen_a, _) = admit(&mut record, later);
        let (gen_b, _) = admit(&mut record, later);
        assert!(record.record(gen_a, true, ok(), later).is_none());
        assert_eq!(record.state(), CircuitState::HalfOpen);

        let transition = record.record(gen_b, true, ok(), later).expect("close");
        assert_eq!(transition.to, CircuitState::Closed);
        assert_eq!(record.snapshot().window.samples, 0);
    }

    #[test]
    fn test_released_probe_frees_slot() {
        let now = Instant::now();
        let mut record = CircuitRecord::new("gateway", config());
        trip(&mut record, now);
        let later = now + Duration::from_secs(31);

        let (generation, _) = admit(&mut record, later);
        admit(&mut record, later);
        record.release_probe(generation);
        assert!(matches!(record.admit(later).0, Admission::Admitted { .. }));
    }

    #[test]
    fn test_slow_calls_trip_circuit() {
        let now = Instant::now();
        let cfg = config().with_slow_call(Duration::from_millis(100), 50.0);
        let mut record = CircuitRecord::new("gateway", cfg);

        for _ in 0..4 {
            let (generation, probe) = admit(&mut record, now);
            record.record(
                generation,
                probe,
                CallOutcome {
                    success: true,
                    timed_out: false,
                    duration: Duration::from_millis(250),
                },
                now,
            );
        }
        assert_eq!(record.state(), CircuitState::Open);
        assert!(record.snapshot().history[0].reason.contains("slow call rate"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let now = Instant::now();
        let mut record = CircuitRecord::new("gateway", config());
        trip(&mut record, now);

        let entry = record.reset(now);
        assert_eq!(entry.reason, "manual reset");

        let stats = record.snapshot();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.counters, CircuitCounters::default());
        assert_eq!(stats.history.len(), 1);
        assert!(stats.next_retry_at_ms.is_none());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
        assert_eq!(CircuitState::Open.gauge_value(), 2.0);
    }
}
