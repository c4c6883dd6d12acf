//! Registry of circuit breakers keyed by dependency name.
//!
//! # Responsibilities
//! - Create circuit records lazily with the default configuration
//! - Admit or reject calls and hand out RAII permits
//! - Race protected operations against their timeout and record outcomes
//! - Apply fallbacks and publish transition events
//!
//! # Design Decisions
//! - One `std::sync::Mutex` per circuit inside a `DashMap`; the lock is never
//!   held across an `.await`, only the operation and fallback suspend
//! - A dropped `Permit` gives its half-open probe slot back, so cancelled
//!   callers cannot wedge a circuit in Half-Open
//! - The gate is an explicit object owned by the composition root and shared
//!   by `Arc`; nothing is global

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::observability::events::{CircuitTransitionEvent, CoreEvent, EventBus};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{
    Admission, CallOutcome, CircuitBreakerConfig, CircuitRecord, CircuitState, CircuitStats,
    StateTransition,
};
use crate::resilience::fallback::Fallback;
use crate::resilience::statistics::StatisticsSnapshot;
use crate::resilience::timeouts::run_with_deadline;

type Circuit = Arc<Mutex<CircuitRecord>>;

fn lock(circuit: &Mutex<CircuitRecord>) -> MutexGuard<'_, CircuitRecord> {
    circuit.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A call was refused without reaching the dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub name: String,
    pub state: CircuitState,
    pub retry_after: Option<Duration>,
}

/// Errors returned by [`ResilienceGate::execute`].
#[derive(Debug, thiserror::Error)]
pub enum GateError<E> {
    #[error("circuit '{name}' is {state}, call rejected")]
    Rejected {
        name: String,
        state: CircuitState,
        retry_after: Option<Duration>,
    },

    #[error("call through circuit '{name}' timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("operation failed: {0}")]
    Operation(E),
}

impl<E> From<Rejection> for GateError<E> {
    fn from(r: Rejection) -> Self {
        GateError::Rejected {
            name: r.name,
            state: r.state,
            retry_after: r.retry_after,
        }
    }
}

/// Successful result of [`ResilienceGate::execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    /// True when the value came from the fallback rather than the operation.
    pub from_fallback: bool,
}

impl<T> Outcome<T> {
    pub fn primary(value: T) -> Self {
        Self {
            value,
            from_fallback: false,
        }
    }

    pub fn fallback(value: T) -> Self {
        Self {
            value,
            from_fallback: true,
        }
    }
}

/// Admission ticket for one call. Report the outcome with
/// [`Permit::record_success`] or [`Permit::record_failure`].
pub struct Permit {
    circuit: Circuit,
    name: String,
    generation: u64,
    probe: bool,
    timeout: Duration,
    started: Instant,
    events: EventBus,
    completed: bool,
}

impl Permit {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// Call timeout configured for this circuit.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn record_success(self) {
        let elapsed = self.started.elapsed();
        self.finish(true, false, elapsed);
    }

    pub fn record_failure(self, timed_out: bool) {
        let elapsed = self.started.elapsed();
        self.finish(false, timed_out, elapsed);
    }

    fn finish(mut self, success: bool, timed_out: bool, duration: Duration) {
        self.completed = true;
        let outcome = CallOutcome {
            success,
            timed_out,
            duration,
        };

        let published = {
            let mut record = lock(&self.circuit);
            record
                .record(self.generation, self.probe, outcome, Instant::now())
                .map(|t| (t, record.window()))
        };

        let label = match (success, timed_out) {
            (true, _) => "success",
            (false, true) => "timeout",
            (false, false) => "failure",
        };
        metrics::record_call(&self.name, label, duration);

        if let Some((transition, window)) = published {
            publish_transition(&self.events, &self.name, transition, window);
        }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if !self.completed && self.probe {
            lock(&self.circuit).release_probe(self.generation);
        }
    }
}

impl std::fmt::Debug for Permit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .field("probe", &self.probe)
            .finish()
    }
}

fn publish_transition(
    events: &EventBus,
    name: &str,
    transition: StateTransition,
    window: StatisticsSnapshot,
) {
    metrics::record_transition(name, transition.to.as_str(), transition.to.gauge_value());
    events.publish(CoreEvent::CircuitTransition(CircuitTransitionEvent {
        name: name.to_string(),
        previous: transition.from,
        new: transition.to,
        reason: transition.reason,
        metrics: window,
        timestamp_ms: transition.timestamp_ms,
    }));
}

/// Circuit breaker registry protecting calls to the payment gateway.
pub struct ResilienceGate {
    circuits: DashMap<String, Circuit>,
    defaults: ArcSwap<CircuitBreakerConfig>,
    events: EventBus,
}

impl ResilienceGate {
    pub fn new(defaults: CircuitBreakerConfig, events: EventBus) -> Self {
        Self {
            circuits: DashMap::new(),
            defaults: ArcSwap::from_pointee(defaults),
            events,
        }
    }

    pub fn defaults(&self) -> CircuitBreakerConfig {
        self.defaults.load().as_ref().clone()
    }

    /// Settings used for circuits created lazily from now on.
    pub fn set_defaults(&self, defaults: CircuitBreakerConfig) {
        self.defaults.store(Arc::new(defaults));
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Create or replace the circuit for `name`. A replaced circuit starts Closed.
    pub fn register(&self, name: &str, config: CircuitBreakerConfig) {
        tracing::debug!(circuit = %name, "Registering circuit");
        self.circuits.insert(
            name.to_string(),
            Arc::new(Mutex::new(CircuitRecord::new(name, config))),
        );
    }

    /// Update the settings of `name` in place, keeping its state and counters.
    /// Unknown names are registered.
    pub fn configure(&self, name: &str, config: CircuitBreakerConfig) {
        match self.circuits.get(name).map(|c| c.clone()) {
            Some(circuit) => lock(&circuit).reconfigure(config),
            None => self.register(name, config),
        }
    }

    fn circuit(&self, name: &str) -> Circuit {
        if let Some(existing) = self.circuits.get(name) {
            return existing.clone();
        }
        self.circuits
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(CircuitRecord::new(name, self.defaults())))
            })
            .clone()
    }

    /// Ask to run a call through `name`.
    pub fn allow(&self, name: &str) -> Result<Permit, Rejection> {
        let circuit = self.circuit(name);
        let now = Instant::now();

        let (admission, published, timeout) = {
            let mut record = lock(&circuit);
            let (admission, transition) = record.admit(now);
            let published = transition.map(|t| (t, record.window()));
            (admission, published, record.config().timeout())
        };

        if let Some((transition, window)) = published {
            publish_transition(&self.events, name, transition, window);
        }

        match admission {
            Admission::Admitted { generation, probe } => Ok(Permit {
                circuit,
                name: name.to_string(),
                generation,
                probe,
                timeout,
                started: Instant::now(),
                events: self.events.clone(),
                completed: false,
            }),
            Admission::Rejected { state, retry_after } => {
                metrics::record_rejected(name);
                tracing::debug!(circuit = %name, state = %state, "Call rejected by circuit");
                Err(Rejection {
                    name: name.to_string(),
                    state,
                    retry_after,
                })
            }
        }
    }

    /// Run `operation` through the circuit for `name`.
    ///
    /// The operation is raced against the circuit's timeout. When the call
    /// is rejected or fails, a fallback (if any) replaces the error and the
    /// failure is kept only in the circuit's metrics.
    pub async fn execute<T, E, F, Fut>(
        &self,
        name: &str,
        operation: F,
        fallback: Fallback<T>,
    ) -> Result<Outcome<T>, GateError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = match self.allow(name) {
            Ok(permit) => permit,
            Err(rejection) => return self.fall_back(name, fallback, rejection.into()).await,
        };

        let timeout = permit.timeout();
        let call = run_with_deadline(timeout, operation()).await;
        match call.output {
            Some(Ok(value)) => {
                permit.finish(true, false, call.elapsed);
                Ok(Outcome::primary(value))
            }
            Some(Err(err)) => {
                permit.finish(false, false, call.elapsed);
                self.fall_back(name, fallback, GateError::Operation(err))
                    .await
            }
            None => {
                permit.finish(false, true, call.elapsed);
                let err = GateError::Timeout {
                    name: name.to_string(),
                    timeout,
                };
                self.fall_back(name, fallback, err).await
            }
        }
    }

    async fn fall_back<T, E>(
        &self,
        name: &str,
        fallback: Fallback<T>,
        error: GateError<E>,
    ) -> Result<Outcome<T>, GateError<E>> {
        match fallback.resolve().await {
            Some(value) => {
                self.note_fallback(name);
                Ok(Outcome::fallback(value))
            }
            None => Err(error),
        }
    }

    /// Count a fallback served on behalf of `name`.
    pub fn note_fallback(&self, name: &str) {
        if let Some(circuit) = self.circuits.get(name).map(|c| c.clone()) {
            lock(&circuit).record_fallback();
        }
    }

    /// Snapshot of one circuit. Never creates or mutates a record.
    pub fn stats(&self, name: &str) -> Option<CircuitStats> {
        let circuit = self.circuits.get(name).map(|c| c.clone())?;
        let stats = lock(&circuit).snapshot();
        Some(stats)
    }

    /// Snapshots of every circuit, sorted by name.
    pub fn all_stats(&self) -> Vec<CircuitStats> {
        let circuits: Vec<Circuit> = self.circuits.iter().map(|e| e.value().clone()).collect();
        let mut stats: Vec<CircuitStats> = circuits.iter().map(|c| lock(c).snapshot()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.circuits.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Force `name` Closed, clearing counters and history.
    /// Returns false when no such circuit exists.
    pub fn reset(&self, name: &str) -> bool {
        let Some(circuit) = self.circuits.get(name).map(|c| c.clone()) else {
            return false;
        };

        let (transition, window) = {
            let mut record = lock(&circuit);
            let transition = record.reset(Instant::now());
            (transition, record.window())
        };
        tracing::info!(circuit = %name, from = %transition.from, "Circuit manually reset");
        publish_transition(&self.events, name, transition, window);
        true
    }

    pub fn remove(&self, name: &str) -> bool {
        self.circuits.remove(name).is_some()
    }
}
