//! Core event stream.
//!
//! # Responsibilities
//! - Carry circuit transitions, security violations and classified errors
//!   from the core to observability consumers
//! - Log every event in a background task when no other consumer exists
//!
//! # Design Decisions
//! - Bounded `broadcast` channel: publishing never blocks and never fails;
//!   a lagging subscriber loses the oldest events
//! - Events are plain serializable data so sinks can forward them as JSON

use serde::Serialize;
use tokio::sync::broadcast;

use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::classifier::{ErrorType, Severity};
use crate::resilience::statistics::StatisticsSnapshot;
use crate::security::violations::ViolationKind;

/// Default channel capacity.
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

#[derive(Debug, Clone, Serialize)]
pub struct CircuitTransitionEvent {
    pub name: String,
    pub previous: CircuitState,
    pub new: CircuitState,
    pub reason: String,
    pub metrics: StatisticsSnapshot,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityViolationEvent {
    pub violation: ViolationKind,
    pub source_ip: String,
    pub severity: Severity,
    pub mitigation: Vec<String>,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorClassifiedEvent {
    pub error_type: ErrorType,
    pub severity: Severity,
    pub code: String,
    pub retryable: bool,
    pub recommended_delay_ms: u64,
    pub alert: bool,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoreEvent {
    CircuitTransition(CircuitTransitionEvent),
    SecurityViolation(SecurityViolationEvent),
    ErrorClassified(ErrorClassifiedEvent),
}

/// Fire-and-forget publisher shared by all core components.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: CoreEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

/// Log every event until shutdown or until the bus is dropped.
pub async fn run_event_logger(
    mut events: broadcast::Receiver<CoreEvent>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            received = events.recv() => match received {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Event logger lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    tracing::debug!("Event logger stopped");
}

fn log_event(event: &CoreEvent) {
    match event {
        CoreEvent::CircuitTransition(e) => {
            if e.new == CircuitState::Open {
                tracing::warn!(
                    circuit = %e.name,
                    from = %e.previous,
                    to = %e.new,
                    reason = %e.reason,
                    error_rate = e.metrics.error_rate,
                    samples = e.metrics.samples,
                    "Circuit opened"
                );
            } else {
                tracing::info!(
                    circuit = %e.name,
                    from = %e.previous,
                    to = %e.new,
                    reason = %e.reason,
                    "Circuit state changed"
                );
            }
        }
        CoreEvent::SecurityViolation(e) => match e.severity {
            Severity::Critical | Severity::High => tracing::error!(
                violation = ?e.violation,
                source_ip = %e.source_ip,
                severity = ?e.severity,
                mitigation = ?e.mitigation,
                "Webhook security violation"
            ),
            _ => tracing::warn!(
                violation = ?e.violation,
                source_ip = %e.source_ip,
                severity = ?e.severity,
                "Webhook security violation"
            ),
        },
        CoreEvent::ErrorClassified(e) => {
            if e.alert {
                tracing::error!(
                    error_type = ?e.error_type,
                    severity = ?e.severity,
                    code = %e.code,
                    "Gateway error alert"
                );
            } else {
                tracing::debug!(
                    error_type = ?e.error_type,
                    severity = ?e.severity,
                    retryable = e.retryable,
                    delay_ms = e.recommended_delay_ms,
                    "Gateway error classified"
                );
            }
        }
    }
}
