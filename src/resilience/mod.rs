//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the payment gateway:
//!     → client.rs (retry loop)
//!     → gate.rs (admit / reject per circuit, RAII permit)
//!     → timeouts.rs (race the call against its deadline)
//!     → circuit_breaker.rs (record outcome, evaluate thresholds)
//!         → statistics.rs (rolling samples, rates, percentiles)
//!     → On failure: classifier.rs (type, severity, retry decision)
//!         → retries.rs + backoff.rs (delay before next attempt)
//!     → On rejection or final failure: fallback.rs
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every gateway call has a deadline
//! - Only classified-retryable failures are retried
//! - Circuit breaker prevents cascading failures into the gateway

pub mod backoff;
pub mod circuit_breaker;
pub mod classifier;
pub mod client;
pub mod fallback;
pub mod fault;
pub mod gate;
pub mod retries;
pub mod statistics;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreakerConfig, CircuitState, CircuitStats};
pub use classifier::{ClassifiedError, ErrorClassifier, ErrorContext, ErrorType, Severity};
pub use client::ResilientClient;
pub use fallback::Fallback;
pub use fault::GatewayFault;
pub use gate::{GateError, Outcome, Permit, ResilienceGate};
pub use retries::RetryConfig;
