//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Core components produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → events.rs (circuit transitions, violations, classified errors)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON or pretty)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Event subscribers (event logger, embedders)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (atomic increments)
//! - Nothing here decides behavior; the core only reports

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{CoreEvent, EventBus};
