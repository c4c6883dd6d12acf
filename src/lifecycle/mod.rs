//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build core → Start background tasks → Start listeners
//!
//! Housekeeping (housekeeping.rs):
//!     Every sweep interval → purge expired replay and rate-limit entries
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain queue → Stop tasks → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, close

pub mod housekeeping;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use housekeeping::{spawn_housekeeping, HousekeepingHandle};
pub use shutdown::Shutdown;
pub use startup::{Core, StartupError};
