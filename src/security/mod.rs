//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound payment notification:
//!     → webhook.rs (ordered checks, result value)
//!         → access_control.rs (IP allow-list)
//!         → rate_limit.rs (fixed window per source)
//!         → replay.rs (signature + timestamp uniqueness)
//!         → signature.rs (HMAC, constant-time compare)
//!     → violations.rs (type, severity, mitigation on rejection)
//!     → Forward to dispatch only when valid
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod access_control;
pub mod rate_limit;
pub mod replay;
pub mod signature;
pub mod violations;
pub mod webhook;

pub use violations::ViolationKind;
pub use webhook::{
    WebhookConfig, WebhookRequest, WebhookValidationResult, WebhookValidator,
};
