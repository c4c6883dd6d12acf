//! Resilience layer for payment gateway integrations.
//!
//! Outbound calls to the gateway go through per-dependency circuit breakers
//! with classified retries and fallbacks. Inbound payment notifications are
//! authenticated and filtered before anything acts on them.

pub mod admin;
pub mod clock;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod payments;
pub mod resilience;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::{Core, Shutdown};
pub use observability::events::{CoreEvent, EventBus};
pub use resilience::{
    ClassifiedError, ErrorClassifier, Fallback, GatewayFault, ResilienceGate, ResilientClient,
};
pub use security::{WebhookRequest, WebhookValidationResult, WebhookValidator};
