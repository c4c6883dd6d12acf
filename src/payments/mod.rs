//! Payment gateway integration.
//!
//! # Data Flow
//! ```text
//! Outbound:
//!     caller → gateway.rs (ProtectedGateway, one circuit per operation)
//!         → resilience::client (gate + classifier + retries)
//!         → http_gateway.rs (reqwest adapter) or any PaymentGateway
//!
//! Inbound:
//!     http::webhook (validated) → bounded queue
//!         → dispatcher.rs → NotificationSink
//! ```

pub mod dispatcher;
pub mod gateway;
pub mod http_gateway;
pub mod types;

pub use dispatcher::{LoggingSink, NotificationDispatcher, NotificationSink};
pub use gateway::{PaymentGateway, ProtectedGateway};
pub use http_gateway::HttpPaymentGateway;
pub use types::{Payment, PaymentNotification, PaymentRequest, PaymentStatus};
