//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, health)
//!     → webhook.rs (read body, extract headers and source IP)
//!         → request.rs (header and source helpers)
//!         → security::webhook (validate)
//!         → payments queue (valid only)
//!     → response.rs (status mapping, generic error bodies)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod webhook;

pub use response::ErrorBody;
pub use server::{build_router, AppState, HttpServer};
