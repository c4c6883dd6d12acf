//! Raw failures observed while talking to the payment gateway.
//!
//! A `GatewayFault` carries whatever signals the transport produced (status,
//! OS error code, gateway business code, retry-after hint). It is the input to
//! the classifier and never leaves the process as-is.

use std::time::Duration;

use crate::resilience::circuit_breaker::CircuitState;

/// Business codes the gateway uses for accepted operations.
const SUCCESS_CODES: &[&str] = &["SUCCESS", "PAYMENT_SUCCESS", "OK"];

#[derive(Debug, Clone, Default, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct GatewayFault {
    pub message: String,
    /// HTTP status returned by the gateway, if a response arrived.
    pub status: Option<u16>,
    /// Transport error code such as `ECONNRESET`.
    pub error_code: Option<String>,
    /// Business result code from the gateway response body.
    pub gateway_code: Option<String>,
    pub retry_after: Option<Duration>,
    pub timed_out: bool,
    pub circuit_open: bool,
    pub security_violation: bool,
}

impl GatewayFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn network(error_code: &str, message: impl Into<String>) -> Self {
        Self::new(message).with_error_code(error_code)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            ..Self::new(message)
        }
        .with_error_code("ETIMEDOUT")
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::new(message)
        }
    }

    pub fn gateway_declined(gateway_code: &str, message: impl Into<String>) -> Self {
        Self::new(message).with_gateway_code(gateway_code)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(format!("configuration: {}", message.into()))
    }

    pub fn security(message: impl Into<String>) -> Self {
        Self {
            security_violation: true,
            ..Self::new(message)
        }
    }

    /// The circuit refused the call before it reached the gateway.
    pub fn unavailable(circuit: &str, state: CircuitState, retry_after: Option<Duration>) -> Self {
        Self {
            circuit_open: true,
            retry_after,
            ..Self::new(format!("circuit '{}' is {}", circuit, state))
        }
    }

    pub fn with_error_code(mut self, code: &str) -> Self {
        self.error_code = Some(code.to_string());
        self
    }

    pub fn with_gateway_code(mut self, code: &str) -> Self {
        self.gateway_code = Some(code.to_string());
        self
    }

    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// Build a fault from a non-success HTTP response.
    ///
    /// A JSON body with a `code` (or `error_code`) field supplies the gateway
    /// business code, except on 5xx where the code describes the outage
    /// rather than a payment outcome. A `message` field replaces the generic
    /// message.
    pub fn from_status(status: u16, retry_after_header: Option<&str>, body: &str) -> Self {
        let mut fault = Self::http(status, format!("gateway responded with HTTP {}", status));
        fault.retry_after = retry_after_header.and_then(parse_retry_after);

        if let Ok(serde_json::Value::Object(fields)) = serde_json::from_str(body) {
            let code = fields
                .get("code")
                .or_else(|| fields.get("error_code"))
                .and_then(|v| v.as_str());
            if let Some(code) = code.filter(|_| status < 500) {
                fault.gateway_code = Some(code.to_string());
            }
            if let Some(message) = fields.get("message").and_then(|v| v.as_str()) {
                fault.message = message.to_string();
            }
        }
        fault
    }

    /// True when the gateway returned a business code other than success.
    pub fn is_declined(&self) -> bool {
        self.gateway_code
            .as_deref()
            .map(|code| !SUCCESS_CODES.iter().any(|ok| code.eq_ignore_ascii_case(ok)))
            .unwrap_or(false)
    }
}

impl From<reqwest::Error> for GatewayFault {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayFault::timeout(e.to_string())
        } else if e.is_connect() {
            GatewayFault::network("ECONNREFUSED", e.to_string())
        } else if let Some(status) = e.status() {
            GatewayFault::http(status.as_u16(), e.to_string())
        } else {
            GatewayFault::new(e.to_string())
        }
    }
}

/// Parse a `Retry-After` header given in delta-seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
