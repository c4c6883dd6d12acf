//! Client-facing error responses.
//!
//! # Responsibilities
//! - Render classified errors as `{error_code, message}` with their status
//! - Map webhook rejections to status codes
//!
//! # Design Decisions
//! - Technical messages never leave the process
//! - Webhook rejections share one generic body; only the status differs

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::resilience::classifier::ClassifiedError;
use crate::security::violations::ViolationKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error_code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ClassifiedError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let retry_after = (self.retryable && self.recommended_delay_ms > 0)
            .then(|| self.recommended_delay_ms.div_ceil(1000));

        let mut response = (status, Json(ErrorBody::new(self.code, self.user_message))).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Status for a rejected webhook.
pub fn violation_status(kind: ViolationKind) -> StatusCode {
    match kind {
        ViolationKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ViolationKind::IpNotAllowed => StatusCode::FORBIDDEN,
        ViolationKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ViolationKind::StaleTimestamp | ViolationKind::InvalidSignature => StatusCode::UNAUTHORIZED,
        ViolationKind::ReplayDetected => StatusCode::CONFLICT,
    }
}

/// Generic rejection response for a webhook delivery.
pub fn webhook_rejection(kind: ViolationKind) -> Response {
    (
        violation_status(kind),
        Json(ErrorBody::new("WEBHOOK_REJECTED", "Webhook rejected")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::events::EventBus;
    use crate::resilience::classifier::{ErrorClassifier, ErrorContext};
    use crate::resilience::fault::GatewayFault;
    use crate::resilience::retries::RetryConfig;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_classified_error_hides_technical_message() {
        let classifier = ErrorClassifier::new(RetryConfig::default(), EventBus::new(8));
        let error = classifier.classify(
            &GatewayFault::http(401, "invalid api key sk_live_abc"),
            ErrorContext::new("gateway.create_payment", 0),
        );

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
        let body = body_json(response).await;
        assert_eq!(body.as_object().unwrap().len(), 2);
        assert!(!body.to_string().contains("sk_live_abc"));
    }

    #[tokio::test]
    async fn test_retryable_error_sets_retry_after() {
        let classifier = ErrorClassifier::new(
            RetryConfig {
                jitter: false,
                ..RetryConfig::default()
            },
            EventBus::new(8),
        );
        let error = classifier.classify(
            &GatewayFault::http(503, "maintenance"),
            ErrorContext::new("gateway.verify_payment", 0),
        );

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }

    #[test]
    fn test_violation_statuses() {
        assert_eq!(violation_status(ViolationKind::PayloadTooLarge), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(violation_status(ViolationKind::IpNotAllowed), StatusCode::FORBIDDEN);
        assert_eq!(violation_status(ViolationKind::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(violation_status(ViolationKind::StaleTimestamp), StatusCode::UNAUTHORIZED);
        assert_eq!(violation_status(ViolationKind::ReplayDetected), StatusCode::CONFLICT);
        assert_eq!(violation_status(ViolationKind::InvalidSignature), StatusCode::UNAUTHORIZED);
    }
}
