//! Gate + classifier + retry loop for calls to the payment gateway.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;
use crate::resilience::classifier::{ClassifiedError, ErrorClassifier, ErrorContext};
use crate::resilience::fallback::Fallback;
use crate::resilience::fault::GatewayFault;
use crate::resilience::gate::{GateError, Outcome, ResilienceGate};

/// Runs gateway operations through a circuit, retrying classified
/// failures with backoff.
#[derive(Clone)]
pub struct ResilientClient {
    gate: Arc<ResilienceGate>,
    classifier: Arc<ErrorClassifier>,
}

impl ResilientClient {
    pub fn new(gate: Arc<ResilienceGate>, classifier: Arc<ErrorClassifier>) -> Self {
        Self { gate, classifier }
    }

    pub fn gate(&self) -> &Arc<ResilienceGate> {
        &self.gate
    }

    pub fn classifier(&self) -> &Arc<ErrorClassifier> {
        &self.classifier
    }

    /// Execute `operation` through the circuit `name`.
    ///
    /// Every failed attempt is classified. Retryable failures are retried
    /// after the recommended delay while attempts remain; the last failure
    /// is returned classified unless `fallback` supplies a value. A rejected
    /// call is never retried.
    pub async fn execute<T, F, Fut>(
        &self,
        name: &str,
        mut operation: F,
        fallback: Fallback<T>,
    ) -> Result<Outcome<T>, ClassifiedError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayFault>>,
    {
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut attempt = 0u32;
        loop {
            let result = self
                .gate
                .execute(name, || operation(), Fallback::None)
                .await;

            let fault = match result {
                Ok(outcome) => return Ok(outcome),
                Err(GateError::Operation(fault)) => fault,
                Err(GateError::Timeout { timeout, .. }) => {
                    GatewayFault::timeout(format!("gateway call timed out after {:?}", timeout))
                }
                Err(GateError::Rejected {
                    name,
                    state,
                    retry_after,
                }) => GatewayFault::unavailable(&name, state, retry_after),
            };

            let classified = self
                .classifier
                .classify(
                    &fault,
                    ErrorContext::new(name, attempt).with_request_id(&request_id),
                );

            if !self.classifier.should_retry(&classified, attempt) {
                return match fallback.resolve().await {
                    Some(value) => {
                        self.gate.note_fallback(name);
                        Ok(Outcome::fallback(value))
                    }
                    None => Err(classified),
                };
            }

            metrics::record_retry(name);
            tracing::info!(
                circuit = %name,
                request_id = %request_id,
                attempt = attempt + 1,
                delay_ms = classified.recommended_delay_ms,
                error_type = %classified.error_type,
                "Retrying gateway call"
            );
            tokio::time::sleep(Duration::from_millis(classified.recommended_delay_ms)).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::observability::events::EventBus;
    use crate::resilience::circuit_breaker::CircuitBreakerConfig;
    use crate::resilience::classifier::ErrorType;
    use crate::resilience::retries::RetryConfig;

    fn client(max_retries: u32) -> ResilientClient {
        let events = EventBus::new(64);
        let gate = Arc::new(ResilienceGate::new(
            CircuitBreakerConfig::default(),
            events.clone(),
        ));
        let classifier = Arc::new(ErrorClassifier::new(
            RetryConfig {
                max_retries,
                base_delay_ms: 100,
                max_delay_ms: 1_000,
                backoff_multiplier: 2.0,
                jitter: false,
            },
            events,
        ));
        ResilientClient::new(gate, classifier)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let client = client(3);
        let calls = AtomicU32::new(0);

        let outcome = client
            .execute(
                "gateway.create_payment",
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(GatewayFault::http(503, "unavailable"))
                        } else {
                            Ok("pay_123")
                        }
                    }
                },
                Fallback::None,
            )
            .await
            .unwrap();

        assert_eq!(outcome.value, "pay_123");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_immediately() {
        let client = client(3);
        let calls = AtomicU32::new(0);

        let err = client
            .execute(
                "gateway.create_payment",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(GatewayFault::http(401, "bad key")) }
                },
                Fallback::None,
            )
            .await
            .unwrap_err();

        assert_eq!(err.error_type, ErrorType::Authentication);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let client = client(2);
        let calls = AtomicU32::new(0);

        let err = client
            .execute(
                "gateway.verify_payment",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(GatewayFault::network("ECONNRESET", "reset")) }
                },
                Fallback::None,
            )
            .await
            .unwrap_err();

        assert_eq!(err.error_type, ErrorType::Network);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_after_exhausted_retries() {
        let client = client(1);
        let outcome = client
            .execute(
                "gateway.verify_payment",
                || async { Err::<&str, _>(GatewayFault::http(500, "boom")) },
                Fallback::Static("PENDING"),
            )
            .await
            .unwrap();

        assert!(outcome.from_fallback);
        assert_eq!(outcome.value, "PENDING");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_classified() {
        let client = client(0);
        client.gate().register(
            "gateway.create_payment",
            CircuitBreakerConfig::new().with_timeout(Duration::from_millis(50)),
        );

        let err = client
            .execute(
                "gateway.create_payment",
                || async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok::<_, GatewayFault>(())
                },
                Fallback::None,
            )
            .await
            .unwrap_err();

        assert_eq!(err.error_type, ErrorType::Timeout);
    }
}
