//! End-to-end scenarios through the composed core.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gateway_resilience::lifecycle::Core;
use gateway_resilience::observability::events::CoreEvent;
use gateway_resilience::resilience::{CircuitState, ErrorType, Fallback, GateError, GatewayFault};
use gateway_resilience::security::WebhookRequest;

mod common;

const CIRCUIT: &str = "gateway.create_payment";

fn core() -> Core {
    let mut config = common::gateway_config();
    config.circuits.insert(CIRCUIT.to_string(), common::scenario_circuit());
    config.retry.jitter = false;
    Core::build(&config).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_scenario_a_ten_calls_six_failing_opens_circuit() {
    let core = core();
    let calls = AtomicU32::new(0);

    for i in 0..10 {
        let _ = core
            .gate
            .execute(
                CIRCUIT,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if i % 5 < 3 {
                            Err(GatewayFault::http(503, "unavailable"))
                        } else {
                            Ok("pay")
                        }
                    }
                },
                Fallback::None,
            )
            .await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 10);
    assert_eq!(core.gate.stats(CIRCUIT).unwrap().state, CircuitState::Open);

    tokio::time::advance(Duration::from_secs(29)).await;
    let eleventh = core
        .gate
        .execute(
            CIRCUIT,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, GatewayFault>("pay") }
            },
            Fallback::None,
        )
        .await;
    assert!(matches!(eleventh, Err(GateError::Rejected { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn test_scenario_b_known_signature_is_fully_valid() {
    let core = core();
    let timestamp = common::now_ts();
    let payload = r#"{"a":1}"#;
    let signature = common::sign("abc", &timestamp, payload.as_bytes());

    let result = core
        .validator
        .validate(&WebhookRequest::new(payload, signature, timestamp, common::SOURCE_IP));
    assert!(result.is_valid);
    assert!(result.signature_valid && result.timestamp_valid && result.ip_allowed);
    assert_eq!(result.security_score, 100);
}

#[tokio::test]
async fn test_scenario_c_resubmission_is_replay() {
    let core = core();
    let mut events = core.events.subscribe();
    let timestamp = common::now_ts();
    let payload = r#"{"a":1}"#;
    let request = WebhookRequest::new(
        payload,
        common::sign("abc", &timestamp, payload.as_bytes()),
        timestamp,
        common::SOURCE_IP,
    );

    assert!(core.validator.validate(&request).is_valid);
    tokio::time::sleep(Duration::from_secs(1)).await;

    let again = core.validator.validate(&request);
    assert!(!again.is_valid);
    assert!(again.reason.contains("replay"));

    let violation = std::iter::from_fn(|| events.try_recv().ok()).find_map(|e| match e {
        CoreEvent::SecurityViolation(v) => Some(v),
        _ => None,
    });
    assert!(violation.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_client_retries_then_circuit_rejects_without_retry() {
    let mut config = common::gateway_config();
    config.circuits.insert(
        CIRCUIT.to_string(),
        common::scenario_circuit()
            .with_minimum_requests(4)
            .with_volume_threshold(4),
    );
    config.retry.max_retries = 3;
    config.retry.jitter = false;
    let core = Core::build(&config).unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let err = core
        .client
        .execute(
            CIRCUIT,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(GatewayFault::network("ECONNRESET", "socket hang up")) }
            },
            Fallback::None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_type, ErrorType::Network);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(core.gate.stats(CIRCUIT).unwrap().state, CircuitState::Open);

    let rejected = core
        .client
        .execute(
            CIRCUIT,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, GatewayFault>(()) }
            },
            Fallback::None,
        )
        .await
        .unwrap_err();
    assert_eq!(rejected.code, "CIRCUIT_OPEN");
    assert!(!rejected.retryable);
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    let stats = core.classifier.stats();
    assert_eq!(stats.by_type[&ErrorType::Network], 4);
    assert_eq!(stats.by_type[&ErrorType::Server], 1);
}

#[tokio::test(start_paused = true)]
async fn test_manual_reset_restores_traffic() {
    let core = core();
    for _ in 0..10 {
        let _ = core
            .gate
            .execute(
                CIRCUIT,
                || async { Err::<(), _>(GatewayFault::http(500, "boom")) },
                Fallback::None,
            )
            .await;
    }
    assert_eq!(core.gate.stats(CIRCUIT).unwrap().state, CircuitState::Open);

    assert!(core.gate.reset(CIRCUIT));
    let outcome = core
        .gate
        .execute(CIRCUIT, || async { Ok::<_, GatewayFault>(7) }, Fallback::None)
        .await
        .unwrap();
    assert_eq!(outcome.value, 7);
    assert_eq!(core.gate.stats(CIRCUIT).unwrap().counters.successes, 1);
}
