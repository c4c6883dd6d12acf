//! Router-level tests for the public and admin HTTP surfaces.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tokio::sync::mpsc;
use tower::ServiceExt;

use gateway_resilience::admin::{setup_admin_router, AdminState};
use gateway_resilience::config::GatewayConfig;
use gateway_resilience::http::{build_router, AppState};
use gateway_resilience::lifecycle::Core;
use gateway_resilience::payments::dispatcher::notification_queue;
use gateway_resilience::payments::types::ValidatedNotification;
use gateway_resilience::resilience::{CircuitBreakerConfig, Fallback, GatewayFault};
use gateway_resilience::security::ViolationKind;

mod common;

const ADMIN_KEY: &str = "test-admin-key";

struct Harness {
    core: Core,
    router: Router,
    rx: mpsc::Receiver<ValidatedNotification>,
}

fn harness_with(config: GatewayConfig, queue: usize) -> Harness {
    let core = Core::build(&config).unwrap();
    let (forward_tx, rx) = notification_queue(queue);
    let router = build_router(
        &config,
        AppState {
            validator: core.validator.clone(),
            gate: core.gate.clone(),
            forward_tx,
        },
    );
    Harness { core, router, rx }
}

fn harness() -> Harness {
    harness_with(common::gateway_config(), 16)
}

fn webhook(payload: &str, timestamp: &str, signature: &str, peer: &str) -> Request<Body> {
    let mut request = Request::post("/webhooks/payment")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-webhook-signature", signature)
        .header("x-webhook-timestamp", timestamp)
        .body(Body::from(payload.to_string()))
        .unwrap();
    let addr: SocketAddr = format!("{}:443", peer).parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

fn signed(payload: &str) -> Request<Body> {
    let timestamp = common::now_ts();
    let signature = common::sign(common::SECRET, &timestamp, payload.as_bytes());
    webhook(payload, &timestamp, &signature, common::SOURCE_IP)
}

async fn json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_reports_open_circuits() {
    let h = harness();
    let response = h
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["open_circuits"], 0);
}

#[tokio::test]
async fn test_valid_webhook_is_queued() {
    let mut h = harness();
    let payload = r#"{"id":"pay_1","status":"succeeded"}"#;

    let response = h.router.clone().oneshot(signed(payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["received"], true);

    let queued = h.rx.try_recv().unwrap();
    assert_eq!(queued.source_ip, common::SOURCE_IP);
    assert_eq!(&queued.body[..], payload.as_bytes());
}

#[tokio::test]
async fn test_rejections_map_to_status_codes() {
    let mut config = common::gateway_config();
    config.webhook.max_payload_bytes = 128;
    config.webhook.ip_whitelist = "203.0.113.0/24".to_string();
    let mut h = harness_with(config, 16);

    // Bad signature.
    let ts = common::now_ts();
    let response = h
        .router
        .clone()
        .oneshot(webhook("{}", &ts, "deadbeef", common::SOURCE_IP))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json(response).await["error_code"], "WEBHOOK_REJECTED");

    // Outside the allow-list.
    let signature = common::sign(common::SECRET, &ts, b"{}");
    let response = h
        .router
        .clone()
        .oneshot(webhook("{}", &ts, &signature, "198.51.100.7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Over the limit but readable.
    let response = h
        .router
        .clone()
        .oneshot(signed(&"x".repeat(200)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    // Far over the limit; rejected while reading.
    let response = h
        .router
        .clone()
        .oneshot(signed(&"x".repeat(1_000)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    // Replay.
    let signature = common::sign(common::SECRET, &ts, br#"{"n":1}"#);
    let delivery = || webhook(r#"{"n":1}"#, &ts, &signature, common::SOURCE_IP);
    assert_eq!(
        h.router.clone().oneshot(delivery()).await.unwrap().status(),
        StatusCode::OK
    );
    assert_eq!(
        h.router.clone().oneshot(delivery()).await.unwrap().status(),
        StatusCode::CONFLICT
    );

    assert_eq!(&h.rx.try_recv().unwrap().body[..], br#"{"n":1}"#);
    assert!(h.rx.try_recv().is_err());
}

#[tokio::test]
async fn test_rate_limited_webhook_has_retry_after() {
    let mut config = common::gateway_config();
    config.webhook.rate_limit_max_requests = 1;
    config.webhook.rate_limit_window_ms = 30_000;
    let h = harness_with(config, 16);

    let first = h.router.clone().oneshot(signed(r#"{"n":1}"#)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = h.router.clone().oneshot(signed(r#"{"n":2}"#)).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.headers()[header::RETRY_AFTER], "30");
}

#[tokio::test]
async fn test_full_queue_returns_503_without_recording_replay() {
    let mut h = harness_with(common::gateway_config(), 1);
    let payload = r#"{"id":"pay_2"}"#;
    let timestamp = common::now_ts();
    let signature = common::sign(common::SECRET, &timestamp, payload.as_bytes());

    // Occupy the only slot.
    let filler = h.router.clone().oneshot(signed(r#"{"id":"pay_1"}"#)).await.unwrap();
    assert_eq!(filler.status(), StatusCode::OK);

    let busy = h
        .router
        .clone()
        .oneshot(webhook(payload, &timestamp, &signature, common::SOURCE_IP))
        .await
        .unwrap();
    assert_eq!(busy.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(busy.headers()[header::RETRY_AFTER], "1");

    // Once drained, the same delivery is accepted.
    h.rx.try_recv().unwrap();
    let redelivered = h
        .router
        .clone()
        .oneshot(webhook(payload, &timestamp, &signature, common::SOURCE_IP))
        .await
        .unwrap();
    assert_eq!(redelivered.status(), StatusCode::OK);
    assert!(!h
        .core
        .validator
        .metrics()
        .violations
        .contains_key(&ViolationKind::ReplayDetected));
}

#[tokio::test]
async fn test_disabled_webhook_route_is_absent() {
    let mut config = common::gateway_config();
    config.webhook.enabled = false;
    let h = harness_with(config, 16);
    let response = h.router.clone().oneshot(signed("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn admin(core: &Core) -> Router {
    setup_admin_router(AdminState::new(core, ADMIN_KEY))
}

fn admin_get(path: &str) -> Request<Body> {
    Request::get(path)
        .header(header::AUTHORIZATION, format!("Bearer {}", ADMIN_KEY))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_admin_requires_bearer_key() {
    let h = harness();
    let router = admin(&h.core);

    let missing = router
        .clone()
        .oneshot(Request::get("/admin/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = router
        .clone()
        .oneshot(
            Request::get("/admin/status")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let ok = router.oneshot(admin_get("/admin/status")).await.unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(json(ok).await["status"], "operational");
}

#[tokio::test(start_paused = true)]
async fn test_admin_circuit_inspection_and_reset() {
    let h = harness();
    h.core.gate.register(
        "gateway.verify_payment",
        CircuitBreakerConfig::new()
            .with_minimum_requests(2)
            .with_volume_threshold(2),
    );
    for _ in 0..2 {
        let _ = h
            .core
            .gate
            .execute(
                "gateway.verify_payment",
                || async { Err::<(), _>(GatewayFault::http(502, "bad gateway")) },
                Fallback::None,
            )
            .await;
    }
    let router = admin(&h.core);

    let circuit = router
        .clone()
        .oneshot(admin_get("/admin/circuits/gateway.verify_payment"))
        .await
        .unwrap();
    assert_eq!(circuit.status(), StatusCode::OK);
    assert_eq!(json(circuit).await["state"], "OPEN");

    let status = json(router.clone().oneshot(admin_get("/admin/status")).await.unwrap()).await;
    assert_eq!(status["status"], "degraded");
    assert_eq!(status["open_circuits"][0], "gateway.verify_payment");

    let reset = router
        .clone()
        .oneshot(
            Request::post("/admin/circuits/gateway.verify_payment/reset")
                .header(header::AUTHORIZATION, format!("Bearer {}", ADMIN_KEY))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(reset.status(), StatusCode::OK);
    assert_eq!(json(reset).await["state"], "CLOSED");

    let unknown = router
        .oneshot(admin_get("/admin/circuits/does.not.exist"))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(unknown).await["error_code"], "CIRCUIT_NOT_FOUND");
}
