// ============================================================================
// Proxy Pipeline Tests
// ============================================================================
//
// Full request path through the HTTP router against scripted backends:
// - route matching and 404s
// - bearer authentication on protected routes
// - forwarding metadata and envelope unwrapping
// - circuit breaker rejection after repeated dial failures
// - backend failures, deadlines and unsupported operations
// - metrics recorded for each outcome
//
// ============================================================================

use bytes::Bytes;
use hub_error::BackendCode;
use hub_gateway::gateway::{BackendCall, BackendFailure};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

mod test_utils;
use test_utils::{
    get, order_handler, post_json, request_event, send, spawn_gateway, MetricEvent,
    TEST_USER_EMAIL, TEST_USER_ID, VALID_TOKEN,
};

#[tokio::test]
async fn test_protected_route_forwards_user_and_unwraps_envelope() {
    let gateway = spawn_gateway(order_handler());

    let (status, _, body) = send(&gateway.app, get("/api/v1/orders/42", Some(VALID_TOKEN))).await;

    assert_eq!(status, 200);
    assert_eq!(body["order"]["orderId"], "42");
    assert_eq!(body["order"]["userId"], TEST_USER_ID);
    assert_eq!(body["order"]["symbol"], "AAPL");
    assert!(body.get("apiResponse").is_none());

    let call = gateway.backend.last_call().expect("backend should be called");
    assert_eq!(
        call.operation.full_method(),
        "/hub_investments.OrderService/GetOrderDetails"
    );
    assert_eq!(call.metadata.get("x-user-id"), Some(TEST_USER_ID));
    assert_eq!(call.metadata.get("x-user-email"), Some(TEST_USER_EMAIL));
    assert_eq!(call.metadata.get("x-path-id"), Some("42"));
    assert_eq!(call.metadata.get("x-forwarded-method"), Some("GET"));
    assert_eq!(call.metadata.get("x-forwarded-path"), Some("/api/v1/orders/42"));

    assert_eq!(
        gateway.metrics.requests(),
        vec![request_event("get-order", "order-service", true)]
    );
}

#[tokio::test]
async fn test_missing_token_is_rejected_before_dialing() {
    let gateway = spawn_gateway(order_handler());

    let (status, _, body) = send(&gateway.app, get("/api/v1/orders/42", None)).await;

    assert_eq!(status, 401);
    assert_eq!(body["code"], "AUTH_TOKEN_MISSING");
    assert_eq!(gateway.backend.dial_count(), 0);
    assert_eq!(gateway.identity.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let gateway = spawn_gateway(order_handler());

    let (status, _, body) = send(&gateway.app, get("/api/v1/orders/42", Some("expired"))).await;

    assert_eq!(status, 401);
    assert_eq!(body["code"], "AUTH_TOKEN_INVALID");
    assert_eq!(gateway.backend.dial_count(), 0);
}

#[tokio::test]
async fn test_public_route_needs_no_token() {
    let gateway = spawn_gateway(Arc::new(|call: &BackendCall| {
        assert!(call.metadata.get("x-user-id").is_none());
        Ok(Bytes::from_static(
            br#"{"apiResponse":{"success":true},"token":"jwt-123"}"#,
        ))
    }));

    let (status, _, body) = send(
        &gateway.app,
        post_json(
            "/api/v1/auth/login",
            None,
            json!({ "email": "trader@hub.test", "password": "secret" }),
        ),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body, json!({ "token": "jwt-123" }));
    assert_eq!(gateway.identity.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_method_mismatch_is_not_found() {
    let gateway = spawn_gateway(order_handler());

    let request = axum::http::Request::builder()
        .method("DELETE")
        .uri("/api/v1/orders/42")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _, body) = send(&gateway.app, request).await;

    assert_eq!(status, 404);
    assert_eq!(body["code"], "ROUTE_NOT_FOUND");
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let gateway = spawn_gateway(order_handler());

    let (status, _, body) = send(&gateway.app, get("/api/v2/unknown", Some(VALID_TOKEN))).await;

    assert_eq!(status, 404);
    assert_eq!(body["code"], "ROUTE_NOT_FOUND");
    assert_eq!(gateway.identity.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_breaker_opens_after_repeated_dial_failures() {
    let gateway = spawn_gateway(order_handler());
    gateway.backend.fail_dials.store(true, Ordering::SeqCst);

    for _ in 0..5 {
        let (status, _, body) =
            send(&gateway.app, get("/api/v1/orders/42", Some(VALID_TOKEN))).await;
        assert_eq!(status, 503);
        assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    }
    assert_eq!(gateway.backend.dial_count(), 5);

    let (status, _, body) = send(&gateway.app, get("/api/v1/orders/42", Some(VALID_TOKEN))).await;

    assert_eq!(status, 503);
    assert_eq!(body["code"], "CIRCUIT_BREAKER_OPEN");
    assert_eq!(gateway.backend.dial_count(), 5);

    assert_eq!(gateway.metrics.count(&MetricEvent::CircuitBreakerTrip), 1);
    assert_eq!(
        gateway.metrics.count(&request_event("get-order", "order-service", false)),
        6
    );
    assert_eq!(gateway.metrics.inner.snapshot().circuit_breaker_trips, 1);
}

#[tokio::test]
async fn test_backend_not_found_keeps_business_message() {
    let gateway = spawn_gateway(Arc::new(|_: &BackendCall| {
        Err(BackendFailure::new(BackendCode::NotFound, "order 42 not found"))
    }));

    let (status, _, body) = send(&gateway.app, get("/api/v1/orders/42", Some(VALID_TOKEN))).await;

    assert_eq!(status, 404);
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["error"], "order 42 not found");

    assert_eq!(
        gateway.metrics.requests(),
        vec![request_event("get-order", "order-service", false)]
    );
    let snapshot = gateway.metrics.inner.snapshot();
    assert_eq!(snapshot.failed_requests, 1);
    assert_eq!(snapshot.services["order-service"].failures, 1);
}

#[tokio::test]
async fn test_backend_internal_error_is_sanitized() {
    let gateway = spawn_gateway(Arc::new(|_: &BackendCall| {
        Err(BackendFailure::new(
            BackendCode::Internal,
            "pq: connection to 10.0.0.12 refused",
        ))
    }));

    let (status, _, body) = send(&gateway.app, get("/api/v1/orders/42", Some(VALID_TOKEN))).await;

    assert_eq!(status, 500);
    assert_eq!(body["code"], "INTERNAL_ERROR");
    assert!(!body["error"].as_str().unwrap().contains("10.0.0.12"));
}

#[tokio::test]
async fn test_route_deadline_maps_to_gateway_timeout() {
    let gateway = spawn_gateway(order_handler());
    *gateway.backend.delay.lock().unwrap() = Some(Duration::from_secs(5));

    let (status, _, body) =
        send(&gateway.app, get("/api/v1/orders/42/status", Some(VALID_TOKEN))).await;

    assert_eq!(status, 504);
    assert_eq!(body["code"], "TIMEOUT");
}

#[tokio::test(start_paused = true)]
async fn test_hung_backend_times_out_under_default_deadline() {
    let gateway = spawn_gateway(order_handler());
    *gateway.backend.delay.lock().unwrap() = Some(Duration::from_secs(40));

    let (status, _, body) = send(&gateway.app, get("/api/v1/orders/42", Some(VALID_TOKEN))).await;

    assert_eq!(status, 504);
    assert_eq!(body["code"], "TIMEOUT");
    assert!(gateway.backend.last_call().is_none());
    assert_eq!(
        gateway.metrics.requests(),
        vec![request_event("get-order", "order-service", false)]
    );
}

#[tokio::test]
async fn test_unregistered_operation_is_internal_error() {
    let gateway = spawn_gateway(order_handler());

    let (status, _, body) = send(&gateway.app, get("/api/v1/reports", None)).await;

    assert_eq!(status, 500);
    assert_eq!(body["code"], "INTERNAL_ERROR");
    assert!(gateway.backend.last_call().is_none());
}

#[tokio::test]
async fn test_invalid_order_body_is_bad_request() {
    let gateway = spawn_gateway(order_handler());

    let (status, _, body) = send(
        &gateway.app,
        post_json(
            "/api/v1/orders",
            Some(VALID_TOKEN),
            json!({ "symbol": "AAPL", "orderSide": "BUY", "orderType": "MARKET", "quantity": 0 }),
        ),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(body["code"], "INVALID_ARGUMENT");
    assert!(gateway.backend.last_call().is_none());
}

#[tokio::test]
async fn test_connection_is_reused_across_requests() {
    let gateway = spawn_gateway(order_handler());

    for _ in 0..3 {
        let (status, _, _) = send(&gateway.app, get("/api/v1/orders/42", Some(VALID_TOKEN))).await;
        assert_eq!(status, 200);
    }

    assert_eq!(gateway.backend.dial_count(), 1);
}

#[tokio::test]
async fn test_repeated_token_is_served_from_cache() {
    let gateway = spawn_gateway(order_handler());

    for _ in 0..2 {
        let (status, _, _) = send(&gateway.app, get("/api/v1/orders/42", Some(VALID_TOKEN))).await;
        assert_eq!(status, 200);
    }

    assert_eq!(gateway.identity.calls.load(Ordering::SeqCst), 1);
    let cache_events: Vec<MetricEvent> = gateway
        .metrics
        .events()
        .into_iter()
        .filter(|e| matches!(e, MetricEvent::CacheHit | MetricEvent::CacheMiss))
        .collect();
    assert_eq!(cache_events, vec![MetricEvent::CacheMiss, MetricEvent::CacheHit]);
}
