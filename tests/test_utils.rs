#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use hub_config::CircuitBreakerConfig;
use hub_error::{GatewayError, GatewayResult};
use hub_gateway::{
    auth::{AuthContextResolver, IdentityClaims, IdentityClient, IdentityError, MemoryTokenCache},
    gateway::{
        BackendCall, BackendConnection, BackendFailure, CircuitBreakerRegistry, CloseFailure,
        ConnectionRegistry, ConnectionState, Dialer, RouteTable,
    },
    metrics::{GatewayMetrics, MetricsRecorder},
    proxy::{hub_operations, ProxyEngine},
    server::{self, AppState},
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const VALID_TOKEN: &str = "valid-token";
pub const TEST_USER_ID: &str = "user-1";
pub const TEST_USER_EMAIL: &str = "trader@hub.test";

pub const TEST_ROUTES: &str = r#"
routes:
  - name: login
    path: /api/v1/auth/login
    method: POST
    service: user-service
    grpc_service: auth.AuthService
    grpc_method: Login
  - name: get-order
    path: /api/v1/orders/{id}
    method: GET
    service: order-service
    grpc_service: hub_investments.OrderService
    grpc_method: GetOrderDetails
    auth_required: true
  - name: submit-order
    path: /api/v1/orders
    method: POST
    service: order-service
    grpc_service: hub_investments.OrderService
    grpc_method: SubmitOrder
    auth_required: true
  - name: order-status
    path: /api/v1/orders/{id}/status
    method: GET
    service: order-service
    grpc_service: hub_investments.OrderService
    grpc_method: GetOrderStatus
    auth_required: true
    timeout: 50ms
  - name: reports
    path: /api/v1/reports
    method: GET
    service: reporting-service
    grpc_service: reports.ReportService
    grpc_method: GetReport
"#;

pub type Handler = Arc<dyn Fn(&BackendCall) -> Result<Bytes, BackendFailure> + Send + Sync>;

/// Scripted backend shared by every service the gateway dials
pub struct FakeBackend {
    pub dials: AtomicUsize,
    pub fail_dials: AtomicBool,
    pub delay: Mutex<Option<Duration>>,
    pub calls: Mutex<Vec<BackendCall>>,
    handler: Handler,
}

impl FakeBackend {
    pub fn new(handler: Handler) -> Arc<Self> {
        Arc::new(Self {
            dials: AtomicUsize::new(0),
            fail_dials: AtomicBool::new(false),
            delay: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            handler,
        })
    }

    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn last_call(&self) -> Option<BackendCall> {
        self.calls.lock().unwrap().last().cloned()
    }
}

struct FakeDialer(Arc<FakeBackend>);

#[async_trait]
impl Dialer for FakeDialer {
    async fn dial(&self, service: &str) -> GatewayResult<Arc<dyn BackendConnection>> {
        self.0.dials.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_dials.load(Ordering::SeqCst) {
            return Err(GatewayError::Dial {
                service: service.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(Arc::new(FakeConnection {
            service: service.to_string(),
            backend: self.0.clone(),
        }))
    }
}

struct FakeConnection {
    service: String,
    backend: Arc<FakeBackend>,
}

#[async_trait]
impl BackendConnection for FakeConnection {
    fn service(&self) -> &str {
        &self.service
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::Ready
    }

    async fn wait_for_state_change(&self, _current: ConnectionState, timeout: Duration) -> bool {
        tokio::time::sleep(timeout).await;
        false
    }

    async fn invoke(&self, call: BackendCall) -> Result<Bytes, BackendFailure> {
        let delay = *self.backend.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let result = (self.backend.handler)(&call);
        self.backend.calls.lock().unwrap().push(call);
        result
    }

    async fn close(&self) -> Result<(), CloseFailure> {
        Ok(())
    }
}

/// Accepts `VALID_TOKEN` only
#[derive(Default)]
pub struct FakeIdentity {
    pub calls: AtomicUsize,
}

#[async_trait]
impl IdentityClient for FakeIdentity {
    async fn validate_token(&self, token: &str) -> Result<IdentityClaims, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if token != VALID_TOKEN {
            return Err(IdentityError::Rejected("token expired".to_string()));
        }
        Ok(IdentityClaims {
            valid: true,
            user_id: TEST_USER_ID.to_string(),
            email: TEST_USER_EMAIL.to_string(),
        })
    }
}

/// One call into the metrics recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricEvent {
    Request {
        route: String,
        service: String,
        success: bool,
    },
    CacheHit,
    CacheMiss,
    CircuitBreakerTrip,
}

/// Records every call in order, then forwards it to the served aggregates
pub struct RecordingMetrics {
    events: Mutex<Vec<MetricEvent>>,
    pub inner: Arc<GatewayMetrics>,
}

impl RecordingMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            inner: Arc::new(GatewayMetrics::new()),
        })
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<MetricEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, MetricEvent::Request { .. }))
            .collect()
    }

    pub fn count(&self, event: &MetricEvent) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    fn push(&self, event: MetricEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl MetricsRecorder for RecordingMetrics {
    fn record_request(&self, route: &str, service: &str, latency: Duration, success: bool) {
        self.push(MetricEvent::Request {
            route: route.to_string(),
            service: service.to_string(),
            success,
        });
        self.inner.record_request(route, service, latency, success);
    }

    fn record_cache_hit(&self) {
        self.push(MetricEvent::CacheHit);
        self.inner.record_cache_hit();
    }

    fn record_cache_miss(&self) {
        self.push(MetricEvent::CacheMiss);
        self.inner.record_cache_miss();
    }

    fn record_circuit_breaker_trip(&self) {
        self.push(MetricEvent::CircuitBreakerTrip);
        self.inner.record_circuit_breaker_trip();
    }
}

pub fn request_event(route: &str, service: &str, success: bool) -> MetricEvent {
    MetricEvent::Request {
        route: route.to_string(),
        service: service.to_string(),
        success,
    }
}

pub struct TestGateway {
    pub app: Router,
    pub backend: Arc<FakeBackend>,
    pub identity: Arc<FakeIdentity>,
    pub metrics: Arc<RecordingMetrics>,
}

pub fn spawn_gateway(handler: Handler) -> TestGateway {
    let backend = FakeBackend::new(handler);
    let identity = Arc::new(FakeIdentity::default());

    let routes = Arc::new(RouteTable::from_yaml_str(TEST_ROUTES).expect("test routes should compile"));
    let registry = Arc::new(ConnectionRegistry::new(
        Arc::new(FakeDialer(backend.clone())),
        Duration::from_millis(20),
    ));
    let breakers = Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig::default()));
    let metrics = RecordingMetrics::new();
    let auth = Arc::new(AuthContextResolver::new(
        identity.clone(),
        Some(Arc::new(MemoryTokenCache::new())),
        metrics.clone(),
    ));

    let engine = Arc::new(ProxyEngine::new(
        routes,
        auth,
        registry,
        breakers,
        Arc::new(hub_operations()),
        metrics.clone(),
    ));

    let state = Arc::new(AppState {
        engine,
        services: vec!["order-service".to_string(), "user-service".to_string()],
        metrics: metrics.inner.clone(),
    });

    TestGateway {
        app: server::router(state, 1024 * 1024),
        backend,
        identity,
        metrics,
    }
}

/// Handler echoing the order lookup back as a successful envelope
pub fn order_handler() -> Handler {
    Arc::new(|call: &BackendCall| {
        let request: Value = serde_json::from_slice(&call.payload).unwrap();
        let body = serde_json::json!({
            "apiResponse": { "success": true, "message": "ok" },
            "order": {
                "orderId": request["orderId"],
                "userId": request["userId"],
                "symbol": "AAPL",
                "status": "FILLED"
            }
        });
        Ok(Bytes::from(serde_json::to_vec(&body).unwrap()))
    })
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, headers, body)
}
