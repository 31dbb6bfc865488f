// ============================================================================
// HTTP Surface
// ============================================================================
//
// - /health, /health/services: gateway and backend health
// - /metrics: Prometheus text format
// - /metrics/json, /metrics/summary: in-process snapshot as JSON or text
// - everything else: the proxy pipeline
//
// Every response carries `x-request-id`, taken from the request when it is
// present and sane, generated otherwise.
//
// ============================================================================

use crate::gateway::metadata::REQUEST_ID;
use crate::health;
use crate::metrics::{GatewayMetrics, MetricsSnapshot};
use crate::proxy::{ProxyEngine, ProxyRequest};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

const MAX_REQUEST_ID_LEN: usize = 128;

pub struct AppState {
    pub engine: Arc<ProxyEngine>,
    /// Configured backend service names, reported by /health/services
    pub services: Vec<String>,
    pub metrics: Arc<GatewayMetrics>,
}

/// No router-wide timeout; backend calls run under their own deadlines.
pub fn router(state: Arc<AppState>, max_body_size: usize) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/services", get(health::services_health))
        .route("/metrics", get(metrics))
        .route("/metrics/json", get(metrics_json))
        .route("/metrics/summary", get(metrics_summary))
        .fallback(proxy)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(max_body_size))
                .into_inner(),
        )
        .with_state(state)
}

async fn proxy(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = request_id(&headers);
    let request = ProxyRequest {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        uri: uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string()),
        headers,
        body,
        request_id,
    };

    let mut response = match state.engine.handle(&request).await {
        Ok(reply) => (reply.status, Json(reply.body)).into_response(),
        Err(e) => e.into_response_with(Some(&request.request_id)),
    };

    if let Ok(value) = HeaderValue::from_str(&request.request_id) {
        response.headers_mut().insert(REQUEST_ID, value);
    }
    response
}

async fn metrics() -> Response {
    match crate::metrics::gather_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to gather metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn metrics_json(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

async fn metrics_summary(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.snapshot().summary(),
    )
        .into_response()
}

/// Incoming `x-request-id` if printable and short, else a fresh UUID
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_reuses_incoming_header() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID, HeaderValue::from_static("req-123"));

        assert_eq!(request_id(&headers), "req-123");
    }

    #[test]
    fn test_request_id_generated_when_missing_or_oversized() {
        let generated = request_id(&HeaderMap::new());
        assert!(uuid::Uuid::parse_str(&generated).is_ok());

        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID, HeaderValue::from_str(&"x".repeat(200)).unwrap());
        assert_ne!(request_id(&headers), "x".repeat(200));
    }
}
