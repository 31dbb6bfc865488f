// ============================================================================
// Health Endpoints
// ============================================================================
//
// GET /health           - liveness, never touches a backend
// GET /health/services  - HealthCheck for every configured backend plus
//                         its circuit breaker snapshot; 503 if any is down.
//                         An open breaker is reported as-is, without dialing.
//
// ============================================================================

use crate::gateway::{BreakerStats, CircuitState, ConnectionState};
use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use futures_util::future::join_all;
use hub_error::GatewayError;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub service: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ConnectionState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub circuit_breaker: BreakerStats,
}

#[derive(Debug, Serialize)]
pub struct ServicesHealthResponse {
    pub status: &'static str,
    pub services: Vec<ServiceHealth>,
    pub timestamp: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn services_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let registry = state.engine.registry();
    let breakers = state.engine.breakers();

    let checks = state.services.iter().map(|service| async move {
        let breaker = breakers.get(service);
        let result = if breaker.state() == CircuitState::Open {
            Err(GatewayError::CircuitOpen {
                service: service.clone(),
            })
        } else {
            registry.health_check(service).await
        };
        ServiceHealth {
            service: service.clone(),
            healthy: result.is_ok(),
            state: registry.connection_state(service).await,
            error: result.err().map(|e| e.user_message()),
            circuit_breaker: breaker.stats(),
        }
    });
    let services = join_all(checks).await;

    let all_healthy = services.iter().all(|s| s.healthy);
    for unhealthy in services.iter().filter(|s| !s.healthy) {
        tracing::warn!(
            service = %unhealthy.service,
            state = ?unhealthy.state,
            "Backend service unhealthy"
        );
    }

    let (status_code, status) = if all_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(ServicesHealthResponse {
            status,
            services,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }),
    )
}
