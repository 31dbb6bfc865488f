// ============================================================================
// Proxy Engine
// ============================================================================
//
// Request pipeline, each stage short-circuiting to an error:
// 1. Route:        RouteTable::find_route                 -> 404
// 2. Authenticate: protected routes only                  -> 401
// 3. Path variables
// 4. Connection:   breaker.call(registry.get_connection)  -> 503
// 5. Build:        typed request for (service, method)    -> 400 / 500
// 6. Invoke:       fresh per-request deadline             -> 504
// 7. Backend failure mapped through BackendCode
// 8. Decode, unwrap a successful envelope, respond
//
// No stage retries. Metrics are recorded for every request that gets past
// authentication.
//
// ============================================================================

use super::envelope::unwrap_envelope;
use super::operations::{OperationInput, OperationRegistry};
use crate::auth::{AuthContextResolver, UserContext};
use crate::gateway::{
    metadata, BackendCall, BackendConnection, BreakerError, CircuitBreakerRegistry, CompiledRoute,
    ConnectionRegistry, ForwardingMetadata, RouteTable,
};
use crate::metrics::MetricsRecorder;
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use hub_config::DEFAULT_BACKEND_DEADLINE_SECS;
use hub_error::{GatewayError, GatewayResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Inbound request as the pipeline sees it
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: String,
    pub path: String,
    /// Path plus query, as received
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub request_id: String,
}

#[derive(Debug, Clone)]
pub struct ProxyReply {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

pub struct ProxyEngine {
    routes: Arc<RouteTable>,
    auth: Arc<AuthContextResolver>,
    registry: Arc<ConnectionRegistry>,
    breakers: Arc<CircuitBreakerRegistry>,
    operations: Arc<OperationRegistry>,
    metrics: Arc<dyn MetricsRecorder>,
    default_deadline: Duration,
}

impl ProxyEngine {
    pub fn new(
        routes: Arc<RouteTable>,
        auth: Arc<AuthContextResolver>,
        registry: Arc<ConnectionRegistry>,
        breakers: Arc<CircuitBreakerRegistry>,
        operations: Arc<OperationRegistry>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            routes,
            auth,
            registry,
            breakers,
            operations,
            metrics,
            default_deadline: Duration::from_secs(DEFAULT_BACKEND_DEADLINE_SECS),
        }
    }

    /// Deadline for routes that do not declare their own
    pub fn with_default_deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline = deadline;
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    /// Warn about routes whose operation has no registered builder
    pub fn log_unsupported_routes(&self) {
        for route in self.routes.routes() {
            if !self.operations.contains(&route.operation()) {
                tracing::warn!(
                    route = %route.name(),
                    operation = %route.operation(),
                    "Route targets an operation with no registered request builder"
                );
            }
        }
    }

    pub async fn handle(&self, request: &ProxyRequest) -> GatewayResult<ProxyReply> {
        let route = self.routes.find_route(&request.path, &request.method)?;

        let user = if route.requires_auth() {
            Some(self.auth.authenticate(&request.headers).await?)
        } else {
            None
        };

        let path_vars = route.extract_variables(&request.path);

        tracing::debug!(
            request_id = %request.request_id,
            route = %route.name(),
            service = %route.service(),
            operation = %route.operation(),
            "Proxying request"
        );

        let started = Instant::now();
        let result = self.forward(route, request, user.as_ref(), &path_vars).await;
        let elapsed = started.elapsed();

        self.metrics
            .record_request(route.name(), route.service(), elapsed, result.is_ok());

        match &result {
            Ok(reply) => tracing::info!(
                request_id = %request.request_id,
                route = %route.name(),
                status = reply.status.as_u16(),
                latency_ms = elapsed.as_millis() as u64,
                "Request completed"
            ),
            Err(e) => tracing::warn!(
                request_id = %request.request_id,
                route = %route.name(),
                error_code = e.error_code(),
                latency_ms = elapsed.as_millis() as u64,
                "Request failed"
            ),
        }

        result
    }

    async fn forward(
        &self,
        route: &CompiledRoute,
        request: &ProxyRequest,
        user: Option<&UserContext>,
        path_vars: &HashMap<String, String>,
    ) -> GatewayResult<ProxyReply> {
        let connection = self.acquire(route.service()).await?;

        let operation = route.operation();
        let codec = self.operations.get(&operation)?;
        let input = OperationInput {
            body: &request.body,
            path_vars,
            user,
        };
        let payload = codec.encode_request(&input)?;

        let call = BackendCall {
            operation: operation.clone(),
            payload,
            metadata: forwarding_metadata(request, user, path_vars)?,
        };

        let deadline = route.timeout().unwrap_or(self.default_deadline);
        let body = match tokio::time::timeout(deadline, connection.invoke(call)).await {
            Ok(Ok(body)) => body,
            Ok(Err(failure)) => {
                tracing::warn!(
                    operation = %operation,
                    code = %failure.code,
                    message = %failure.message,
                    "Backend call failed"
                );
                return Err(failure.into());
            }
            Err(_) => {
                tracing::warn!(
                    operation = %operation,
                    deadline_ms = deadline.as_millis() as u64,
                    "Backend call exceeded its deadline"
                );
                return Err(GatewayError::Timeout {
                    operation: operation.to_string(),
                });
            }
        };

        let response = codec.decode_response(&body)?;

        Ok(ProxyReply {
            status: StatusCode::OK,
            body: unwrap_envelope(response),
        })
    }

    /// Connection for `service`, acquired under its circuit breaker
    async fn acquire(&self, service: &str) -> GatewayResult<Arc<dyn BackendConnection>> {
        let breaker = self.breakers.get(service);

        match breaker.call(self.registry.get_connection(service)).await {
            Ok(connection) => Ok(connection),
            Err(BreakerError::CircuitOpen) => {
                self.metrics.record_circuit_breaker_trip();
                tracing::warn!(service = %service, "Circuit breaker open, rejecting request");
                Err(GatewayError::CircuitOpen {
                    service: service.to_string(),
                })
            }
            Err(BreakerError::TooManyProbes) => {
                self.metrics.record_circuit_breaker_trip();
                tracing::warn!(service = %service, "Circuit breaker probing, rejecting request");
                Err(GatewayError::TooManyProbes {
                    service: service.to_string(),
                })
            }
            Err(BreakerError::Inner(e @ GatewayError::Dial { .. })) => Err(e),
            Err(BreakerError::Inner(other)) => Err(GatewayError::Dial {
                service: service.to_string(),
                reason: other.to_string(),
            }),
        }
    }
}

fn forwarding_metadata(
    request: &ProxyRequest,
    user: Option<&UserContext>,
    path_vars: &HashMap<String, String>,
) -> GatewayResult<ForwardingMetadata> {
    let mut forwarded = ForwardingMetadata::new();
    forwarded.insert(metadata::FORWARDED_METHOD, &request.method)?;
    forwarded.insert(metadata::FORWARDED_PATH, &request.path)?;
    forwarded.insert(metadata::ORIGINAL_URI, &request.uri)?;
    forwarded.insert(metadata::REQUEST_ID, &request.request_id)?;

    if let Some(user) = user {
        forwarded.insert(metadata::USER_ID, &user.user_id)?;
        forwarded.insert(metadata::USER_EMAIL, &user.email)?;
    }

    forwarded.insert_path_variables(path_vars)?;
    Ok(forwarded)
}
