// ============================================================================
// Backend Connections
// ============================================================================
//
// A connection is one long-lived, shared channel to a logical backend
// service. The registry owns connections; a `Dialer` creates them.
//
// Wire protocol of the HTTP connection:
// - POST {address}/{rpc_service}/{rpc_method}, JSON body
// - forwarding metadata travels as request headers
// - 2xx: the body is the JSON response payload
// - non-2xx: `{"code": <name or number>, "message": ...}`, or the code is
//   derived from the HTTP status when the body carries none
//
// ============================================================================

use super::metadata::ForwardingMetadata;
use super::route::OperationId;
use async_trait::async_trait;
use bytes::Bytes;
use hub_config::ServiceEndpoint;
use hub_error::{BackendCode, GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Lifecycle of a backend connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Connecting,
    Ready,
    TransientFailure,
    Shutdown,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Ready => "READY",
            ConnectionState::TransientFailure => "TRANSIENT_FAILURE",
            ConnectionState::Shutdown => "SHUTDOWN",
        };
        f.write_str(name)
    }
}

/// One backend invocation
#[derive(Debug, Clone)]
pub struct BackendCall {
    pub operation: OperationId,
    pub payload: Bytes,
    pub metadata: ForwardingMetadata,
}

/// Failure signal reported by (or on behalf of) the backend
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct BackendFailure {
    pub code: BackendCode,
    pub message: String,
}

impl BackendFailure {
    pub fn new(code: BackendCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<BackendFailure> for GatewayError {
    fn from(failure: BackendFailure) -> Self {
        GatewayError::backend(failure.code, failure.message)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to close connection to {service}: {reason}")]
pub struct CloseFailure {
    pub service: String,
    pub reason: String,
}

#[async_trait]
pub trait BackendConnection: Send + Sync {
    fn service(&self) -> &str;

    fn state(&self) -> ConnectionState;

    /// Wait up to `timeout` for the state to leave `current`.
    /// Returns true if it changed.
    async fn wait_for_state_change(&self, current: ConnectionState, timeout: Duration) -> bool;

    async fn invoke(&self, call: BackendCall) -> Result<Bytes, BackendFailure>;

    async fn close(&self) -> Result<(), CloseFailure>;
}

/// Creates connections for logical service names
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Fails with `GatewayError::Dial` when the service is unreachable
    async fn dial(&self, service: &str) -> GatewayResult<Arc<dyn BackendConnection>>;
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// Dials backends over HTTP using the configured endpoints
pub struct HttpDialer {
    endpoints: HashMap<String, ServiceEndpoint>,
}

impl HttpDialer {
    pub fn new(endpoints: HashMap<String, ServiceEndpoint>) -> Self {
        Self { endpoints }
    }
}

#[async_trait]
impl Dialer for HttpDialer {
    async fn dial(&self, service: &str) -> GatewayResult<Arc<dyn BackendConnection>> {
        let dial_error = |reason: String| GatewayError::Dial {
            service: service.to_string(),
            reason,
        };

        let endpoint = self
            .endpoints
            .get(service)
            .ok_or_else(|| dial_error("no endpoint configured".to_string()))?;

        let base_url = if endpoint.address.starts_with("http://")
            || endpoint.address.starts_with("https://")
        {
            endpoint.address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", endpoint.address.trim_end_matches('/'))
        };

        let url = reqwest::Url::parse(&base_url).map_err(|e| dial_error(e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| dial_error("address has no host".to_string()))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| dial_error("address has no port".to_string()))?;

        // Verify reachability before handing out a connection
        match tokio::time::timeout(
            endpoint.dial_timeout,
            tokio::net::TcpStream::connect((host.as_str(), port)),
        )
        .await
        {
            Ok(Ok(_stream)) => {}
            Ok(Err(e)) => return Err(dial_error(e.to_string())),
            Err(_) => {
                return Err(dial_error(format!(
                    "dial timed out after {}ms",
                    endpoint.dial_timeout.as_millis()
                )))
            }
        }

        let client = reqwest::Client::builder()
            .connect_timeout(endpoint.dial_timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| dial_error(e.to_string()))?;

        tracing::info!(
            service = %service,
            address = %endpoint.address,
            "Connected to backend service"
        );

        Ok(Arc::new(HttpConnection::new(service, base_url, client)))
    }
}

pub struct HttpConnection {
    service: String,
    base_url: String,
    client: reqwest::Client,
    state: watch::Sender<ConnectionState>,
}

/// Error body a backend returns with a non-2xx status
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpConnection {
    pub fn new(service: impl Into<String>, base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let (state, _) = watch::channel(ConnectionState::Ready);
        Self {
            service: service.into(),
            base_url: base_url.into(),
            client,
            state,
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            // Shutdown is terminal
            if *current == next || *current == ConnectionState::Shutdown {
                return false;
            }
            *current = next;
            true
        });

        if changed {
            tracing::debug!(service = %self.service, state = %next, "Connection state changed");
        }
    }

    fn failure_from_response(status: reqwest::StatusCode, body: &[u8]) -> BackendFailure {
        let parsed: Option<ErrorBody> = serde_json::from_slice(body).ok();

        let code = parsed
            .as_ref()
            .and_then(|b| b.code.as_ref())
            .and_then(|code| match code {
                serde_json::Value::String(name) => BackendCode::from_name(name),
                serde_json::Value::Number(n) => n.as_u64().and_then(|n| BackendCode::from_number(n as u32)),
                _ => None,
            })
            .unwrap_or_else(|| BackendCode::from_http_status(status.as_u16()));

        let message = parsed
            .and_then(|b| b.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("backend error").to_string());

        BackendFailure::new(code, message)
    }
}

#[async_trait]
impl BackendConnection for HttpConnection {
    fn service(&self) -> &str {
        &self.service
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    async fn wait_for_state_change(&self, current: ConnectionState, timeout: Duration) -> bool {
        let mut rx = self.state.subscribe();
        let changed = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|state| *state != current)).await,
            Ok(Ok(_))
        );
        changed
    }

    async fn invoke(&self, call: BackendCall) -> Result<Bytes, BackendFailure> {
        if self.state() == ConnectionState::Shutdown {
            return Err(BackendFailure::new(BackendCode::Unavailable, "connection is closed"));
        }

        let url = format!(
            "{}/{}/{}",
            self.base_url, call.operation.service, call.operation.method
        );

        let request = self
            .client
            .post(&url)
            .headers(call.metadata.headers().clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json");

        let response = match request.body(call.payload).send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return Err(BackendFailure::new(BackendCode::Internal, e.to_string()));
            }
            Err(e) => {
                self.set_state(ConnectionState::TransientFailure);
                tracing::warn!(
                    service = %self.service,
                    operation = %call.operation,
                    error = %e,
                    "Backend request failed"
                );
                let code = if e.is_timeout() {
                    BackendCode::DeadlineExceeded
                } else {
                    BackendCode::Unavailable
                };
                return Err(BackendFailure::new(code, e.to_string()));
            }
        };

        self.set_state(ConnectionState::Ready);

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| BackendFailure::new(BackendCode::Unavailable, e.to_string()))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(Self::failure_from_response(status, &body))
        }
    }

    async fn close(&self) -> Result<(), CloseFailure> {
        self.state.send_replace(ConnectionState::Shutdown);
        tracing::debug!(service = %self.service, "Connection closed");
        Ok(())
    }
}
