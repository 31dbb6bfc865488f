use axum::{http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

mod backend;

pub use backend::BackendCode;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway error type
///
/// Covers every way a request can fail between the HTTP surface and a
/// backend, plus the load-time configuration failures that abort startup.
#[derive(Error, Debug)]
pub enum GatewayError {
    // ===== Configuration Errors (fatal at load time) =====
    #[error("Invalid path pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    // ===== Routing Errors =====
    #[error("No route found for {method} {path}")]
    RouteNotFound { method: String, path: String },

    // ===== Authentication Errors =====
    #[error("Authorization header not found")]
    TokenMissing,

    #[error("Malformed authorization header: {0}")]
    TokenMalformed(String),

    #[error("Token validation failed: {0}")]
    TokenInvalid(String),

    // ===== Connectivity Errors =====
    #[error("Circuit breaker is open for service {service}")]
    CircuitOpen { service: String },

    #[error("Too many probe requests in half-open state for service {service}")]
    TooManyProbes { service: String },

    #[error("Failed to dial service {service}: {reason}")]
    Dial { service: String, reason: String },

    #[error("Connection to {service} is not healthy: {state}")]
    Unhealthy { service: String, state: String },

    // ===== Request Translation Errors =====
    #[error("Unsupported operation {service}/{operation}")]
    UnsupportedOperation { service: String, operation: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ===== Backend Errors =====
    #[error("Backend call to {operation} exceeded its deadline")]
    Timeout { operation: String },

    #[error("Backend returned {code}: {message}")]
    Backend { code: BackendCode, message: String },

    // ===== Internal Errors =====
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::TokenMissing
            | GatewayError::TokenMalformed(_)
            | GatewayError::TokenInvalid(_) => StatusCode::UNAUTHORIZED,
            GatewayError::CircuitOpen { .. }
            | GatewayError::TooManyProbes { .. }
            | GatewayError::Dial { .. }
            | GatewayError::Unhealthy { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Backend { code, .. } => code.status_code(),
            GatewayError::Pattern { .. }
            | GatewayError::Config(_)
            | GatewayError::UnsupportedOperation { .. }
            | GatewayError::Json(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the stable error code clients match on
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::RouteNotFound { .. } => "ROUTE_NOT_FOUND",
            // A header that is not a usable bearer credential counts as missing
            GatewayError::TokenMissing | GatewayError::TokenMalformed(_) => "AUTH_TOKEN_MISSING",
            GatewayError::TokenInvalid(_) => "AUTH_TOKEN_INVALID",
            GatewayError::CircuitOpen { .. } | GatewayError::TooManyProbes { .. } => {
                "CIRCUIT_BREAKER_OPEN"
            }
            GatewayError::Dial { .. } | GatewayError::Unhealthy { .. } => "SERVICE_UNAVAILABLE",
            GatewayError::InvalidRequest(_) => "INVALID_ARGUMENT",
            GatewayError::Timeout { .. } => "TIMEOUT",
            GatewayError::Backend { code, .. } => code.error_code(),
            _ => "INTERNAL_ERROR",
        }
    }

    /// Get a client-safe message (no addresses, credentials or internals)
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::RouteNotFound { .. } => "Route not found".to_string(),
            GatewayError::TokenMissing => "Authorization token is required".to_string(),
            GatewayError::TokenMalformed(_) => {
                "Authorization header must use the Bearer scheme".to_string()
            }
            GatewayError::TokenInvalid(_) => "Token expired or invalid".to_string(),
            GatewayError::CircuitOpen { service } | GatewayError::TooManyProbes { service } => {
                format!("Service {} is temporarily unavailable (circuit breaker open)", service)
            }
            GatewayError::Dial { service, .. } | GatewayError::Unhealthy { service, .. } => {
                format!("Service {} is unavailable", service)
            }
            GatewayError::InvalidRequest(msg) => format!("Invalid request: {}", msg),
            GatewayError::Timeout { .. } => "Backend request timed out".to_string(),
            GatewayError::Backend { code, message } => code.client_message(message),
            _ => "Internal server error".to_string(),
        }
    }

    /// Log this error with appropriate level and context
    pub fn log(&self) {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(
                error = %self,
                error_code = %code,
                status = %status.as_u16(),
                "Server error occurred"
            );
        } else if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(
                error = %self,
                error_code = %code,
                "Authentication failed"
            );
        } else {
            tracing::debug!(
                error = %self,
                error_code = %code,
                "Client error occurred"
            );
        }
    }

    /// Build the JSON error envelope for this error
    pub fn envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.user_message(),
            code: self.error_code(),
            request_id: request_id.map(str::to_string),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Convert into an HTTP response carrying the caller's request id
    pub fn into_response_with(self, request_id: Option<&str>) -> axum::response::Response {
        self.log();
        let status = self.status_code();
        (status, axum::Json(self.envelope(request_id))).into_response()
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        self.into_response_with(None)
    }
}

/// `{ "error", "code", "requestId", "timestamp" }`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

// ============================================================================
// Helper functions for creating common errors
// ============================================================================

impl GatewayError {
    pub fn config(msg: impl Into<String>) -> Self {
        GatewayError::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        GatewayError::Internal(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        GatewayError::InvalidRequest(msg.into())
    }

    pub fn backend(code: BackendCode, message: impl Into<String>) -> Self {
        GatewayError::Backend {
            code,
            message: message.into(),
        }
    }
}
