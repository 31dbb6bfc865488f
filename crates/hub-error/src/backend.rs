// ============================================================================
// Backend Status Codes
// ============================================================================
//
// Canonical status codes a backend reports for a failed operation, and their
// mapping onto the gateway's HTTP status and stable error code.
//
// ============================================================================

use axum::http::StatusCode;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendCode {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl BackendCode {
    /// Parse a code by canonical name (`NOT_FOUND`, `NotFound`) or number (`5`)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Ok(number) = name.parse::<u32>() {
            return Self::from_number(number);
        }

        let normalized: String = name
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        let code = match normalized.as_str() {
            "cancelled" | "canceled" => BackendCode::Cancelled,
            "unknown" => BackendCode::Unknown,
            "invalidargument" => BackendCode::InvalidArgument,
            "deadlineexceeded" => BackendCode::DeadlineExceeded,
            "notfound" => BackendCode::NotFound,
            "alreadyexists" => BackendCode::AlreadyExists,
            "permissiondenied" => BackendCode::PermissionDenied,
            "resourceexhausted" => BackendCode::ResourceExhausted,
            "failedprecondition" => BackendCode::FailedPrecondition,
            "aborted" => BackendCode::Aborted,
            "outofrange" => BackendCode::OutOfRange,
            "unimplemented" => BackendCode::Unimplemented,
            "internal" => BackendCode::Internal,
            "unavailable" => BackendCode::Unavailable,
            "dataloss" => BackendCode::DataLoss,
            "unauthenticated" => BackendCode::Unauthenticated,
            _ => return None,
        };
        Some(code)
    }

    pub fn from_number(number: u32) -> Option<Self> {
        let code = match number {
            1 => BackendCode::Cancelled,
            2 => BackendCode::Unknown,
            3 => BackendCode::InvalidArgument,
            4 => BackendCode::DeadlineExceeded,
            5 => BackendCode::NotFound,
            6 => BackendCode::AlreadyExists,
            7 => BackendCode::PermissionDenied,
            8 => BackendCode::ResourceExhausted,
            9 => BackendCode::FailedPrecondition,
            10 => BackendCode::Aborted,
            11 => BackendCode::OutOfRange,
            12 => BackendCode::Unimplemented,
            13 => BackendCode::Internal,
            14 => BackendCode::Unavailable,
            15 => BackendCode::DataLoss,
            16 => BackendCode::Unauthenticated,
            _ => return None,
        };
        Some(code)
    }

    /// Best guess when a backend answers with a bare HTTP status
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => BackendCode::InvalidArgument,
            401 => BackendCode::Unauthenticated,
            403 => BackendCode::PermissionDenied,
            404 => BackendCode::NotFound,
            409 => BackendCode::AlreadyExists,
            429 => BackendCode::ResourceExhausted,
            501 => BackendCode::Unimplemented,
            503 => BackendCode::Unavailable,
            504 => BackendCode::DeadlineExceeded,
            500 => BackendCode::Internal,
            _ => BackendCode::Unknown,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BackendCode::NotFound => StatusCode::NOT_FOUND,
            BackendCode::AlreadyExists => StatusCode::CONFLICT,
            BackendCode::PermissionDenied => StatusCode::FORBIDDEN,
            BackendCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            BackendCode::InvalidArgument => StatusCode::BAD_REQUEST,
            BackendCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            BackendCode::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            BackendCode::NotFound => "NOT_FOUND",
            BackendCode::AlreadyExists => "ALREADY_EXISTS",
            BackendCode::PermissionDenied => "PERMISSION_DENIED",
            BackendCode::Unauthenticated => "UNAUTHENTICATED",
            BackendCode::InvalidArgument => "INVALID_ARGUMENT",
            BackendCode::Unavailable => "SERVICE_UNAVAILABLE",
            BackendCode::DeadlineExceeded => "TIMEOUT",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Client-error codes carry business messages worth forwarding;
    /// everything else is replaced by a fixed message.
    pub fn client_message(&self, backend_message: &str) -> String {
        let forwardable = matches!(
            self,
            BackendCode::NotFound
                | BackendCode::AlreadyExists
                | BackendCode::PermissionDenied
                | BackendCode::Unauthenticated
                | BackendCode::InvalidArgument
        );

        if forwardable && !backend_message.trim().is_empty() {
            return truncate(backend_message.trim(), 256);
        }

        match self {
            BackendCode::NotFound => "Resource not found".to_string(),
            BackendCode::AlreadyExists => "Resource already exists".to_string(),
            BackendCode::PermissionDenied => "Permission denied".to_string(),
            BackendCode::Unauthenticated => "Authentication required".to_string(),
            BackendCode::InvalidArgument => "Invalid argument".to_string(),
            BackendCode::Unavailable => "Service is unavailable".to_string(),
            BackendCode::DeadlineExceeded => "Backend request timed out".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl fmt::Display for BackendCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

fn truncate(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    message.chars().take(max_chars).collect()
}
