//! Key/value metadata forwarded to backends alongside every call.

use axum::http::{header::HeaderName, HeaderMap, HeaderValue};
use hub_error::{GatewayError, GatewayResult};
use std::collections::HashMap;

pub const FORWARDED_METHOD: &str = "x-forwarded-method";
pub const FORWARDED_PATH: &str = "x-forwarded-path";
pub const ORIGINAL_URI: &str = "x-original-uri";
pub const USER_ID: &str = "x-user-id";
pub const USER_EMAIL: &str = "x-user-email";
pub const REQUEST_ID: &str = "x-request-id";
/// One key per captured path variable: `x-path-<name>`
pub const PATH_VARIABLE_PREFIX: &str = "x-path-";

/// Header-backed metadata. Keys are case-insensitive and later inserts
/// replace earlier ones; both keys and values are validated on insert.
#[derive(Debug, Clone, Default)]
pub struct ForwardingMetadata {
    headers: HeaderMap,
}

impl ForwardingMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects keys and values that cannot travel as a header. The error
    /// names the key only, never the rejected value.
    pub fn insert(&mut self, key: &str, value: &str) -> GatewayResult<()> {
        let name = HeaderName::from_bytes(key.to_ascii_lowercase().as_bytes()).map_err(|_| {
            GatewayError::invalid_request(format!("forwarding metadata key '{}' is invalid", key))
        })?;
        let value = HeaderValue::from_bytes(value.as_bytes()).map_err(|_| {
            GatewayError::invalid_request(format!(
                "forwarding metadata '{}' has an invalid value",
                name
            ))
        })?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .get(key.to_ascii_lowercase().as_str())
            .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
    }

    /// Add `x-path-<name>` for every captured variable
    pub fn insert_path_variables(&mut self, variables: &HashMap<String, String>) -> GatewayResult<()> {
        for (name, value) in variables {
            self.insert(&format!("{}{}", PATH_VARIABLE_PREFIX, name), value)?;
        }
        Ok(())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}
