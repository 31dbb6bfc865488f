// ============================================================================
// Authentication Configuration
// ============================================================================

use crate::constants::MAX_TOKEN_CACHE_TTL_SECS;
use crate::{env_bool, env_parse};
use std::time::Duration;

/// Where validated tokens are cached
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub cache_enabled: bool,
    pub cache_backend: CacheBackend,
    /// Never longer than five minutes
    pub token_cache_ttl: Duration,
    /// Bound for a single cache GET/SET round-trip
    pub cache_op_timeout: Duration,
    /// Logical name of the service that validates tokens
    pub identity_service: String,
    pub identity_timeout: Duration,
}

impl AuthConfig {
    pub(crate) fn from_env() -> Self {
        let cache_backend = match std::env::var("AUTH_CACHE_BACKEND")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "memory" => CacheBackend::Memory,
            _ => CacheBackend::Redis,
        };

        let ttl_secs = env_parse("TOKEN_CACHE_TTL_SECS", MAX_TOKEN_CACHE_TTL_SECS)
            .clamp(1, MAX_TOKEN_CACHE_TTL_SECS);

        Self {
            cache_enabled: env_bool("AUTH_CACHE_ENABLED", true),
            cache_backend,
            token_cache_ttl: Duration::from_secs(ttl_secs),
            cache_op_timeout: Duration::from_millis(env_parse("CACHE_OP_TIMEOUT_MS", 500)),
            identity_service: std::env::var("IDENTITY_SERVICE")
                .unwrap_or_else(|_| "user-service".to_string()),
            identity_timeout: Duration::from_millis(env_parse("IDENTITY_TIMEOUT_MS", 5000)),
        }
    }
}
