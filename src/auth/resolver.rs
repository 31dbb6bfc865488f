// ============================================================================
// Auth Context Resolver
// ============================================================================
//
// Bearer token -> UserContext, cache-first:
// 1. key = token_valid:<sha256(token)>
// 2. cache hit: return the cached context, no identity call
// 3. miss: call the identity service under a timeout
//    - success: cache under the key for the TTL (max 5 minutes)
//    - failure: TokenInvalid, no retry, nothing cached
//
// A failing or slow cache degrades to a miss; it never fails the request.
//
// ============================================================================

use super::cache::{NoopTokenCache, TokenCache};
use super::identity::IdentityClient;
use super::token::{extract_bearer_token, token_cache_key};
use crate::metrics::MetricsRecorder;
use axum::http::HeaderMap;
use hub_config::{AuthConfig, MAX_TOKEN_CACHE_TTL_SECS};
use hub_error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Identity attached to a request after its credential was validated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub user_id: String,
    pub email: String,
}

pub struct AuthContextResolver {
    identity: Arc<dyn IdentityClient>,
    cache: Arc<dyn TokenCache>,
    metrics: Arc<dyn MetricsRecorder>,
    ttl: Duration,
    identity_timeout: Duration,
    cache_timeout: Duration,
}

impl AuthContextResolver {
    /// `cache: None` disables caching; every validation calls the identity service
    pub fn new(
        identity: Arc<dyn IdentityClient>,
        cache: Option<Arc<dyn TokenCache>>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            identity,
            cache: cache.unwrap_or_else(|| Arc::new(NoopTokenCache)),
            metrics,
            ttl: Duration::from_secs(MAX_TOKEN_CACHE_TTL_SECS),
            identity_timeout: Duration::from_secs(5),
            cache_timeout: Duration::from_millis(500),
        }
    }

    pub fn with_config(mut self, config: &AuthConfig) -> Self {
        self.ttl = config
            .token_cache_ttl
            .min(Duration::from_secs(MAX_TOKEN_CACHE_TTL_SECS));
        self.identity_timeout = config.identity_timeout;
        self.cache_timeout = config.cache_op_timeout;
        self
    }

    pub fn with_identity_timeout(mut self, identity_timeout: Duration) -> Self {
        self.identity_timeout = identity_timeout;
        self
    }

    pub fn cache_backend(&self) -> &'static str {
        self.cache.backend()
    }

    /// Extract the bearer token from `headers` and validate it
    pub async fn authenticate(&self, headers: &HeaderMap) -> GatewayResult<UserContext> {
        let token = extract_bearer_token(headers)?;
        self.validate_token(token).await
    }

    pub async fn validate_token(&self, token: &str) -> GatewayResult<UserContext> {
        let key = token_cache_key(token);

        if let Some(user) = self.cached(&key).await {
            self.metrics.record_cache_hit();
            tracing::debug!(user_id = %user.user_id, "Token validated from cache");
            return Ok(user);
        }
        self.metrics.record_cache_miss();

        let claims = match timeout(self.identity_timeout, self.identity.validate_token(token)).await {
            Ok(Ok(claims)) => claims,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, token_length = token.len(), "Token validation failed");
                return Err(GatewayError::TokenInvalid(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.identity_timeout.as_millis() as u64,
                    "Identity service timed out validating token"
                );
                return Err(GatewayError::TokenInvalid("identity service timed out".to_string()));
            }
        };

        if !claims.valid || claims.user_id.is_empty() || claims.email.is_empty() {
            tracing::warn!(token_length = token.len(), "Identity service returned incomplete claims");
            return Err(GatewayError::TokenInvalid("incomplete user information".to_string()));
        }

        let user = UserContext {
            user_id: claims.user_id,
            email: claims.email,
        };

        self.store(&key, &user).await;
        tracing::debug!(user_id = %user.user_id, "Token validated by identity service");

        Ok(user)
    }

    async fn cached(&self, key: &str) -> Option<UserContext> {
        match timeout(self.cache_timeout, self.cache.get(key)).await {
            Ok(Ok(user)) => user,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, cache = self.cache.backend(), "Token cache read failed");
                None
            }
            Err(_) => {
                tracing::warn!(cache = self.cache.backend(), "Token cache read timed out");
                None
            }
        }
    }

    async fn store(&self, key: &str, user: &UserContext) {
        match timeout(self.cache_timeout, self.cache.set(key, user, self.ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(error = %e, cache = self.cache.backend(), "Token cache write failed");
            }
            Err(_) => {
                tracing::warn!(cache = self.cache.backend(), "Token cache write timed out");
            }
        }
    }
}
