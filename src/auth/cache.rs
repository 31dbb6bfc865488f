// ============================================================================
// Token Validation Cache
// ============================================================================
//
// Maps hash-of-token -> UserContext with a TTL. Callers pass keys produced
// by `token_cache_key`; raw tokens never reach an implementation.
//
// - RedisTokenCache: shared across gateway instances
// - MemoryTokenCache: single instance deployments and tests
// - NoopTokenCache: caching disabled, every lookup is a miss
//
// ============================================================================

use super::resolver::UserContext;
use async_trait::async_trait;
use dashmap::DashMap;
use hub_redis::RedisClient;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt cache entry: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<UserContext>, CacheError>;

    async fn set(&self, key: &str, user: &UserContext, ttl: Duration) -> Result<(), CacheError>;

    /// Short name for logs
    fn backend(&self) -> &'static str;
}

#[derive(Debug, Default)]
pub struct NoopTokenCache;

#[async_trait]
impl TokenCache for NoopTokenCache {
    async fn get(&self, _key: &str) -> Result<Option<UserContext>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _user: &UserContext, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "none"
    }
}

/// In-process cache with lazy expiry
#[derive(Debug, Default)]
pub struct MemoryTokenCache {
    entries: DashMap<String, (UserContext, Instant)>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
    }
}

#[async_trait]
impl TokenCache for MemoryTokenCache {
    async fn get(&self, key: &str) -> Result<Option<UserContext>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            let (user, expires_at) = entry.value();
            if *expires_at > now {
                return Ok(Some(user.clone()));
            }
        }
        self.entries.remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, user: &UserContext, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), (user.clone(), Instant::now() + ttl));
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Entries stored as JSON strings with SETEX
#[derive(Clone)]
pub struct RedisTokenCache {
    client: RedisClient,
}

impl RedisTokenCache {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenCache for RedisTokenCache {
    async fn get(&self, key: &str) -> Result<Option<UserContext>, CacheError> {
        let raw: Option<String> = self
            .client
            .get(key)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, user: &UserContext, ttl: Duration) -> Result<(), CacheError> {
        let json = serde_json::to_string(user)?;
        self.client
            .set_ex(key, json, ttl.as_secs().max(1))
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserContext {
        UserContext {
            user_id: "user-1".to_string(),
            email: "trader@hub.test".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_cache_expires_entries() {
        let cache = MemoryTokenCache::new();
        cache.set("token_valid:abc", &user(), Duration::from_secs(300)).await.unwrap();

        assert_eq!(cache.get("token_valid:abc").await.unwrap(), Some(user()));

        tokio::time::advance(Duration::from_secs(301)).await;

        assert_eq!(cache.get("token_valid:abc").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = MemoryTokenCache::new();
        cache.set("short", &user(), Duration::from_secs(1)).await.unwrap();
        cache.set("long", &user(), Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        cache.purge_expired();

        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_noop_cache_always_misses() {
        let cache = NoopTokenCache;
        cache.set("k", &user(), Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_redis_cache_round_trip() {
        let client = RedisClient::connect("redis://localhost:6379").await.unwrap();
        let cache = RedisTokenCache::new(client);

        cache
            .set("token_valid:test", &user(), Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(cache.get("token_valid:test").await.unwrap(), Some(user()));
    }
}
