//! Redis client implementation with connection management

use crate::Result;
use redis::{aio::ConnectionManager, AsyncCommands};

/// Redis client with automatic reconnection
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    /// Connect to Redis server
    ///
    /// Supports both redis:// and rediss:// (TLS) URLs
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// GET - Get value by key
    pub async fn get<T: redis::FromRedisValue>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.conn.clone();
        conn.get(key).await
    }

    /// SETEX - Set key with expiry in seconds
    pub async fn set_ex<V>(&self, key: &str, value: V, seconds: u64) -> Result<()>
    where
        V: redis::ToRedisArgs + Send + Sync,
    {
        let mut conn = self.conn.clone();
        conn.set_ex(key, value, seconds).await
    }

    /// PING - Check connectivity
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_set_ex_and_get() -> Result<()> {
        let client = RedisClient::connect("redis://localhost:6379").await?;

        client.set_ex("hub_test_key", "value", 1).await?;
        let value: Option<String> = client.get("hub_test_key").await?;
        assert_eq!(value, Some("value".to_string()));

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        let value: Option<String> = client.get("hub_test_key").await?;
        assert_eq!(value, None);

        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_ping() -> Result<()> {
        let client = RedisClient::connect("redis://localhost:6379").await?;
        client.ping().await
    }
}
