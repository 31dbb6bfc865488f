//! # Hub Redis
//!
//! Low-level async Redis client used by the gateway's token cache.
//!
//! - No business logic, only key-value operations with expiry
//! - Automatic reconnection through `ConnectionManager`
//! - Cheap to clone; every clone shares the managed connection

mod client;

pub use client::RedisClient;

// Re-export commonly used types
pub use redis::RedisError;

/// Result type for Redis operations
pub type Result<T> = std::result::Result<T, RedisError>;
