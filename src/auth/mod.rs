//! Authentication context resolution for protected routes.

pub mod cache;
pub mod identity;
pub mod resolver;
pub mod token;

pub use cache::{CacheError, MemoryTokenCache, NoopTokenCache, RedisTokenCache, TokenCache};
pub use identity::{BackendIdentityClient, IdentityClaims, IdentityClient, IdentityError};
pub use resolver::{AuthContextResolver, UserContext};
pub use token::{extract_bearer_token, token_cache_key};
