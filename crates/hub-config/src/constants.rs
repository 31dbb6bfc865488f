// ============================================================================
// Configuration Constants
// ============================================================================

/// Consecutive failures before a breaker opens
pub const DEFAULT_MAX_FAILURES: u32 = 5;

/// Seconds an open breaker waits before admitting a probe
pub const DEFAULT_RESET_TIMEOUT_SECS: u64 = 30;

/// Probe successes needed to close a half-open breaker
pub const DEFAULT_HALF_OPEN_REQUESTS: u32 = 3;

/// Deadline for one backend invocation when the route sets none
pub const DEFAULT_BACKEND_DEADLINE_SECS: u64 = 30;

/// Upper bound for cached token validations (5 minutes).
/// Kept below typical access-token lifetimes so revocations propagate.
pub const MAX_TOKEN_CACHE_TTL_SECS: u64 = 300;

pub(crate) const DEFAULT_HTTP_PORT: u16 = 8080;
pub(crate) const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;
