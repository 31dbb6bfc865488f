// ============================================================================
// Gateway Core
// ============================================================================
//
// Long-lived components shared by every request:
// - Route table: compiled once at startup, read without locking
// - Connection registry: one lazily dialed connection per backend service
// - Circuit breakers: one fault-isolation state machine per backend service
//
// All of them are built explicitly at startup and passed by reference.
//
// ============================================================================

pub mod circuit_breaker;
pub mod connection;
pub mod metadata;
pub mod registry;
pub mod route;
pub mod route_table;

pub use circuit_breaker::{BreakerError, BreakerStats, CircuitBreaker, CircuitBreakerRegistry, CircuitState};
pub use connection::{
    BackendCall, BackendConnection, BackendFailure, CloseFailure, ConnectionState, Dialer,
    HttpConnection, HttpDialer,
};
pub use metadata::ForwardingMetadata;
pub use registry::{CloseError, ConnectionRegistry};
pub use route::{CompiledRoute, OperationId, RateLimit, RatePeriod, RouteDefinition};
pub use route_table::RouteTable;
