// ============================================================================
// Backend Service Endpoints
// ============================================================================

use crate::env_parse;
use std::time::Duration;

/// Network location of one logical backend service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// `host:port` or a full `http://` URL
    pub address: String,
    pub dial_timeout: Duration,
    /// Carried for backends and clients; the gateway itself never retries
    pub max_retries: u32,
}

impl ServiceEndpoint {
    pub fn new(address: impl Into<String>, dial_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            dial_timeout,
            max_retries: 3,
        }
    }

    pub(crate) fn from_env(prefix: &str, default_address: &str, default_timeout_secs: u64) -> Self {
        Self {
            address: std::env::var(format!("{prefix}_ADDRESS"))
                .unwrap_or_else(|_| default_address.to_string()),
            dial_timeout: Duration::from_secs(env_parse(
                &format!("{prefix}_TIMEOUT_SECS"),
                default_timeout_secs,
            )),
            max_retries: env_parse(&format!("{prefix}_MAX_RETRIES"), 3),
        }
    }
}

/// (name, env prefix, default address, default dial timeout secs)
pub(crate) const DEFAULT_SERVICES: &[(&str, &str, &str, u64)] = &[
    ("user-service", "USER_SERVICE", "localhost:50051", 5),
    ("order-service", "ORDER_SERVICE", "localhost:50052", 10),
    ("position-service", "POSITION_SERVICE", "localhost:50053", 5),
    ("market-data-service", "MARKET_DATA_SERVICE", "localhost:50054", 3),
];
