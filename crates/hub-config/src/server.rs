// ============================================================================
// HTTP Server Configuration
// ============================================================================

use crate::constants::{DEFAULT_HTTP_PORT, DEFAULT_MAX_BODY_SIZE};
use crate::env_parse;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub shutdown_timeout: Duration,
    pub max_body_size: usize,
    /// Declarative route table (YAML)
    pub routes_path: String,
}

impl ServerConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            port: env_parse("HTTP_PORT", DEFAULT_HTTP_PORT),
            shutdown_timeout: Duration::from_secs(env_parse("SHUTDOWN_TIMEOUT", 30)),
            max_body_size: env_parse("MAX_BODY_SIZE", DEFAULT_MAX_BODY_SIZE),
            routes_path: std::env::var("ROUTES_PATH")
                .unwrap_or_else(|_| "config/routes.yaml".to_string()),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
