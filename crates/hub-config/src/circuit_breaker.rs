// ============================================================================
// Circuit Breaker Configuration
// ============================================================================

use crate::constants::{
    DEFAULT_HALF_OPEN_REQUESTS, DEFAULT_MAX_FAILURES, DEFAULT_RESET_TIMEOUT_SECS,
};
use crate::env_parse;
use anyhow::Result;
use std::time::Duration;

/// Thresholds for one service's circuit breaker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening (default: 5)
    pub max_failures: u32,
    /// Time since the last failure before a probe is admitted (default: 30s)
    pub reset_timeout: Duration,
    /// Probe successes required to close again (default: 3)
    pub half_open_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: DEFAULT_MAX_FAILURES,
            reset_timeout: Duration::from_secs(DEFAULT_RESET_TIMEOUT_SECS),
            half_open_requests: DEFAULT_HALF_OPEN_REQUESTS,
        }
    }
}

impl CircuitBreakerConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            max_failures: env_parse("CIRCUIT_BREAKER_MAX_FAILURES", DEFAULT_MAX_FAILURES),
            reset_timeout: Duration::from_secs(env_parse(
                "CIRCUIT_BREAKER_RESET_TIMEOUT_SECS",
                DEFAULT_RESET_TIMEOUT_SECS,
            )),
            half_open_requests: env_parse(
                "CIRCUIT_BREAKER_HALF_OPEN_REQUESTS",
                DEFAULT_HALF_OPEN_REQUESTS,
            ),
        }
    }

    /// `<PREFIX>_CB_*` variables, layered over `base`. None if the service sets none.
    pub(crate) fn override_from_env(prefix: &str, base: &Self) -> Option<Self> {
        let max_failures = std::env::var(format!("{prefix}_CB_MAX_FAILURES")).ok();
        let reset_timeout = std::env::var(format!("{prefix}_CB_RESET_TIMEOUT_SECS")).ok();
        let half_open = std::env::var(format!("{prefix}_CB_HALF_OPEN_REQUESTS")).ok();

        if max_failures.is_none() && reset_timeout.is_none() && half_open.is_none() {
            return None;
        }

        Some(Self {
            max_failures: max_failures
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(base.max_failures),
            reset_timeout: reset_timeout
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(base.reset_timeout),
            half_open_requests: half_open
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(base.half_open_requests),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_failures == 0 {
            anyhow::bail!("circuit breaker max_failures must be at least 1");
        }
        if self.half_open_requests == 0 {
            anyhow::bail!("circuit breaker half_open_requests must be at least 1");
        }
        Ok(())
    }
}
