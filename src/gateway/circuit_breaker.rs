// ============================================================================
// Circuit Breaker
// ============================================================================
//
// One fault-isolation state machine per backend service.
//
// States:
// - Closed: Normal operation, calls pass through
// - Open: Backend is failing, calls are rejected without running
// - HalfOpen: Cooldown elapsed, a bounded number of probes may run
//
// Transitions:
// - Closed -> Open: consecutive failures reach max_failures
// - Open -> HalfOpen: time since the last failure exceeds reset_timeout
// - HalfOpen -> Closed: probe successes reach half_open_requests
// - HalfOpen -> Open: any probe failure
//
// Every read and write for one breaker happens under that breaker's own
// mutex. The lock is never held across the wrapped operation.
//
// ============================================================================

use hub_config::{CircuitBreakerConfig, Config};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(name)
    }
}

/// Why `call` did not return the operation's own result
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("too many probe requests in half-open state")]
    TooManyProbes,

    #[error(transparent)]
    Inner(E),
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failures: u32,
    pub probe_successes: u32,
    pub probes_in_flight: u32,
    pub max_failures: u32,
    pub reset_timeout_secs: u64,
    pub half_open_requests: u32,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
    probe_successes: u32,
    probes_in_flight: u32,
    /// Bumped on every state change so stale probes cannot touch new counters
    generation: u64,
}

impl BreakerInner {
    fn transition(&mut self, to: CircuitState) {
        self.state = to;
        self.probe_successes = 0;
        self.probes_in_flight = 0;
        self.generation += 1;
    }
}

pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                last_failure: None,
                probe_successes: 0,
                probes_in_flight: 0,
                generation: 0,
            }),
        }
    }

    /// Run `operation` under breaker protection
    ///
    /// # Returns
    /// * `Ok(T)` - Operation ran and succeeded
    /// * `Err(BreakerError::CircuitOpen)` - Rejected, operation not polled
    /// * `Err(BreakerError::TooManyProbes)` - Rejected, probe slots exhausted
    /// * `Err(BreakerError::Inner(E))` - Operation ran and failed
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        let mut admission = self.admit()?;

        match operation.await {
            Ok(value) => {
                self.record_success(&mut admission);
                Ok(value)
            }
            Err(error) => {
                self.record_failure(&mut admission);
                Err(BreakerError::Inner(error))
            }
        }
    }

    fn admit<E>(&self) -> Result<Admission<'_>, BreakerError<E>> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            let cooled_down = inner
                .last_failure
                .map(|at| at.elapsed() > self.config.reset_timeout)
                .unwrap_or(true);

            if !cooled_down {
                tracing::debug!(service = %self.name, "Circuit breaker open, rejecting call");
                return Err(BreakerError::CircuitOpen);
            }

            inner.transition(CircuitState::HalfOpen);
            tracing::info!(
                service = %self.name,
                reset_timeout_secs = self.config.reset_timeout.as_secs(),
                "Circuit breaker transitioning to half-open"
            );
        }

        match inner.state {
            CircuitState::HalfOpen => {
                if inner.probes_in_flight >= self.config.half_open_requests {
                    tracing::debug!(
                        service = %self.name,
                        in_flight = inner.probes_in_flight,
                        "Circuit breaker probe limit reached, rejecting call"
                    );
                    return Err(BreakerError::TooManyProbes);
                }
                inner.probes_in_flight += 1;
                Ok(Admission {
                    breaker: self,
                    probe_generation: Some(inner.generation),
                })
            }
            _ => Ok(Admission {
                breaker: self,
                probe_generation: None,
            }),
        }
    }

    fn record_success(&self, admission: &mut Admission<'_>) {
        let mut inner = self.inner.lock();
        let probe_generation = admission.probe_generation.take();

        match inner.state {
            CircuitState::Closed => {
                inner.failures = 0;
            }
            CircuitState::HalfOpen => {
                // Only probes admitted in this half-open period count
                if probe_generation != Some(inner.generation) {
                    return;
                }
                inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
                inner.probe_successes += 1;

                if inner.probe_successes >= self.config.half_open_requests {
                    inner.transition(CircuitState::Closed);
                    inner.failures = 0;
                    inner.last_failure = None;
                    tracing::info!(service = %self.name, "Circuit breaker closed after successful recovery");
                } else {
                    tracing::debug!(
                        service = %self.name,
                        successes = inner.probe_successes,
                        required = self.config.half_open_requests,
                        "Circuit breaker probe succeeded"
                    );
                }
            }
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self, admission: &mut Admission<'_>) {
        let mut inner = self.inner.lock();
        admission.probe_generation = None;

        inner.failures = inner.failures.saturating_add(1);
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::Closed => {
                if inner.failures >= self.config.max_failures {
                    inner.transition(CircuitState::Open);
                    tracing::warn!(
                        service = %self.name,
                        failures = inner.failures,
                        threshold = self.config.max_failures,
                        reset_timeout_secs = self.config.reset_timeout.as_secs(),
                        "Circuit breaker opened due to failures"
                    );
                } else {
                    tracing::debug!(
                        service = %self.name,
                        failures = inner.failures,
                        threshold = self.config.max_failures,
                        "Circuit breaker failure recorded"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.transition(CircuitState::Open);
                tracing::warn!(service = %self.name, "Circuit breaker reopened after failure in half-open state");
            }
            CircuitState::Open => {}
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn failures(&self) -> u32 {
        self.inner.lock().failures
    }

    pub fn stats(&self) -> BreakerStats {
        let inner = self.inner.lock();
        BreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failures: inner.failures,
            probe_successes: inner.probe_successes,
            probes_in_flight: inner.probes_in_flight,
            max_failures: self.config.max_failures,
            reset_timeout_secs: self.config.reset_timeout.as_secs(),
            half_open_requests: self.config.half_open_requests,
        }
    }

    /// Force the breaker closed and clear all counters (manual recovery)
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.transition(CircuitState::Closed);
        inner.failures = 0;
        inner.last_failure = None;
        tracing::info!(service = %self.name, "Circuit breaker manually reset");
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// An admitted call. A probe slot is released when this drops without an
/// outcome, e.g. when the caller's future is cancelled mid-flight.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    probe_generation: Option<u64>,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if let Some(generation) = self.probe_generation.take() {
            let mut inner = self.breaker.inner.lock();
            if inner.generation == generation {
                inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
            }
        }
    }
}

// ============================================================================
// Per-service breakers
// ============================================================================

/// Lazily creates one breaker per service name
pub struct CircuitBreakerRegistry {
    default_config: CircuitBreakerConfig,
    overrides: HashMap<String, CircuitBreakerConfig>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            overrides: HashMap::new(),
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            default_config: config.circuit_breaker.clone(),
            overrides: config.circuit_breaker_overrides.clone(),
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_override(mut self, service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        self.overrides.insert(service.into(), config);
        self
    }

    /// Breaker for `service`, created on first use
    pub fn get(&self, service: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(service) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write();
        breakers
            .entry(service.to_string())
            .or_insert_with(|| {
                let config = self
                    .overrides
                    .get(service)
                    .cloned()
                    .unwrap_or_else(|| self.default_config.clone());
                Arc::new(CircuitBreaker::new(service, config))
            })
            .clone()
    }
}
