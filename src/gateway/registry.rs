// ============================================================================
// Connection Registry
// ============================================================================
//
// Lazily creates and caches one connection per backend service.
//
// - Lookups take the shared lock only
// - Creation takes the exclusive lock and re-checks before dialing, so any
//   number of concurrent first callers produce a single dial
// - A connection in TransientFailure is still handed out; only Shutdown
//   connections are replaced
// - A failed dial leaves no entry behind
//
// ============================================================================

use super::connection::{BackendConnection, CloseFailure, ConnectionState, Dialer};
use hub_error::{GatewayError, GatewayResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Aggregate of every per-connection close failure
#[derive(Debug, thiserror::Error)]
#[error("{} connection(s) failed to close", failures.len())]
pub struct CloseError {
    pub failures: Vec<CloseFailure>,
}

pub struct ConnectionRegistry {
    dialer: Arc<dyn Dialer>,
    connections: RwLock<HashMap<String, Arc<dyn BackendConnection>>>,
    health_wait: Duration,
}

impl ConnectionRegistry {
    pub fn new(dialer: Arc<dyn Dialer>, health_wait: Duration) -> Self {
        Self {
            dialer,
            connections: RwLock::new(HashMap::new()),
            health_wait,
        }
    }

    /// Existing live connection for `service`, or a freshly dialed one
    pub async fn get_connection(&self, service: &str) -> GatewayResult<Arc<dyn BackendConnection>> {
        {
            let connections = self.connections.read().await;
            if let Some(connection) = connections.get(service) {
                if connection.state() != ConnectionState::Shutdown {
                    return Ok(connection.clone());
                }
            }
        }

        let mut connections = self.connections.write().await;

        // Another caller may have dialed while we waited for the write lock
        if let Some(connection) = connections.get(service) {
            if connection.state() != ConnectionState::Shutdown {
                return Ok(connection.clone());
            }
            tracing::info!(service = %service, "Replacing shut down connection");
            connections.remove(service);
        }

        let connection = self.dialer.dial(service).await.map_err(|e| {
            tracing::warn!(service = %service, error = %e, "Failed to dial backend service");
            e
        })?;

        connections.insert(service.to_string(), connection.clone());
        Ok(connection)
    }

    /// Close every held connection, continuing past individual failures
    pub async fn close(&self) -> Result<(), CloseError> {
        let connections: Vec<(String, Arc<dyn BackendConnection>)> =
            self.connections.write().await.drain().collect();

        let mut failures = Vec::new();
        for (service, connection) in connections {
            match connection.close().await {
                Ok(()) => tracing::debug!(service = %service, "Closed backend connection"),
                Err(failure) => {
                    tracing::warn!(service = %service, error = %failure, "Failed to close backend connection");
                    failures.push(failure);
                }
            }
        }

        if failures.is_empty() {
            tracing::info!("All backend connections closed");
            Ok(())
        } else {
            Err(CloseError { failures })
        }
    }

    /// Ok if the connection is Ready, or becomes Ready within the wait window
    pub async fn health_check(&self, service: &str) -> GatewayResult<()> {
        let connection = self.get_connection(service).await?;
        let unhealthy = |state: ConnectionState| GatewayError::Unhealthy {
            service: service.to_string(),
            state: state.to_string(),
        };

        let deadline = tokio::time::Instant::now() + self.health_wait;
        let mut state = connection.state();

        while state != ConnectionState::Ready {
            if state == ConnectionState::Shutdown {
                return Err(unhealthy(state));
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() || !connection.wait_for_state_change(state, remaining).await {
                return Err(unhealthy(state));
            }
            state = connection.state();
        }

        Ok(())
    }

    /// Names of services with a held connection, sorted
    pub async fn services(&self) -> Vec<String> {
        let mut services: Vec<String> = self.connections.read().await.keys().cloned().collect();
        services.sort();
        services
    }

    /// State of the held connection, None if never connected
    pub async fn connection_state(&self, service: &str) -> Option<ConnectionState> {
        self.connections
            .read()
            .await
            .get(service)
            .map(|connection| connection.state())
    }
}
