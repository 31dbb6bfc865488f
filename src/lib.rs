// ============================================================================
// Hub Gateway
// ============================================================================
//
// HTTP front door for the trading backends. Every inbound request is matched
// against the route table, authenticated when the route is protected, and
// forwarded as a typed call to the owning backend service.
//
// Startup order:
// 1. Configuration and tracing
// 2. Route table (fatal if the file is missing or any pattern is invalid)
// 3. Connection registry, circuit breakers, token cache, auth resolver
// 4. Proxy engine and HTTP router
// 5. Serve until Ctrl-C, then close backend connections
//
// ============================================================================

pub mod auth;
pub mod config;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod proxy;
pub mod server;

use anyhow::{Context, Result};
use auth::{
    AuthContextResolver, BackendIdentityClient, MemoryTokenCache, RedisTokenCache, TokenCache,
};
use config::{CacheBackend, Config, LogFormat};
use gateway::{CircuitBreakerRegistry, ConnectionRegistry, HttpDialer, RouteTable};
use hub_redis::RedisClient;
use metrics::GatewayMetrics;
use proxy::{hub_operations, ProxyEngine};
use server::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MEMORY_CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

pub async fn run() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting API gateway");
    config.log_summary();

    let routes = RouteTable::from_yaml_file(&config.server.routes_path)
        .with_context(|| format!("Failed to load route table from {}", config.server.routes_path))?;
    for service in routes.services() {
        if !config.services.contains_key(&service) {
            anyhow::bail!("routes reference service '{}' with no configured endpoint", service);
        }
    }
    routes.log_summary();

    let metrics = Arc::new(GatewayMetrics::new());

    let dialer = Arc::new(HttpDialer::new(config.services.clone()));
    let registry = Arc::new(ConnectionRegistry::new(dialer, config.health_check_wait));
    let breakers = Arc::new(CircuitBreakerRegistry::from_config(&config));

    let token_cache = build_token_cache(&config).await;
    let identity = Arc::new(BackendIdentityClient::new(
        registry.clone(),
        config.auth.identity_service.clone(),
    ));
    let auth = Arc::new(
        AuthContextResolver::new(identity, token_cache, metrics.clone()).with_config(&config.auth),
    );
    tracing::info!(cache = auth.cache_backend(), "Auth context resolver ready");

    let engine = Arc::new(
        ProxyEngine::new(
            Arc::new(routes),
            auth,
            registry.clone(),
            breakers,
            Arc::new(hub_operations()),
            metrics.clone(),
        )
        .with_default_deadline(config.backend_deadline),
    );
    engine.log_unsupported_routes();

    let mut services: Vec<String> = config.services.keys().cloned().collect();
    services.sort();

    let app = server::router(
        Arc::new(AppState {
            engine,
            services,
            metrics,
        }),
        config.server.max_body_size,
    );

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .context("Failed to bind to address")?;
    tracing::info!(address = %address, "API gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to start server")?;

    tracing::info!("Closing backend connections");
    match tokio::time::timeout(config.server.shutdown_timeout, registry.close()).await {
        Ok(Ok(())) => tracing::info!("Backend connections closed"),
        Ok(Err(e)) => {
            for failure in &e.failures {
                tracing::warn!(
                    service = %failure.service,
                    reason = %failure.reason,
                    "Backend connection failed to close"
                );
            }
        }
        Err(_) => tracing::warn!(
            timeout_secs = config.server.shutdown_timeout.as_secs(),
            "Timed out closing backend connections"
        ),
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let registry = tracing_subscriber::registry().with(EnvFilter::new(config.rust_log.clone()));
    match config.logging.format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

/// Token cache per configuration; an unreachable Redis disables caching
async fn build_token_cache(config: &Config) -> Option<Arc<dyn TokenCache>> {
    if !config.auth.cache_enabled {
        tracing::info!("Token cache disabled");
        return None;
    }

    match config.auth.cache_backend {
        CacheBackend::Memory => {
            let cache = Arc::new(MemoryTokenCache::new());
            let purger = cache.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(MEMORY_CACHE_PURGE_INTERVAL);
                loop {
                    interval.tick().await;
                    purger.purge_expired();
                }
            });
            Some(cache)
        }
        CacheBackend::Redis => {
            tracing::info!(redis = %config.redis_url_safe(), "Connecting to Redis");
            let connect = async {
                let client = RedisClient::connect(&config.redis_url).await?;
                client.ping().await?;
                Ok::<_, hub_redis::RedisError>(client)
            };
            match tokio::time::timeout(REDIS_CONNECT_TIMEOUT, connect).await {
                Ok(Ok(client)) => {
                    tracing::info!("Connected to Redis");
                    Some(Arc::new(RedisTokenCache::new(client)))
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Redis unavailable, token cache disabled");
                    None
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_secs = REDIS_CONNECT_TIMEOUT.as_secs(),
                        "Redis connection timed out, token cache disabled"
                    );
                    None
                }
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received. Shutting down...");
}
