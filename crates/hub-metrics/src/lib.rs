//! Prometheus metrics for the hub gateway
//!
//! Collectors are registered once in the default registry:
//! - Proxied requests (by route, backend service and outcome)
//! - Request latency
//! - Token validation cache hits and misses
//! - Circuit breaker trips

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, TextEncoder, opts, register_histogram_vec,
    register_int_counter, register_int_counter_vec,
};

// ============================================================================
// Request Metrics
// ============================================================================

/// Proxied requests (by route, service and outcome)
pub static GATEWAY_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "gateway_requests_total",
            "Total number of requests proxied by the gateway"
        ),
        &["route", "service", "outcome"]
    )
    .expect("Failed to register GATEWAY_REQUESTS_TOTAL metric")
});

/// Request duration in seconds (histogram)
pub static GATEWAY_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "gateway_request_duration_seconds",
        "Proxied request duration in seconds",
        &["route", "service"]
    )
    .expect("Failed to register GATEWAY_REQUEST_DURATION_SECONDS metric")
});

// ============================================================================
// Auth Cache Metrics
// ============================================================================

pub static TOKEN_CACHE_HITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "gateway_token_cache_hits_total",
        "Token validations answered from the cache"
    ))
    .expect("Failed to register TOKEN_CACHE_HITS_TOTAL metric")
});

pub static TOKEN_CACHE_MISSES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "gateway_token_cache_misses_total",
        "Token validations that required an identity service call"
    ))
    .expect("Failed to register TOKEN_CACHE_MISSES_TOTAL metric")
});

// ============================================================================
// Circuit Breaker Metrics
// ============================================================================

pub static CIRCUIT_BREAKER_TRIPS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "gateway_circuit_breaker_trips_total",
        "Requests rejected because a circuit breaker was open"
    ))
    .expect("Failed to register CIRCUIT_BREAKER_TRIPS_TOTAL metric")
});

// ============================================================================
// Metrics Collection
// ============================================================================

/// Gather all registered metrics and encode as Prometheus text format
pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics() {
        GATEWAY_REQUESTS_TOTAL
            .with_label_values(&["get-order", "order-service", "success"])
            .inc();
        CIRCUIT_BREAKER_TRIPS_TOTAL.inc();

        let metrics_text = gather_metrics().unwrap();
        assert!(metrics_text.contains("gateway_requests_total"));
        assert!(metrics_text.contains("gateway_circuit_breaker_trips_total"));
    }
}
