//! Request, cache and circuit breaker metrics.
//!
//! The pipeline only talks to `MetricsRecorder`. `GatewayMetrics` feeds the
//! Prometheus collectors in `hub_metrics` and keeps in-process aggregates
//! that back `/metrics/json` and `/metrics/summary`.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub use hub_metrics::gather_metrics;

/// Routes listed in the text summary
const SUMMARY_TOP_ROUTES: usize = 10;

pub trait MetricsRecorder: Send + Sync {
    fn record_request(&self, route: &str, service: &str, latency: Duration, success: bool);

    fn record_cache_hit(&self);

    fn record_cache_miss(&self);

    fn record_circuit_breaker_trip(&self);
}

#[derive(Debug, Default, Clone)]
struct EndpointStats {
    requests: u64,
    successes: u64,
    failures: u64,
    total_latency_ms: u64,
    last_request_at: Option<DateTime<Utc>>,
}

impl EndpointStats {
    fn record(&mut self, latency_ms: u64, success: bool) {
        self.requests += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.total_latency_ms += latency_ms;
        self.last_request_at = Some(Utc::now());
    }

    fn avg_latency_ms(&self) -> f64 {
        ratio(self.total_latency_ms, self.requests)
    }
}

#[derive(Debug)]
pub struct GatewayMetrics {
    started: Instant,
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_latency_ms: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    circuit_breaker_trips: AtomicU64,
    routes: DashMap<String, EndpointStats>,
    services: DashMap<String, EndpointStats>,
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            circuit_breaker_trips: AtomicU64::new(0),
            routes: DashMap::new(),
            services: DashMap::new(),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_requests.load(Ordering::Relaxed);
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let uptime = self.started.elapsed().as_secs_f64();

        let routes = self
            .routes
            .iter()
            .map(|entry| {
                let stats = entry.value();
                let snapshot = RouteSnapshot {
                    requests: stats.requests,
                    successes: stats.successes,
                    failures: stats.failures,
                    avg_latency_ms: stats.avg_latency_ms(),
                    last_request_at: stats.last_request_at,
                };
                (entry.key().clone(), snapshot)
            })
            .collect();

        let services = self
            .services
            .iter()
            .map(|entry| {
                let stats = entry.value();
                let snapshot = ServiceSnapshot {
                    requests: stats.requests,
                    successes: stats.successes,
                    failures: stats.failures,
                    avg_latency_ms: stats.avg_latency_ms(),
                };
                (entry.key().clone(), snapshot)
            })
            .collect();

        MetricsSnapshot {
            uptime_seconds: uptime,
            total_requests: total,
            successful_requests: successful,
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            success_rate: 100.0 * ratio(successful, total),
            avg_latency_ms: ratio(self.total_latency_ms.load(Ordering::Relaxed), total),
            requests_per_second: if uptime > 0.0 { total as f64 / uptime } else { 0.0 },
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate: 100.0 * ratio(hits, hits + misses),
            circuit_breaker_trips: self.circuit_breaker_trips.load(Ordering::Relaxed),
            routes,
            services,
        }
    }
}

impl MetricsRecorder for GatewayMetrics {
    fn record_request(&self, route: &str, service: &str, latency: Duration, success: bool) {
        let outcome = if success { "success" } else { "error" };
        hub_metrics::GATEWAY_REQUESTS_TOTAL
            .with_label_values(&[route, service, outcome])
            .inc();
        hub_metrics::GATEWAY_REQUEST_DURATION_SECONDS
            .with_label_values(&[route, service])
            .observe(latency.as_secs_f64());

        let latency_ms = latency.as_millis() as u64;
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);

        self.routes
            .entry(route.to_string())
            .or_default()
            .record(latency_ms, success);
        if !service.is_empty() {
            self.services
                .entry(service.to_string())
                .or_default()
                .record(latency_ms, success);
        }
    }

    fn record_cache_hit(&self) {
        hub_metrics::TOKEN_CACHE_HITS_TOTAL.inc();
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_cache_miss(&self) {
        hub_metrics::TOKEN_CACHE_MISSES_TOTAL.inc();
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_circuit_breaker_trip(&self) {
        hub_metrics::CIRCUIT_BREAKER_TRIPS_TOTAL.inc();
        self.circuit_breaker_trips.fetch_add(1, Ordering::Relaxed);
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Point-in-time view of the gateway metrics, served as `/metrics/json`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub uptime_seconds: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Percentage, 0 when nothing was recorded
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub requests_per_second: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Percentage, 0 when the cache was never consulted
    pub cache_hit_rate: f64,
    pub circuit_breaker_trips: u64,
    pub routes: BTreeMap<String, RouteSnapshot>,
    pub services: BTreeMap<String, ServiceSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub avg_latency_ms: f64,
    pub last_request_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub avg_latency_ms: f64,
}

impl MetricsSnapshot {
    /// Human-readable report served as `/metrics/summary`
    pub fn summary(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = self.write_summary(&mut out);
        out
    }

    fn write_summary(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "=== Hub API Gateway Metrics ===")?;
        writeln!(out)?;

        writeln!(out, "Overall Statistics:")?;
        writeln!(
            out,
            "  Uptime: {:.0} seconds ({:.1} minutes)",
            self.uptime_seconds,
            self.uptime_seconds / 60.0
        )?;
        writeln!(out, "  Total Requests: {}", self.total_requests)?;
        writeln!(
            out,
            "  Successful: {} ({:.1}%)",
            self.successful_requests, self.success_rate
        )?;
        writeln!(out, "  Failed: {}", self.failed_requests)?;
        writeln!(out, "  Avg Latency: {:.2} ms", self.avg_latency_ms)?;
        writeln!(out, "  Requests/sec: {:.2}", self.requests_per_second)?;
        writeln!(out)?;

        writeln!(out, "Cache Performance:")?;
        writeln!(out, "  Cache Hits: {}", self.cache_hits)?;
        writeln!(out, "  Cache Misses: {}", self.cache_misses)?;
        writeln!(out, "  Hit Rate: {:.1}%", self.cache_hit_rate)?;
        writeln!(out)?;

        writeln!(out, "Reliability:")?;
        writeln!(out, "  Circuit Breaker Trips: {}", self.circuit_breaker_trips)?;

        if !self.routes.is_empty() {
            writeln!(out)?;
            writeln!(out, "Top Routes by Traffic:")?;
            let mut routes: Vec<(&String, &RouteSnapshot)> = self.routes.iter().collect();
            // Stable sort keeps name order among equal counts
            routes.sort_by(|a, b| b.1.requests.cmp(&a.1.requests));
            for (rank, (name, route)) in routes.iter().take(SUMMARY_TOP_ROUTES).enumerate() {
                writeln!(
                    out,
                    "  {}. {} - {} requests ({:.2} ms avg)",
                    rank + 1,
                    name,
                    route.requests,
                    route.avg_latency_ms
                )?;
            }
        }

        if !self.services.is_empty() {
            writeln!(out)?;
            writeln!(out, "Backend Services:")?;
            for (name, service) in &self.services {
                writeln!(
                    out,
                    "  {}: {} requests, {} failures ({:.2} ms avg)",
                    name, service.requests, service.failures, service.avg_latency_ms
                )?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_feeds_prometheus_collectors() {
        let metrics = GatewayMetrics::new();
        let before = hub_metrics::TOKEN_CACHE_HITS_TOTAL.get();

        metrics.record_cache_hit();
        metrics.record_request("get-order", "order-service", Duration::from_millis(12), true);

        assert!(hub_metrics::TOKEN_CACHE_HITS_TOTAL.get() >= before + 1);
        let text = gather_metrics().unwrap();
        assert!(text.contains("gateway_request_duration_seconds"));
    }

    #[test]
    fn test_snapshot_aggregates_by_route_and_service() {
        let metrics = GatewayMetrics::new();
        metrics.record_request("get-order", "order-service", Duration::from_millis(10), true);
        metrics.record_request("get-order", "order-service", Duration::from_millis(30), false);
        metrics.record_request("login", "user-service", Duration::from_millis(5), true);
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        metrics.record_circuit_breaker_trip();

        let snapshot = metrics.snapshot();

        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.successful_requests, 2);
        assert_eq!(snapshot.failed_requests, 1);
        assert!((snapshot.avg_latency_ms - 15.0).abs() < f64::EPSILON);
        assert!((snapshot.cache_hit_rate - 75.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.circuit_breaker_trips, 1);

        let route = &snapshot.routes["get-order"];
        assert_eq!(route.requests, 2);
        assert_eq!(route.failures, 1);
        assert!((route.avg_latency_ms - 20.0).abs() < f64::EPSILON);
        assert!(route.last_request_at.is_some());

        assert_eq!(snapshot.services["user-service"].successes, 1);
    }

    #[test]
    fn test_empty_snapshot_has_zero_rates() {
        let snapshot = GatewayMetrics::new().snapshot();

        assert_eq!(snapshot.success_rate, 0.0);
        assert_eq!(snapshot.cache_hit_rate, 0.0);
        assert_eq!(snapshot.avg_latency_ms, 0.0);
        assert!(snapshot.routes.is_empty());

        let summary = snapshot.summary();
        assert!(summary.starts_with("=== Hub API Gateway Metrics ==="));
        assert!(!summary.contains("Top Routes by Traffic:"));
    }

    #[test]
    fn test_summary_ranks_routes_by_traffic() {
        let metrics = GatewayMetrics::new();
        metrics.record_request("login", "user-service", Duration::from_millis(4), true);
        for _ in 0..3 {
            metrics.record_request("get-order", "order-service", Duration::from_millis(8), true);
        }

        let summary = metrics.snapshot().summary();

        assert!(summary.contains("  1. get-order - 3 requests (8.00 ms avg)"));
        assert!(summary.contains("  2. login - 1 requests (4.00 ms avg)"));
        assert!(summary.contains("  order-service: 3 requests, 0 failures (8.00 ms avg)"));
        assert!(summary.contains("  Successful: 4 (100.0%)"));
    }
}
