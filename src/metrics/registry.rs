// Prometheus registry mirroring the performance monitor
// Author: kelexine (https://github.com/kelexine)

use crate::error::{AppError, Result};
use crate::metrics::memory::MemoryUsage;
use prometheus::{CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

/// Counters and histograms fed by every recorded sample.
///
/// Owned by one `PerformanceMonitor`, so independent monitors (one per test,
/// say) never share series.
pub struct MetricsRegistry {
    registry: Registry,
    requests_total: CounterVec,
    request_duration: HistogramVec,
    errors_total: CounterVec,
    slow_requests_total: CounterVec,
    rate_limited_total: CounterVec,
    cache_accesses_total: CounterVec,
    memory_megabytes: GaugeVec,
}

impl MetricsRegistry {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        // ============================================================================
        // REQUEST METRICS
        // ============================================================================

        let requests_total = CounterVec::new(
            Opts::new("requests_total", "Total number of HTTP requests"),
            &["method", "route"],
        )?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "Request duration in seconds")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["method", "route"],
        )?;

        let errors_total = CounterVec::new(
            Opts::new("request_errors_total", "Total number of failed requests"),
            &["method", "route"],
        )?;

        let slow_requests_total = CounterVec::new(
            Opts::new("slow_requests_total", "Requests slower than the slow-request threshold"),
            &["method", "route"],
        )?;

        let rate_limited_total = CounterVec::new(
            Opts::new("rate_limited_total", "Requests rejected by the rate limiter"),
            &["method", "route"],
        )?;

        // ============================================================================
        // CACHE METRICS
        // ============================================================================

        let cache_accesses_total = CounterVec::new(
            Opts::new("cache_accesses_total", "Cache lookups by outcome"),
            &["result"], // result: hit, miss
        )?;

        // ============================================================================
        // PROCESS METRICS
        // ============================================================================

        let memory_megabytes = GaugeVec::new(
            Opts::new("process_memory_megabytes", "Process memory usage in megabytes"),
            &["kind"], // kind: rss, heap_total, heap_used, external
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(slow_requests_total.clone()))?;
        registry.register(Box::new(rate_limited_total.clone()))?;
        registry.register(Box::new(cache_accesses_total.clone()))?;
        registry.register(Box::new(memory_megabytes.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            errors_total,
            slow_requests_total,
            rate_limited_total,
            cache_accesses_total,
            memory_megabytes,
        })
    }

    pub fn observe_request(&self, method: &str, route: &str) {
        self.requests_total.with_label_values(&[method, route]).inc();
    }

    pub fn observe_duration(&self, method: &str, route: &str, duration_ms: f64, slow: bool) {
        self.request_duration
            .with_label_values(&[method, route])
            .observe(duration_ms / 1000.0);
        if slow {
            self.slow_requests_total.with_label_values(&[method, route]).inc();
        }
    }

    pub fn observe_error(&self, method: &str, route: &str) {
        self.errors_total.with_label_values(&[method, route]).inc();
    }

    pub fn observe_rate_limited(&self, method: &str, route: &str) {
        self.rate_limited_total.with_label_values(&[method, route]).inc();
    }

    pub fn observe_cache_access(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_accesses_total.with_label_values(&[result]).inc();
    }

    pub fn update_memory(&self, usage: &MemoryUsage) {
        self.memory_megabytes.with_label_values(&["rss"]).set(usage.rss);
        self.memory_megabytes.with_label_values(&["heap_total"]).set(usage.heap_total);
        self.memory_megabytes.with_label_values(&["heap_used"]).set(usage.heap_used);
        self.memory_megabytes.with_label_values(&["external"]).set(usage.external);
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| AppError::Internal(format!("failed to encode metrics: {}", e)))?;
        String::from_utf8(buffer).map_err(|e| AppError::Internal(format!("metrics are not UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let registry = MetricsRegistry::new().unwrap();
        registry.observe_request("GET", "/api/products");
        registry.observe_duration("GET", "/api/products", 12.0, false);
        registry.observe_error("GET", "/api/products");
        registry.observe_cache_access(true);
        registry.observe_rate_limited("GET", "/api/products");
        registry.update_memory(&MemoryUsage::default());

        let metrics = registry.gather().unwrap();
        assert!(metrics.contains("requests_total"));
        assert!(metrics.contains("request_duration_seconds"));
        assert!(metrics.contains("request_errors_total"));
        assert!(metrics.contains("cache_accesses_total{result=\"hit\"} 1"));
        assert!(metrics.contains("process_memory_megabytes"));
        assert!(metrics.contains("rate_limited_total{method=\"GET\",route=\"/api/products\"} 1"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = MetricsRegistry::new().unwrap();
        let b = MetricsRegistry::new().unwrap();
        a.observe_cache_access(false);
        assert!(a.gather().unwrap().contains("result=\"miss\""));
        assert!(!b.gather().unwrap().contains("result=\"miss\""));
    }
}
