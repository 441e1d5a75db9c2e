// Performance monitor - sliding-window request, error and cache metrics
// Author: kelexine (https://github.com/kelexine)
//
// Samples live in bounded buffers; all statistics are computed at read time
// over the samples newer than `now - window`. Nothing survives a restart.

use crate::config::PerformanceConfig;
use crate::error::Result;
use crate::metrics::buffer::SampleBuffer;
use crate::metrics::clock::{Clock, SystemClock};
use crate::metrics::memory::{MemoryProbe, MemoryUsage, ProcessMemoryProbe};
use crate::metrics::models::*;
use crate::metrics::registry::MetricsRegistry;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

/// Window used by `health_check`
pub const HEALTH_WINDOW_MS: i64 = 5 * 60 * 1000;
/// Window used by `check_alerts`
pub const ALERT_WINDOW_MS: i64 = 10 * 60 * 1000;
/// Window used by `get_performance_recommendations`
pub const RECOMMENDATION_WINDOW_MS: i64 = 60 * 60 * 1000;

const MS_PER_MINUTE: i64 = 60_000;

pub struct PerformanceMonitor {
    config: PerformanceConfig,
    clock: Arc<dyn Clock>,
    memory: Arc<dyn MemoryProbe>,
    started_at: DateTime<Utc>,
    response_times: Mutex<SampleBuffer<ResponseTimeSample>>,
    errors: Mutex<SampleBuffer<ErrorSample>>,
    requests: Mutex<SampleBuffer<RequestSample>>,
    cache_accesses: Mutex<SampleBuffer<CacheAccessSample>>,
    registry: Option<MetricsRegistry>,
}

impl PerformanceMonitor {
    /// Monitor using the wall clock and the current process's memory
    pub fn new(config: PerformanceConfig) -> Self {
        let probe = Arc::new(ProcessMemoryProbe::new(config.memory_limit_mb));
        Self::with_sources(config, Arc::new(SystemClock), probe)
    }

    /// Monitor with injected time and memory sources
    pub fn with_sources(config: PerformanceConfig, clock: Arc<dyn Clock>, memory: Arc<dyn MemoryProbe>) -> Self {
        let registry = match MetricsRegistry::new() {
            Ok(registry) => Some(registry),
            Err(e) => {
                warn!("Prometheus registry unavailable, text export disabled: {}", e);
                None
            }
        };

        let capacity = config.max_samples;
        Self {
            started_at: clock.now(),
            config,
            clock,
            memory,
            response_times: Mutex::new(SampleBuffer::new(capacity)),
            errors: Mutex::new(SampleBuffer::new(capacity)),
            requests: Mutex::new(SampleBuffer::new(capacity)),
            cache_accesses: Mutex::new(SampleBuffer::new(capacity)),
            registry,
        }
    }

    pub fn config(&self) -> &PerformanceConfig {
        &self.config
    }

    // ========================================================================
    // Recording
    // ========================================================================

    pub fn record_response_time(&self, route: &str, method: &str, duration_ms: f64) {
        let slow = duration_ms > self.config.slow_request_threshold_ms;
        if slow {
            warn!(
                route = route,
                method = method,
                duration_ms = duration_ms,
                "Slow request: {} {} took {:.2}ms",
                method,
                route,
                duration_ms
            );
        }

        self.response_times.lock().push(ResponseTimeSample {
            route: route.to_string(),
            method: method.to_string(),
            duration_ms,
            timestamp: self.clock.now(),
        });

        if let Some(registry) = &self.registry {
            registry.observe_duration(method, route, duration_ms, slow);
        }
    }

    pub fn record_error(&self, route: &str, method: &str, error: impl Display) {
        self.errors.lock().push(ErrorSample {
            route: route.to_string(),
            method: method.to_string(),
            message: error.to_string(),
            timestamp: self.clock.now(),
        });

        if let Some(registry) = &self.registry {
            registry.observe_error(method, route);
        }
    }

    pub fn record_request(&self, route: &str, method: &str) {
        self.requests.lock().push(RequestSample {
            route: route.to_string(),
            method: method.to_string(),
            timestamp: self.clock.now(),
        });

        if let Some(registry) = &self.registry {
            registry.observe_request(method, route);
        }
    }

    /// Count a request turned away by the rate limiter. Not a sample: a
    /// rejected request never reaches a handler.
    pub fn record_rate_limited(&self, route: &str, method: &str) {
        if let Some(registry) = &self.registry {
            registry.observe_rate_limited(method, route);
        }
    }

    pub fn record_cache_access(&self, hit: bool) {
        self.cache_accesses.lock().push(CacheAccessSample {
            hit,
            timestamp: self.clock.now(),
        });

        if let Some(registry) = &self.registry {
            registry.observe_cache_access(hit);
        }
    }

    /// Number of retained response-time samples (not windowed)
    pub fn response_time_sample_count(&self) -> usize {
        self.response_times.lock().len()
    }

    /// Retained response-time samples, oldest first (not windowed)
    pub fn response_time_samples(&self) -> Vec<ResponseTimeSample> {
        self.response_times.lock().iter().cloned().collect()
    }

    /// Drop all recorded samples
    pub fn reset(&self) {
        self.response_times.lock().clear();
        self.errors.lock().clear();
        self.requests.lock().clear();
        self.cache_accesses.lock().clear();
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    /// Statistics over the configured default window
    pub fn get_default_metrics(&self) -> PerformanceMetrics {
        self.get_metrics(self.config.default_window_ms)
    }

    /// Statistics over samples newer than `now - window_ms`
    pub fn get_metrics(&self, window_ms: i64) -> PerformanceMetrics {
        let now = self.clock.now();
        // A window reaching past the representable range covers everything
        let cutoff = Duration::try_milliseconds(window_ms.max(0))
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        // Snapshot under each lock, compute without holding any
        let response_times = self.response_times.lock().since(cutoff);
        let errors = self.errors.lock().since(cutoff);
        let requests = self.requests.lock().since(cutoff);
        let cache_accesses = self.cache_accesses.lock().since(cutoff);

        PerformanceMetrics {
            timestamp: now,
            window_ms,
            uptime_secs: (now - self.started_at).num_seconds(),
            response_time: response_time_stats(&response_times),
            error_rate: error_rate_stats(&errors, requests.len()),
            throughput: throughput_stats(&requests),
            cache_hit_rate: cache_hit_stats(&cache_accesses),
            memory: self.get_memory_usage(),
        }
    }

    pub fn get_memory_usage(&self) -> MemoryUsage {
        MemoryUsage::from(self.memory.sample())
    }

    /// Healthy iff, over the last five minutes, error rate, average response
    /// time and heap usage are all under their thresholds.
    pub fn health_check(&self) -> PerformanceHealth {
        let metrics = self.get_metrics(HEALTH_WINDOW_MS);
        let limits = &self.config.thresholds;

        let mut checks = BTreeMap::new();
        checks.insert(
            "error_rate".to_string(),
            HealthCheck::below(metrics.error_rate.rate, limits.health_error_rate),
        );
        checks.insert(
            "response_time".to_string(),
            HealthCheck::below(metrics.response_time.average, limits.health_response_time_ms),
        );
        checks.insert(
            "memory".to_string(),
            HealthCheck::below(metrics.memory.heap_used_percentage, limits.health_memory_percent),
        );

        let status = if checks.values().all(|c| c.passed) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        PerformanceHealth {
            status,
            timestamp: metrics.timestamp,
            checks,
            metrics,
        }
    }

    /// Rule-based suggestions over the last hour
    pub fn get_performance_recommendations(&self) -> Vec<Recommendation> {
        let metrics = self.get_metrics(RECOMMENDATION_WINDOW_MS);
        let limits = &self.config.thresholds;
        let mut recommendations = Vec::new();

        if metrics.response_time.average > limits.recommend_response_time_ms {
            recommendations.push(Recommendation {
                kind: MetricKind::ResponseTime,
                priority: Priority::High,
                message: "Average response time is high; consider caching hot endpoints or optimizing slow queries"
                    .to_string(),
                current: metrics.response_time.average,
                target: limits.recommend_response_time_ms / 2.0,
            });
        }

        if metrics.error_rate.rate > limits.recommend_error_rate {
            recommendations.push(Recommendation {
                kind: MetricKind::ErrorRate,
                priority: Priority::High,
                message: "Error rate is elevated; review the error breakdown for failing routes".to_string(),
                current: metrics.error_rate.rate,
                target: limits.recommend_error_rate / 2.0,
            });
        }

        let cache = &metrics.cache_hit_rate;
        if cache.hits + cache.misses > 0 && cache.hit_rate < limits.recommend_cache_hit_rate {
            recommendations.push(Recommendation {
                kind: MetricKind::CacheHitRate,
                priority: Priority::Medium,
                message: "Cache hit rate is low; review TTLs and warm frequently requested keys".to_string(),
                current: cache.hit_rate,
                target: limits.recommend_cache_hit_rate + 10.0,
            });
        }

        recommendations
    }

    /// Threshold alerts over the last ten minutes
    pub fn check_alerts(&self) -> Vec<Alert> {
        let metrics = self.get_metrics(ALERT_WINDOW_MS);
        let limits = &self.config.thresholds;
        let now = metrics.timestamp;
        let mut alerts = Vec::new();

        if metrics.error_rate.rate > limits.alert_error_rate {
            alerts.push(Alert {
                id: Uuid::new_v4(),
                level: AlertLevel::Critical,
                kind: MetricKind::ErrorRate,
                message: format!("High error rate: {:.2}%", metrics.error_rate.rate),
                value: metrics.error_rate.rate,
                threshold: limits.alert_error_rate,
                timestamp: now,
            });
        }

        if metrics.response_time.p99 > limits.alert_p99_ms {
            alerts.push(Alert {
                id: Uuid::new_v4(),
                level: AlertLevel::Warning,
                kind: MetricKind::ResponseTime,
                message: format!("High P99 response time: {:.2}ms", metrics.response_time.p99),
                value: metrics.response_time.p99,
                threshold: limits.alert_p99_ms,
                timestamp: now,
            });
        }

        if metrics.memory.heap_used_percentage > limits.alert_memory_percent {
            alerts.push(Alert {
                id: Uuid::new_v4(),
                level: AlertLevel::Critical,
                kind: MetricKind::Memory,
                message: format!("High memory usage: {:.2}%", metrics.memory.heap_used_percentage),
                value: metrics.memory.heap_used_percentage,
                threshold: limits.alert_memory_percent,
                timestamp: now,
            });
        }

        for alert in &alerts {
            match alert.level {
                AlertLevel::Critical => error!(kind = ?alert.kind, "{}", alert.message),
                AlertLevel::Warning => warn!(kind = ?alert.kind, "{}", alert.message),
            }
        }

        alerts
    }

    /// Metrics, health, alerts and recommendations in one document
    pub fn export_metrics(&self) -> MetricsExport {
        MetricsExport {
            timestamp: self.clock.now(),
            metrics: self.get_metrics(self.config.default_window_ms),
            health: self.health_check(),
            alerts: self.check_alerts(),
            recommendations: self.get_performance_recommendations(),
        }
    }

    /// Prometheus text exposition of everything recorded so far
    pub fn export_prometheus(&self) -> Result<String> {
        match &self.registry {
            Some(registry) => {
                registry.update_memory(&self.get_memory_usage());
                registry.gather()
            }
            None => Ok(String::new()),
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Value at `floor(len * pct / 100)` of an ascending slice, or the max when
/// that index is past the end.
pub fn percentile(sorted: &[f64], pct: usize) -> f64 {
    let Some(&max) = sorted.last() else {
        return 0.0;
    };
    let index = sorted.len() * pct / 100;
    sorted.get(index).copied().unwrap_or(max)
}

fn response_time_stats(samples: &[ResponseTimeSample]) -> ResponseTimeStats {
    if samples.is_empty() {
        return ResponseTimeStats::default();
    }

    let mut durations: Vec<f64> = samples.iter().map(|s| s.duration_ms).collect();
    durations.sort_by(|a, b| a.total_cmp(b));

    let count = durations.len();
    let sum: f64 = durations.iter().sum();

    ResponseTimeStats {
        average: sum / count as f64,
        min: durations[0],
        max: durations[count - 1],
        p95: percentile(&durations, 95),
        p99: percentile(&durations, 99),
        count,
    }
}

fn error_rate_stats(errors: &[ErrorSample], total_requests: usize) -> ErrorRateStats {
    let mut breakdown = BTreeMap::new();
    for e in errors {
        *breakdown.entry(format!("{} {}", e.method, e.route)).or_insert(0) += 1;
    }

    let rate = if total_requests == 0 {
        0.0
    } else {
        errors.len() as f64 / total_requests as f64 * 100.0
    };

    ErrorRateStats {
        count: errors.len(),
        rate,
        breakdown,
    }
}

fn throughput_stats(requests: &[RequestSample]) -> ThroughputStats {
    if requests.is_empty() {
        return ThroughputStats::default();
    }

    let mut per_minute: BTreeMap<i64, usize> = BTreeMap::new();
    for r in requests {
        let bucket = r.timestamp.timestamp_millis().div_euclid(MS_PER_MINUTE) * MS_PER_MINUTE;
        *per_minute.entry(bucket).or_insert(0) += 1;
    }

    let total = requests.len();
    let requests_per_minute = total as f64 / per_minute.len() as f64;

    ThroughputStats {
        requests_per_minute,
        requests_per_second: requests_per_minute / 60.0,
        total_requests: total,
        peak_minute: per_minute.values().copied().max().unwrap_or(0),
    }
}

fn cache_hit_stats(accesses: &[CacheAccessSample]) -> CacheHitStats {
    let hits = accesses.iter().filter(|a| a.hit).count();
    let misses = accesses.len() - hits;
    let hit_rate = if accesses.is_empty() {
        0.0
    } else {
        hits as f64 / accesses.len() as f64 * 100.0
    };

    CacheHitStats {
        hits,
        misses,
        hit_rate,
    }
}
