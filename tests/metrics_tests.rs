// Performance monitor behaviour through the public API
// Author: kelexine (https://github.com/kelexine)

use agrocache::config::PerformanceConfig;
use agrocache::metrics::{
    AlertLevel, FixedMemoryProbe, HealthStatus, ManualClock, MemoryProbe, MetricKind, PerformanceMonitor,
    ALERT_WINDOW_MS,
};
use chrono::Duration;
use std::sync::Arc;

struct Harness {
    monitor: PerformanceMonitor,
    clock: Arc<ManualClock>,
    memory: Arc<FixedMemoryProbe>,
}

fn harness() -> Harness {
    harness_with(PerformanceConfig::default())
}

fn harness_with(config: PerformanceConfig) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let memory = Arc::new(FixedMemoryProbe::with_usage(100, 1000));
    let monitor = PerformanceMonitor::with_sources(config, clock.clone(), memory.clone());
    Harness { monitor, clock, memory }
}

#[test]
fn test_buffer_keeps_most_recent_samples() {
    let h = harness();
    for i in 0..1001 {
        h.monitor.record_response_time("/api/products", "GET", i as f64);
    }

    assert_eq!(h.monitor.response_time_sample_count(), 1000);
    let samples = h.monitor.response_time_samples();
    assert_eq!(samples.first().map(|s| s.duration_ms), Some(1.0));
    assert_eq!(samples.last().map(|s| s.duration_ms), Some(1000.0));
}

#[test]
fn test_custom_capacity() {
    let config = PerformanceConfig {
        max_samples: 3,
        ..Default::default()
    };
    let h = harness_with(config);
    for i in 0..10 {
        h.monitor.record_response_time("/", "GET", i as f64);
    }
    assert_eq!(h.monitor.response_time_sample_count(), 3);
}

#[test]
fn test_percentiles() {
    let h = harness();
    // Recorded out of order on purpose
    for i in (1..=100).rev() {
        h.monitor.record_response_time("/api/search", "GET", (i * 10) as f64);
    }

    let stats = h.monitor.get_metrics(60_000).response_time;
    assert_eq!(stats.count, 100);
    assert_eq!(stats.min, 10.0);
    assert_eq!(stats.max, 1000.0);
    assert_eq!(stats.average, 505.0);
    assert_eq!(stats.p95, 960.0);
    assert_eq!(stats.p99, 1000.0);
}

#[test]
fn test_error_rate_formula() {
    let h = harness();
    for _ in 0..8 {
        h.monitor.record_request("/api/orders", "POST");
    }
    h.monitor.record_error("/api/orders", "POST", "payment declined");
    h.monitor.record_error("/api/orders", "POST", "payment declined");

    let errors = h.monitor.get_metrics(60_000).error_rate;
    assert_eq!(errors.count, 2);
    assert_eq!(errors.rate, 25.0);
}

#[test]
fn test_error_rate_zero_without_requests() {
    let h = harness();
    h.monitor.record_error("/api/orders", "POST", "orphan");

    let errors = h.monitor.get_metrics(60_000).error_rate;
    assert_eq!(errors.count, 1);
    assert_eq!(errors.rate, 0.0);
}

#[test]
fn test_no_alerts_when_quiet() {
    let h = harness();
    h.monitor.record_request("/", "GET");
    h.monitor.record_response_time("/", "GET", 20.0);
    assert!(h.monitor.check_alerts().is_empty());
}

#[test]
fn test_error_rate_alert_alone() {
    let h = harness();
    for _ in 0..100 {
        h.monitor.record_request("/api/orders", "POST");
    }
    for _ in 0..11 {
        h.monitor.record_error("/api/orders", "POST", "db timeout");
    }

    let alerts = h.monitor.check_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, MetricKind::ErrorRate);
    assert_eq!(alerts[0].level, AlertLevel::Critical);
    assert_eq!(alerts[0].value, 11.0);
    assert_eq!(alerts[0].threshold, 10.0);
}

#[test]
fn test_error_rate_at_threshold_does_not_alert() {
    let h = harness();
    for _ in 0..100 {
        h.monitor.record_request("/api/orders", "POST");
    }
    for _ in 0..10 {
        h.monitor.record_error("/api/orders", "POST", "db timeout");
    }
    assert!(h.monitor.check_alerts().is_empty());
}

#[test]
fn test_p99_alert_alone() {
    let h = harness();
    h.monitor.record_request("/api/reports", "GET");
    h.monitor.record_response_time("/api/reports", "GET", 6000.0);

    let alerts = h.monitor.check_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, MetricKind::ResponseTime);
    assert_eq!(alerts[0].level, AlertLevel::Warning);
}

#[test]
fn test_memory_alert_alone() {
    let h = harness();
    h.memory.set(FixedMemoryProbe::with_usage(95, 100).sample());

    let alerts = h.monitor.check_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, MetricKind::Memory);
    assert_eq!(alerts[0].level, AlertLevel::Critical);
    assert_eq!(alerts[0].value, 95.0);
}

#[test]
fn test_alert_ids_are_unique() {
    let h = harness();
    h.memory.set(FixedMemoryProbe::with_usage(95, 100).sample());
    h.monitor.record_response_time("/", "GET", 9000.0);

    let alerts = h.monitor.check_alerts();
    assert_eq!(alerts.len(), 2);
    assert_ne!(alerts[0].id, alerts[1].id);
}

#[test]
fn test_alert_window_excludes_old_samples() {
    let h = harness();
    for _ in 0..10 {
        h.monitor.record_request("/api/orders", "POST");
        h.monitor.record_error("/api/orders", "POST", "db timeout");
    }
    h.monitor.record_response_time("/api/orders", "POST", 9000.0);
    assert_eq!(h.monitor.check_alerts().len(), 2);

    h.clock.advance(Duration::milliseconds(ALERT_WINDOW_MS + 1));
    assert!(h.monitor.check_alerts().is_empty());
}

#[test]
fn test_health_healthy_by_default() {
    let h = harness();
    let health = h.monitor.health_check();
    assert_eq!(health.status, HealthStatus::Healthy);
    assert!(health.checks.values().all(|c| c.passed));
    assert_eq!(health.checks.len(), 3);
}

#[test]
fn test_health_degraded_on_error_rate() {
    let h = harness();
    for _ in 0..10 {
        h.monitor.record_request("/", "GET");
    }
    h.monitor.record_error("/", "GET", "boom");

    let health = h.monitor.health_check();
    assert_eq!(health.status, HealthStatus::Degraded);
    assert!(!health.checks["error_rate"].passed);
    assert!(health.checks["memory"].passed);
}

#[test]
fn test_health_degraded_on_slow_responses() {
    let h = harness();
    h.monitor.record_response_time("/", "GET", 2500.0);

    let health = h.monitor.health_check();
    assert_eq!(health.status, HealthStatus::Degraded);
    assert!(!health.checks["response_time"].passed);
}

#[test]
fn test_health_degraded_on_memory() {
    let h = harness();
    h.memory.set(FixedMemoryProbe::with_usage(90, 100).sample());

    let health = h.monitor.health_check();
    assert_eq!(health.status, HealthStatus::Degraded);
    assert!(!health.checks["memory"].passed);
}

#[test]
fn test_health_recovers_after_window() {
    let h = harness();
    h.monitor.record_response_time("/", "GET", 2500.0);
    assert_eq!(h.monitor.health_check().status, HealthStatus::Degraded);

    h.clock.advance(Duration::minutes(6));
    assert_eq!(h.monitor.health_check().status, HealthStatus::Healthy);
}

#[test]
fn test_recommendation_targets() {
    let h = harness();
    for _ in 0..10 {
        h.monitor.record_request("/api/search", "GET");
    }
    h.monitor.record_error("/api/search", "GET", "upstream");
    h.monitor.record_response_time("/api/search", "GET", 1200.0);
    for hit in [true, false, false] {
        h.monitor.record_cache_access(hit);
    }

    let recs = h.monitor.get_performance_recommendations();
    assert_eq!(recs.len(), 3);

    let by_kind = |kind: MetricKind| recs.iter().find(|r| r.kind == kind);
    assert_eq!(by_kind(MetricKind::ResponseTime).map(|r| r.target), Some(500.0));
    assert_eq!(by_kind(MetricKind::ErrorRate).map(|r| r.target), Some(1.0));
    assert_eq!(by_kind(MetricKind::CacheHitRate).map(|r| r.target), Some(80.0));
}

#[test]
fn test_no_cache_recommendation_without_accesses() {
    let h = harness();
    let recs = h.monitor.get_performance_recommendations();
    assert!(recs.iter().all(|r| r.kind != MetricKind::CacheHitRate));
}

#[test]
fn test_oversized_windows_do_not_panic() {
    let h = harness();
    h.monitor.record_request("/api/products", "GET");
    h.monitor.record_response_time("/api/products", "GET", 40.0);

    // Past chrono's millisecond limit, and past the earliest representable instant
    for window_ms in [i64::MAX, i64::MAX / 1000, 400_000_000_000_000] {
        let metrics = h.monitor.get_metrics(window_ms);
        assert_eq!(metrics.throughput.total_requests, 1);
        assert_eq!(metrics.response_time.count, 1);
    }
}

#[test]
fn test_uptime_follows_clock() {
    let h = harness();
    h.clock.advance(Duration::seconds(90));
    assert_eq!(h.monitor.get_metrics(60_000).uptime_secs, 90);
}

#[test]
fn test_export_serializes() {
    let h = harness();
    h.monitor.record_request("/api/products", "GET");
    h.monitor.record_response_time("/api/products", "GET", 12.5);

    let export = h.monitor.export_metrics();
    let json = serde_json::to_value(&export).unwrap();
    assert!(json.get("metrics").is_some());
    assert!(json.get("health").is_some());
    assert!(json.get("alerts").is_some());
    assert!(json.get("recommendations").is_some());
}
