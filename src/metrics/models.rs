//! Metric samples and the report structures returned to health/stats consumers.

// Author: kelexine (https://github.com/kelexine)

use crate::metrics::buffer::Timestamped;
use crate::metrics::memory::MemoryUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ============================================================================
// SAMPLES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseTimeSample {
    pub route: String,
    pub method: String,
    pub duration_ms: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorSample {
    pub route: String,
    pub method: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSample {
    pub route: String,
    pub method: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheAccessSample {
    pub hit: bool,
    pub timestamp: DateTime<Utc>,
}

impl Timestamped for ResponseTimeSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for ErrorSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for RequestSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for CacheAccessSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

// ============================================================================
// WINDOWED STATISTICS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
    pub p99: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorRateStats {
    pub count: usize,
    /// Percentage of requests in the window that failed
    pub rate: f64,
    /// Error counts keyed by `"{METHOD} {route}"`
    pub breakdown: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThroughputStats {
    pub requests_per_minute: f64,
    pub requests_per_second: f64,
    pub total_requests: usize,
    pub peak_minute: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheHitStats {
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub timestamp: DateTime<Utc>,
    pub window_ms: i64,
    pub uptime_secs: i64,
    pub response_time: ResponseTimeStats,
    pub error_rate: ErrorRateStats,
    pub throughput: ThroughputStats,
    pub cache_hit_rate: CacheHitStats,
    pub memory: MemoryUsage,
}

// ============================================================================
// HEALTH
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

/// One threshold comparison inside a health report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub passed: bool,
    pub value: f64,
    pub threshold: f64,
}

impl HealthCheck {
    /// Passes when `value` is strictly below `threshold`
    pub fn below(value: f64, threshold: f64) -> Self {
        Self {
            passed: value < threshold,
            value,
            threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceHealth {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub checks: BTreeMap<String, HealthCheck>,
    pub metrics: PerformanceMetrics,
}

// ============================================================================
// RECOMMENDATIONS AND ALERTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    ResponseTime,
    ErrorRate,
    CacheHitRate,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: MetricKind,
    pub priority: Priority,
    pub message: String,
    pub current: f64,
    pub target: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub level: AlertLevel,
    pub kind: MetricKind,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
}

/// Everything a stats consumer needs in one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsExport {
    pub timestamp: DateTime<Utc>,
    pub metrics: PerformanceMetrics,
    pub health: PerformanceHealth,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<Recommendation>,
}
