// Metrics module - in-process performance monitoring
// Author: kelexine (https://github.com/kelexine)

pub mod buffer;
pub mod clock;
pub mod memory;
pub mod models;
pub mod monitor;
mod registry;

pub use buffer::{SampleBuffer, Timestamped};
pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::{FixedMemoryProbe, MemoryProbe, MemorySample, MemoryUsage, ProcessMemoryProbe};
pub use models::{
    Alert, AlertLevel, CacheHitStats, ErrorRateStats, HealthCheck, HealthStatus, MetricKind, MetricsExport,
    PerformanceHealth, PerformanceMetrics, Priority, Recommendation, ResponseTimeStats, ThroughputStats,
};
pub use monitor::{percentile, PerformanceMonitor, ALERT_WINDOW_MS, HEALTH_WINDOW_MS, RECOMMENDATION_WINDOW_MS};
pub use registry::MetricsRegistry;
