//! Configuration data structures for the agrocache service.
//!
//! This module defines the schema for the application settings, including
//! server parameters, the Redis cache connection and TTL policy, and the
//! thresholds used by the performance monitor.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use serde::{Deserialize, Serialize};

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP server settings (host, port, workers).
    #[serde(default)]
    pub server: ServerConfig,

    /// Redis cache connection and TTL settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Performance monitor buffer sizes and thresholds.
    #[serde(default)]
    pub performance: PerformanceConfig,

    /// Per-client request limiting backed by the cache.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the built-in HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The IP address or hostname the server should bind to.
    /// Default: `127.0.0.1`
    #[serde(default = "default_host")]
    pub host: String,

    /// The port number the server should listen on.
    /// Default: `8080`
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of tokio worker threads.
    /// Default: Number of logical CPU cores.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Whether to enable GZIP compression for HTTP responses.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub enable_compression: bool,
}

/// Settings for the Redis-backed cache.
///
/// Caching is optional: when neither `url` nor `host` is set the cache
/// service stays in permanent no-op mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Full connection URL, e.g. `redis://localhost:6379/0`.
    #[serde(default)]
    pub url: Option<String>,

    /// Redis host, used when `url` is not set.
    #[serde(default)]
    pub host: Option<String>,

    /// Redis port, used together with `host`.
    /// Default: `6379`
    #[serde(default = "default_redis_port")]
    pub port: u16,

    /// Password applied to the connection (overrides one embedded in `url`).
    #[serde(default)]
    pub password: Option<String>,

    /// Logical database index.
    /// Default: `0`
    #[serde(default)]
    pub db: i64,

    /// Timeout for establishing the connection, in milliseconds.
    /// Default: `5000`
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Timeout applied to every individual cache command, in milliseconds.
    /// Default: `2000`
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_ms: u64,

    /// Upper bound of the reconnect backoff, in seconds.
    /// Default: `30`
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_interval_secs: u64,

    /// How often the supervisor probes a disconnected store, in seconds.
    /// Default: `5`
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Per-domain TTL policy.
    #[serde(default)]
    pub ttl: TtlConfig,
}

/// Default TTLs (seconds) per cached data class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TtlConfig {
    #[serde(default = "ttl_one_hour")]
    pub product: u64,
    #[serde(default = "ttl_half_hour")]
    pub search_results: u64,
    #[serde(default = "ttl_one_day")]
    pub session: u64,
    #[serde(default = "ttl_two_hours")]
    pub recommendations: u64,
    #[serde(default = "ttl_one_hour")]
    pub popular_products: u64,
    #[serde(default = "ttl_half_hour")]
    pub dynamic_price: u64,
    #[serde(default = "ttl_quarter_hour")]
    pub inventory: u64,
    #[serde(default = "ttl_two_hours")]
    pub supplier_rankings: u64,
}

/// Settings for the in-process performance monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum samples retained per buffer; oldest are evicted first.
    /// Default: `1000`
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    /// Requests slower than this are logged as warnings.
    /// Default: `1000`
    #[serde(default = "default_slow_request")]
    pub slow_request_threshold_ms: f64,

    /// Window used by `get_metrics` when the caller does not supply one.
    /// Default: `3600000` (1 hour)
    #[serde(default = "default_window")]
    pub default_window_ms: i64,

    /// Memory budget used as the denominator of the heap-used percentage.
    /// Falls back to total system memory when unset.
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,

    /// Health, alert and recommendation thresholds.
    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

/// Thresholds for health checks, alerts and recommendations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdConfig {
    #[serde(default = "default_health_error_rate")]
    pub health_error_rate: f64,
    #[serde(default = "default_health_response_time")]
    pub health_response_time_ms: f64,
    #[serde(default = "default_health_memory")]
    pub health_memory_percent: f64,

    #[serde(default = "default_alert_error_rate")]
    pub alert_error_rate: f64,
    #[serde(default = "default_alert_p99")]
    pub alert_p99_ms: f64,
    #[serde(default = "default_alert_memory")]
    pub alert_memory_percent: f64,

    #[serde(default = "default_slow_request")]
    pub recommend_response_time_ms: f64,
    #[serde(default = "default_recommend_error_rate")]
    pub recommend_error_rate: f64,
    #[serde(default = "default_recommend_hit_rate")]
    pub recommend_cache_hit_rate: f64,
}

/// Fixed-window request limiting per client address.
///
/// Counters live in the cache, so the limit is shared by every instance
/// pointing at the same Redis. Without a reachable cache nothing is limited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Default: `true`
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests allowed per client in one window.
    /// Default: `100`
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u64,

    /// Window length in seconds, counted from the client's first request.
    /// Default: `60`
    #[serde(default = "default_rate_window")]
    pub window_secs: u64,

    /// Paths (and everything below them) that are never limited.
    /// Default: `["/health", "/metrics"]`
    #[serde(default = "default_exempt_paths")]
    pub exempt_paths: Vec<String>,
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`, `compact`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl CacheConfig {
    /// Whether enough connection information is present to attempt a connection.
    pub fn is_configured(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
            || self.host.as_deref().is_some_and(|h| !h.trim().is_empty())
    }
}

// Default trait implementations linking to custom logic

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            enable_compression: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: default_redis_port(),
            password: None,
            db: 0,
            connect_timeout_ms: default_connect_timeout(),
            operation_timeout_ms: default_operation_timeout(),
            reconnect_max_interval_secs: default_reconnect_max(),
            probe_interval_secs: default_probe_interval(),
            ttl: TtlConfig::default(),
        }
    }
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            product: ttl_one_hour(),
            search_results: ttl_half_hour(),
            session: ttl_one_day(),
            recommendations: ttl_two_hours(),
            popular_products: ttl_one_hour(),
            dynamic_price: ttl_half_hour(),
            inventory: ttl_quarter_hour(),
            supplier_rankings: ttl_two_hours(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_samples: default_max_samples(),
            slow_request_threshold_ms: default_slow_request(),
            default_window_ms: default_window(),
            memory_limit_mb: None,
            thresholds: ThresholdConfig::default(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            health_error_rate: default_health_error_rate(),
            health_response_time_ms: default_health_response_time(),
            health_memory_percent: default_health_memory(),
            alert_error_rate: default_alert_error_rate(),
            alert_p99_ms: default_alert_p99(),
            alert_memory_percent: default_alert_memory(),
            recommend_response_time_ms: default_slow_request(),
            recommend_error_rate: default_recommend_error_rate(),
            recommend_cache_hit_rate: default_recommend_hit_rate(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_window: default_requests_per_window(),
            window_secs: default_rate_window(),
            exempt_paths: default_exempt_paths(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Helper functions for serde defaults and shared constants
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_true() -> bool {
    true
}

fn default_redis_port() -> u16 {
    6379
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_operation_timeout() -> u64 {
    2000
}

fn default_reconnect_max() -> u64 {
    30
}

fn default_probe_interval() -> u64 {
    5
}

fn ttl_quarter_hour() -> u64 {
    900
}

fn ttl_half_hour() -> u64 {
    1800
}

fn ttl_one_hour() -> u64 {
    3600
}

fn ttl_two_hours() -> u64 {
    7200
}

fn ttl_one_day() -> u64 {
    86400
}

fn default_max_samples() -> usize {
    1000
}

fn default_slow_request() -> f64 {
    1000.0
}

fn default_window() -> i64 {
    3_600_000
}

fn default_health_error_rate() -> f64 {
    5.0
}

fn default_health_response_time() -> f64 {
    2000.0
}

fn default_health_memory() -> f64 {
    85.0
}

fn default_alert_error_rate() -> f64 {
    10.0
}

fn default_alert_p99() -> f64 {
    5000.0
}

fn default_alert_memory() -> f64 {
    90.0
}

fn default_recommend_error_rate() -> f64 {
    2.0
}

fn default_recommend_hit_rate() -> f64 {
    70.0
}

fn default_requests_per_window() -> u64 {
    100
}

fn default_rate_window() -> u64 {
    60
}

fn default_exempt_paths() -> Vec<String> {
    vec!["/health".to_string(), "/metrics".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
