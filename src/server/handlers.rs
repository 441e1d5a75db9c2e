// HTTP request handlers
// Author: kelexine (https://github.com/kelexine)

use super::routes::AppState;
use crate::cache::{CacheHealth, CacheStats};
use crate::error::AppError;
use crate::metrics::{Alert, HealthStatus, MetricsExport, PerformanceHealth, PerformanceMetrics, Recommendation};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HashMap<String, ComponentCheck>,
    pub cache: CacheHealth,
    pub performance: PerformanceHealth,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub window_ms: Option<i64>,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut checks = HashMap::new();
    let mut overall_status = HealthStatus::Healthy;

    // Cache is optional: disabled is fine, configured-but-down is degraded
    let cache = state.cache.health_check().await;
    let cache_check = match (&cache, state.cache.is_enabled()) {
        (CacheHealth::Healthy { latency_ms }, _) => ComponentCheck {
            status: "ok".to_string(),
            message: format!("PING answered in {:.2}ms", latency_ms),
        },
        (CacheHealth::Disconnected, false) => ComponentCheck {
            status: "disabled".to_string(),
            message: "Caching is not configured".to_string(),
        },
        (CacheHealth::Disconnected, true) => {
            overall_status = HealthStatus::Degraded;
            ComponentCheck {
                status: "warning".to_string(),
                message: "Cache store is disconnected; serving without cache".to_string(),
            }
        }
        (CacheHealth::Unhealthy { error }, _) => {
            overall_status = HealthStatus::Degraded;
            ComponentCheck {
                status: "warning".to_string(),
                message: format!("Cache store error: {}", error),
            }
        }
    };
    checks.insert("cache".to_string(), cache_check);

    let performance = state.monitor.health_check();
    let performance_check = if performance.status == HealthStatus::Healthy {
        ComponentCheck {
            status: "ok".to_string(),
            message: "Error rate, latency and memory within limits".to_string(),
        }
    } else {
        overall_status = HealthStatus::Degraded;
        let failing: Vec<&str> = performance
            .checks
            .iter()
            .filter(|(_, c)| !c.passed)
            .map(|(name, _)| name.as_str())
            .collect();
        ComponentCheck {
            status: "warning".to_string(),
            message: format!("Thresholds exceeded: {}", failing.join(", ")),
        }
    };
    checks.insert("performance".to_string(), performance_check);

    Json(HealthResponse {
        status: overall_status,
        checks,
        cache,
        performance,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Windowed performance metrics; defaults to the configured window
pub async fn metrics_handler(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<PerformanceMetrics>, AppError> {
    let window_ms = query
        .window_ms
        .unwrap_or(state.config.performance.default_window_ms);
    if window_ms <= 0 {
        return Err(AppError::InvalidRequest("window_ms must be positive".to_string()));
    }
    Ok(Json(state.monitor.get_metrics(window_ms)))
}

pub async fn export_handler(State(state): State<AppState>) -> Json<MetricsExport> {
    Json(state.monitor.export_metrics())
}

pub async fn alerts_handler(State(state): State<AppState>) -> Json<Vec<Alert>> {
    Json(state.monitor.check_alerts())
}

pub async fn recommendations_handler(State(state): State<AppState>) -> Json<Vec<Recommendation>> {
    Json(state.monitor.get_performance_recommendations())
}

pub async fn prometheus_handler(State(state): State<AppState>) -> Result<Response, AppError> {
    let body = state.monitor.export_prometheus()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response())
}

pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.get_stats().await)
}
