// HTTP routes configuration
// Author: kelexine (https://github.com/kelexine)

use super::handlers::{
    alerts_handler, cache_stats_handler, export_handler, health_handler, metrics_handler, prometheus_handler,
    recommendations_handler,
};
use super::middleware::{rate_limit, request_id_layers, track_performance};
use crate::cache::{CacheService, RateLimiter};
use crate::config::AppConfig;
use crate::error::Result;
use crate::metrics::PerformanceMonitor;
use axum::http::Method;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub cache: Arc<CacheService>,
    pub monitor: Arc<PerformanceMonitor>,
    pub limiter: Arc<RateLimiter>,
}

pub fn create_router(
    config: AppConfig,
    cache: Arc<CacheService>,
    monitor: Arc<PerformanceMonitor>,
) -> Result<Router> {
    let enable_compression = config.server.enable_compression;
    let limiter = Arc::new(RateLimiter::new(cache.clone(), config.rate_limit.clone()));
    let state = AppState {
        config,
        cache,
        monitor,
        limiter,
    };

    let (set_request_id, propagate_request_id) = request_id_layers();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/metrics/export", get(export_handler))
        .route("/metrics/alerts", get(alerts_handler))
        .route("/metrics/recommendations", get(recommendations_handler))
        .route("/metrics/prometheus", get(prometheus_handler))
        .route("/cache/stats", get(cache_stats_handler))
        // route_layer so the matched path template is available
        .route_layer(middleware::from_fn_with_state(state.clone(), track_performance))
        // Outside the tracker: rejected requests are not timed
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(propagate_request_id)
        .layer(set_request_id)
        .with_state(state);

    let app = if enable_compression {
        app.layer(CompressionLayer::new())
    } else {
        app
    };

    Ok(app)
}
