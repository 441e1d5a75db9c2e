// HTTP middleware
// Author: kelexine (https://github.com/kelexine)

use super::routes::AppState;
use crate::cache::RateDecision;
use crate::error::AppError;
use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::time::Instant;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Create request ID layers for the application
pub fn request_id_layers() -> (SetRequestIdLayer<MakeRequestUuid>, PropagateRequestIdLayer) {
    (
        SetRequestIdLayer::x_request_id(MakeRequestUuid),
        PropagateRequestIdLayer::x_request_id(),
    )
}

pub const RESPONSE_TIME_HEADER: &str = "x-response-time";
pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Feed every routed request into the performance monitor and stamp the
/// handling time on the response as `X-Response-Time: 0.0123s`.
///
/// Requests are keyed by the matched route template (`/metrics`, not the raw
/// URI) so the error breakdown stays bounded. Server errors count as failures.
pub async fn track_performance(
    State(state): State<AppState>,
    matched: Option<MatchedPath>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let route = matched
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let started = Instant::now();
    let mut response = next.run(request).await;
    let elapsed = started.elapsed().as_secs_f64();
    let elapsed_ms = elapsed * 1000.0;

    if let Ok(value) = HeaderValue::from_str(&format!("{:.4}s", elapsed)) {
        response.headers_mut().insert(RESPONSE_TIME_HEADER, value);
    }

    let monitor = &state.monitor;
    monitor.record_request(&route, &method);
    monitor.record_response_time(&route, &method, elapsed_ms);
    if response.status().is_server_error() {
        monitor.record_error(&route, &method, response.status());
    }

    response
}

/// Reject clients over their per-window budget with 429.
///
/// Clients are identified by peer address; when the server was not started
/// with connect info every request shares the `unknown` bucket.
pub async fn rate_limit(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    matched: Option<MatchedPath>,
    request: Request,
    next: Next,
) -> Response {
    let client = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let path = request.uri().path().to_string();

    let decision = state.limiter.check(&client, &path).await;
    match decision {
        RateDecision::Bypassed => next.run(request).await,
        RateDecision::Allowed { limit, remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(limit));
            headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(remaining));
            response
        }
        RateDecision::Limited { limit, retry_after_secs } => {
            let route = matched.map(|m| m.as_str().to_string()).unwrap_or(path);
            state
                .monitor
                .record_rate_limited(&route, request.method().as_str());

            let mut response = AppError::RateLimited { retry_after_secs }.into_response();
            let headers = response.headers_mut();
            headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(limit));
            headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(0u64));
            response
        }
    }
}
