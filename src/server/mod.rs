//! Axum-based HTTP surface for the agrocache service.
//!
//! Exposes the cache and performance monitor to health and stats consumers.
//! None of these endpoints serve marketplace data; they only report on the
//! caching and request-handling layer.
//!
//! # Components
//!
//! - `handlers`: Health, metrics, alerts, recommendations and cache stats endpoints.
//! - `middleware`: Request IDs, per-request performance recording with `X-Response-Time`, and
//!   per-client rate limiting.
//! - `routes`: The main router configuration that ties everything together.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod handlers;
mod middleware;
mod routes;

pub use handlers::{ComponentCheck, HealthResponse};
pub use routes::{create_router, AppState};
