// Error types for the agrocache service
// Author: kelexine (https://github.com/kelexine)

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache store error: {0}")]
    Store(String),

    #[error("Cache store not connected")]
    NotConnected,

    #[error("Cache operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited { retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the error means the store itself is unreachable, as opposed
    /// to the server rejecting one command (`WRONGTYPE`, bad argument).
    pub fn is_connection_error(&self) -> bool {
        match self {
            AppError::Store(_) | AppError::NotConnected | AppError::Timeout(_) | AppError::Io(_) => true,
            AppError::Redis(e) => {
                e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
            }
            _ => false,
        }
    }
}

// Convert AppError to HTTP responses for Axum
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
            AppError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limit_error"),
            AppError::Config(_) | AppError::ConfigParsing(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error")
            }
            AppError::Store(_) | AppError::NotConnected | AppError::Timeout(_) | AppError::Redis(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "cache_unavailable")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let mut body = json!({
            "success": false,
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        });

        if let AppError::RateLimited { retry_after_secs } = &self {
            body["retry_after"] = json!(retry_after_secs);
            return (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                axum::Json(body),
            )
                .into_response();
        }

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
