// Fixed-window rate limiting on top of the cache
// Author: kelexine (https://github.com/kelexine)

use crate::cache::keys::key_for;
use crate::cache::service::CacheService;
use crate::config::RateLimitConfig;
use std::sync::Arc;
use tracing::warn;

/// Key domain for per-client counters
pub const RATE_LIMIT_DOMAIN: &str = "rate_limit";

/// Outcome of one admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Not counted: path exempt, limiter disabled, or cache unreachable
    Bypassed,
    Allowed { limit: u64, remaining: u64 },
    Limited { limit: u64, retry_after_secs: u64 },
}

/// Per-client request counter with a window that starts at the first request.
///
/// Fails open like the cache it sits on: no reachable store, no limiting.
pub struct RateLimiter {
    cache: Arc<CacheService>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(cache: Arc<CacheService>, config: RateLimitConfig) -> Self {
        Self { cache, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn key(client: &str) -> String {
        key_for(RATE_LIMIT_DOMAIN, client, None)
    }

    /// `/health` exempts `/health` and `/health/...`, not `/healthz`
    pub fn is_exempt(&self, path: &str) -> bool {
        self.config.exempt_paths.iter().any(|exempt| {
            let exempt = exempt.trim_end_matches('/');
            path == exempt || path.strip_prefix(exempt).is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Count one request from `client` against `path`.
    pub async fn check(&self, client: &str, path: &str) -> RateDecision {
        if !self.config.enabled || self.is_exempt(path) {
            return RateDecision::Bypassed;
        }

        let limit = self.config.requests_per_window;
        let Some(count) = self.cache.increment(&Self::key(client), self.config.window_secs).await else {
            return RateDecision::Bypassed;
        };

        if count > limit {
            warn!(client = client, count = count, "Rate limit exceeded for {}", client);
            RateDecision::Limited {
                limit,
                retry_after_secs: self.config.window_secs,
            }
        } else {
            RateDecision::Allowed {
                limit,
                remaining: limit - count,
            }
        }
    }
}
