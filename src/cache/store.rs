// Cache store abstraction
// Author: kelexine (https://github.com/kelexine)
//
// Stores deal in raw JSON strings. Serialization, fail-open behaviour and
// connection tracking live one level up in `CacheService`.

use crate::error::Result;
use async_trait::async_trait;

/// Backend for the cache service.
///
/// Every method is fallible; errors are interpreted by the service as
/// "store unavailable" and never reach its callers.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Human-readable backend name for logs and stats
    fn name(&self) -> &'static str;

    /// Fetch a raw payload; `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a payload, replacing any previous value and TTL
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()>;

    /// Delete keys, returning how many existed
    async fn del(&self, keys: &[String]) -> Result<u64>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Fetch several payloads, preserving input order
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Store all entries atomically
    async fn mset(&self, entries: &[(String, String)], ttl_secs: Option<u64>) -> Result<()>;

    /// Atomically increment an integer counter, creating it at 1. The
    /// expiry is set only when the counter is created, so a window is never
    /// extended by later hits.
    async fn incr(&self, key: &str, ttl_secs: Option<u64>) -> Result<u64>;

    /// Keys matching a Redis-style glob pattern
    async fn scan(&self, pattern: &str) -> Result<Vec<String>>;

    /// Lightweight liveness probe
    async fn ping(&self) -> Result<()>;

    /// Number of keys in the selected database
    async fn key_count(&self) -> Result<u64>;

    /// Raw `INFO`-style text (`key:value` lines, `#` section headers)
    async fn info(&self) -> Result<String>;
}
