// Cache module - fail-open Redis cache with namespaced keys and TTL policies
// Author: kelexine (https://github.com/kelexine)

pub mod connection;
pub mod keys;
pub mod memory_store;
pub mod models;
pub mod rate_limit;
pub mod redis_store;
pub mod service;
pub mod store;

pub use crate::config::{CacheConfig, TtlConfig};
pub use connection::{ConnectionEvent, ConnectionState};
pub use keys::{key_for, CachePolicy};
pub use memory_store::MemoryStore;
pub use models::{CacheHealth, CacheStats, Lookup};
pub use rate_limit::{RateDecision, RateLimiter};
pub use redis_store::RedisStore;
pub use service::CacheService;
pub use store::CacheStore;
