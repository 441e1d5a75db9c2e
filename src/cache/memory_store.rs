// In-memory cache store with TTL support
// Author: kelexine (https://github.com/kelexine)

use crate::cache::keys::compile_glob;
use crate::cache::store::CacheStore;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Process-local store for tests and single-node development.
///
/// Can be switched offline to simulate an unreachable backend.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail (or succeed again)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::Store("memory store is offline".to_string()));
        }
        Ok(())
    }

    /// A TTL too large to represent never expires
    fn expiry(ttl_secs: Option<u64>) -> Option<Instant> {
        ttl_secs.and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs)))
    }

    /// Drop expired entries
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_online()?;
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()> {
        self.check_online()?;
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Self::expiry(ttl_secs),
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        self.check_online()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = entries.remove(key) {
                if entry.is_live(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        self.check_online()?;
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .map(|k| entries.get(k).filter(|e| e.is_live(now)).map(|e| e.value.clone()))
            .collect())
    }

    async fn mset(&self, items: &[(String, String)], ttl_secs: Option<u64>) -> Result<()> {
        self.check_online()?;
        let expires_at = Self::expiry(ttl_secs);
        // Single write guard: readers never observe a partial batch
        let mut entries = self.entries.write().await;
        for (key, value) in items {
            entries.insert(
                key.clone(),
                Entry {
                    value: value.clone(),
                    expires_at,
                },
            );
        }
        Ok(())
    }

    async fn incr(&self, key: &str, ttl_secs: Option<u64>) -> Result<u64> {
        self.check_online()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let current = match entries.get(key).filter(|e| e.is_live(now)) {
            Some(entry) => Some(
                entry
                    .value
                    .parse::<u64>()
                    .map_err(|_| AppError::InvalidRequest(format!("{} does not hold an integer", key)))?,
            ),
            None => None,
        };

        let (count, expires_at) = match current {
            Some(count) => (count + 1, entries.get(key).and_then(|e| e.expires_at)),
            None => (1, Self::expiry(ttl_secs)),
        };
        entries.insert(
            key.to_string(),
            Entry {
                value: count.to_string(),
                expires_at,
            },
        );
        Ok(count)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        self.check_online()?;
        let matcher = compile_glob(pattern)?;
        let now = Instant::now();
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(k, e)| e.is_live(now) && matcher.is_match(k))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> Result<()> {
        self.check_online()
    }

    async fn key_count(&self) -> Result<u64> {
        self.check_online()?;
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries.values().filter(|e| e.is_live(now)).count() as u64)
    }

    async fn info(&self) -> Result<String> {
        let keys = self.key_count().await?;
        Ok(format!(
            "# Server\r\nredis_mode:memory\r\nagrocache_version:{}\r\n\r\n# Keyspace\r\nkeys:{}\r\n",
            env!("CARGO_PKG_VERSION"),
            keys
        ))
    }
}
