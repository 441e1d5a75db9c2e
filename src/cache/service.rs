// Cache service - fail-open caching over a pluggable store
// Author: kelexine (https://github.com/kelexine)

use crate::cache::connection::{ConnectionEvent, ConnectionState};
use crate::cache::keys::{self, CachePolicy};
use crate::cache::models::{parse_info, CacheHealth, CacheStats, Lookup};
use crate::cache::redis_store::RedisStore;
use crate::cache::store::CacheStore;
use crate::config::CacheConfig;
use crate::error::{AppError, Result};
use crate::metrics::PerformanceMonitor;
use crate::utils::logging::redact_url;
use crate::utils::retry::ReconnectSchedule;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// State shared between the service and its background supervisor
struct Shared {
    store: RwLock<Option<Arc<dyn CacheStore>>>,
    state: ConnectionState,
    operation_timeout_ms: u64,
}

impl Shared {
    fn current_store(&self) -> Option<Arc<dyn CacheStore>> {
        self.store.read().clone()
    }

    /// Run a store call under the operation timeout.
    ///
    /// Only connection-level failures flip the shared state; a command the
    /// server rejects for one key leaves every other key usable.
    async fn guarded<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout_ms = self.operation_timeout_ms;
        let outcome = match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(timeout_ms)),
        };

        if let Err(e) = &outcome {
            if e.is_connection_error() {
                debug!("Cache {} failed: {}", op, e);
                self.state.handle(ConnectionEvent::Error(e.to_string()));
            } else {
                warn!("Cache {} rejected: {}", op, e);
            }
        }
        outcome
    }

    /// Ping the store regardless of the current flag and record the outcome
    async fn probe(&self, store: &Arc<dyn CacheStore>) -> bool {
        let ok = self.guarded("ping", store.ping()).await.is_ok();
        if ok {
            self.state.handle(ConnectionEvent::Ready);
        }
        ok
    }
}

/// Best-effort key/value cache.
///
/// Every public method fails open: when the store is missing, unreachable or
/// returns garbage, reads behave like misses and writes report `false`.
/// Callers never branch on cache availability.
pub struct CacheService {
    config: CacheConfig,
    shared: Arc<Shared>,
    monitor: Option<Arc<PerformanceMonitor>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl CacheService {
    /// Create a service for the configured Redis server.
    ///
    /// Nothing connects until [`CacheService::start`] is called.
    pub fn new(config: CacheConfig) -> Self {
        let shared = Arc::new(Shared {
            store: RwLock::new(None),
            state: ConnectionState::new(),
            operation_timeout_ms: config.operation_timeout_ms,
        });

        Self {
            config,
            shared,
            monitor: None,
            supervisor: Mutex::new(None),
        }
    }

    /// Create a service over an already-constructed store, marked connected.
    pub fn with_store(config: CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        let service = Self::new(config);
        debug!("Using injected {} cache store", store.name());
        *service.shared.store.write() = Some(store);
        service.handle_event(ConnectionEvent::Connect);
        service.handle_event(ConnectionEvent::Ready);
        service
    }

    /// Report cache hits and misses to a performance monitor
    pub fn with_monitor(mut self, monitor: Arc<PerformanceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether caching can ever become active
    pub fn is_enabled(&self) -> bool {
        self.config.is_configured() || self.shared.current_store().is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.is_connected()
    }

    /// Feed a connection lifecycle event into the state tracker
    pub fn handle_event(&self, event: ConnectionEvent) -> bool {
        self.shared.state.handle(event)
    }

    /// Spawn the background supervisor that connects and re-probes the store.
    ///
    /// Without connection settings (and no injected store) this only logs
    /// that caching is disabled; the service stays a permanent no-op.
    pub fn start(&self) {
        if !self.is_enabled() {
            info!("Redis not configured, caching disabled");
            return;
        }

        let mut supervisor = self.supervisor.lock();
        if supervisor.is_some() {
            return;
        }

        if let Some(url) = &self.config.url {
            info!("Connecting to Redis at {}", redact_url(url));
        } else if let Some(host) = &self.config.host {
            info!("Connecting to Redis at {}:{}", host, self.config.port);
        }

        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        *supervisor = Some(tokio::spawn(supervise(shared, config)));
    }

    /// Stop the supervisor and mark the store as gone
    pub fn shutdown(&self) {
        if let Some(handle) = self.supervisor.lock().take() {
            handle.abort();
        }
        self.handle_event(ConnectionEvent::End);
    }

    /// Probe the store now; on success the service is marked connected again
    pub async fn probe(&self) -> bool {
        match self.shared.current_store() {
            Some(store) => self.shared.probe(&store).await,
            None => false,
        }
    }

    fn available_store(&self) -> Option<Arc<dyn CacheStore>> {
        if !self.shared.state.is_connected() {
            return None;
        }
        self.shared.current_store()
    }

    fn record_access(&self, hit: bool) {
        if let Some(monitor) = &self.monitor {
            monitor.record_cache_access(hit);
        }
    }

    fn ttl_for(&self, policy: CachePolicy) -> Option<u64> {
        Some(policy.ttl(&self.config.ttl))
    }

    /// A zero TTL means "no expiry"; Redis rejects `SET ... EX 0`
    fn effective_ttl(ttl_secs: Option<u64>) -> Option<u64> {
        ttl_secs.filter(|&secs| secs > 0)
    }

    // ========================================================================
    // Core operations
    // ========================================================================

    /// Three-way read distinguishing a miss from an unavailable store.
    ///
    /// Malformed payloads and per-key command errors are reported as misses.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        let Some(store) = self.available_store() else {
            return Lookup::Unavailable;
        };
        let raw = match self.shared.guarded("get", store.get(key)).await {
            Ok(raw) => raw,
            Err(e) if e.is_connection_error() => return Lookup::Unavailable,
            Err(_) => return Lookup::Miss,
        };

        match raw {
            None => Lookup::Miss,
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Lookup::Hit(value),
                Err(e) => {
                    warn!("Discarding malformed cache entry {}: {}", key, e);
                    Lookup::Miss
                }
            },
        }
    }

    /// Read and deserialize a value; `None` on miss, bad payload or outage
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let lookup = self.lookup(key).await;
        self.record_access(lookup.is_hit());
        lookup.into_option()
    }

    /// Serialize and store a value, optionally expiring after `ttl_secs`.
    /// `Some(0)` stores without expiry.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: Option<u64>) -> bool {
        let Some(store) = self.available_store() else {
            return false;
        };
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize cache value for {}: {}", key, e);
                return false;
            }
        };

        self.shared
            .guarded("set", store.set(key, &payload, Self::effective_ttl(ttl_secs)))
            .await
            .is_ok()
    }

    /// Delete a key. `true` means the delete was carried out, whether or not
    /// the key existed; `false` means the store could not be reached.
    pub async fn del(&self, key: &str) -> bool {
        let Some(store) = self.available_store() else {
            return false;
        };
        let keys = [key.to_string()];
        self.shared.guarded("del", store.del(&keys)).await.is_ok()
    }

    pub async fn exists(&self, key: &str) -> bool {
        let Some(store) = self.available_store() else {
            return false;
        };
        self.shared
            .guarded("exists", store.exists(key))
            .await
            .unwrap_or(false)
    }

    /// Read several values in input order. An outage yields all `None`;
    /// a malformed entry only blanks its own slot.
    pub async fn mget<T: DeserializeOwned>(&self, keys: &[String]) -> Vec<Option<T>> {
        let raw = match self.available_store() {
            Some(store) => self.shared.guarded("mget", store.mget(keys)).await.ok(),
            None => None,
        };

        let values: Vec<Option<T>> = match raw {
            Some(raw) => keys
                .iter()
                .zip(raw)
                .map(|(key, slot)| {
                    slot.and_then(|payload| match serde_json::from_str(&payload) {
                        Ok(value) => Some(value),
                        Err(e) => {
                            warn!("Discarding malformed cache entry {}: {}", key, e);
                            None
                        }
                    })
                })
                .collect(),
            None => keys.iter().map(|_| None).collect(),
        };

        for value in &values {
            self.record_access(value.is_some());
        }
        values
    }

    /// Store every pair in one atomic batch. Nothing is written if any
    /// value fails to serialize.
    pub async fn mset<T: Serialize>(&self, entries: &[(String, T)], ttl_secs: Option<u64>) -> bool {
        let Some(store) = self.available_store() else {
            return false;
        };

        let mut payloads = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match serde_json::to_string(value) {
                Ok(payload) => payloads.push((key.clone(), payload)),
                Err(e) => {
                    warn!("Failed to serialize cache value for {}: {}", key, e);
                    return false;
                }
            }
        }

        self.shared
            .guarded("mset", store.mset(&payloads, Self::effective_ttl(ttl_secs)))
            .await
            .is_ok()
    }

    /// Atomically bump a counter, starting its expiry window on first use.
    /// `None` when the store is unavailable.
    pub async fn increment(&self, key: &str, window_secs: u64) -> Option<u64> {
        let store = self.available_store()?;
        self.shared
            .guarded("incr", store.incr(key, Self::effective_ttl(Some(window_secs))))
            .await
            .ok()
    }

    /// Cache-aside helper: return the cached value or load, store and return it.
    ///
    /// Loader errors are returned as-is; cache failures are invisible.
    pub async fn get_or_load<T, E, F, Fut>(&self, key: &str, ttl_secs: Option<u64>, loader: F) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }
        let value = loader().await?;
        self.set(key, &value, ttl_secs).await;
        Ok(value)
    }

    // ========================================================================
    // Invalidation
    // ========================================================================

    /// Delete every key matching a glob pattern; returns how many were removed
    pub async fn invalidate_pattern(&self, pattern: &str) -> u64 {
        let Some(store) = self.available_store() else {
            return 0;
        };
        let Ok(matched) = self.shared.guarded("scan", store.scan(pattern)).await else {
            return 0;
        };
        if matched.is_empty() {
            return 0;
        }
        self.shared
            .guarded("del", store.del(&matched))
            .await
            .unwrap_or(0)
    }

    /// Drop a product together with its price and inventory entries and any
    /// cached search results that mention it.
    pub async fn invalidate_product_cache(&self, product_id: &str) -> bool {
        let Some(store) = self.available_store() else {
            return false;
        };
        let related = [
            keys::product(product_id),
            keys::dynamic_price(product_id),
            keys::inventory(product_id),
        ];
        let Ok(removed) = self.shared.guarded("del", store.del(&related)).await else {
            return false;
        };

        let searches = self
            .invalidate_pattern(&keys::search_pattern_for_product(product_id))
            .await;
        debug!(
            "Invalidated product {}: {} direct keys, {} search entries",
            product_id, removed, searches
        );
        true
    }

    /// Drop a user's recommendations and session
    pub async fn invalidate_user_cache(&self, user_id: &str) -> bool {
        let Some(store) = self.available_store() else {
            return false;
        };
        let related = [keys::recommendations(user_id), keys::session(user_id)];
        self.shared.guarded("del", store.del(&related)).await.is_ok()
    }

    // ========================================================================
    // Domain helpers
    // ========================================================================

    pub async fn cache_product<T: Serialize>(&self, product_id: &str, product: &T) -> bool {
        self.set(&keys::product(product_id), product, self.ttl_for(CachePolicy::Product))
            .await
    }

    pub async fn get_product<T: DeserializeOwned>(&self, product_id: &str) -> Option<T> {
        self.get(&keys::product(product_id)).await
    }

    pub async fn cache_search_results<Q: Serialize + ?Sized, T: Serialize>(&self, query: &Q, results: &T) -> bool {
        match keys::search_results(query) {
            Ok(key) => {
                self.set(&key, results, self.ttl_for(CachePolicy::SearchResults))
                    .await
            }
            Err(e) => {
                warn!("Failed to build search cache key: {}", e);
                false
            }
        }
    }

    pub async fn get_search_results<Q: Serialize + ?Sized, T: DeserializeOwned>(&self, query: &Q) -> Option<T> {
        match keys::search_results(query) {
            Ok(key) => self.get(&key).await,
            Err(e) => {
                warn!("Failed to build search cache key: {}", e);
                None
            }
        }
    }

    pub async fn cache_session<T: Serialize>(&self, session_id: &str, data: &T) -> bool {
        self.set(&keys::session(session_id), data, self.ttl_for(CachePolicy::Session))
            .await
    }

    pub async fn get_session<T: DeserializeOwned>(&self, session_id: &str) -> Option<T> {
        self.get(&keys::session(session_id)).await
    }

    pub async fn delete_session(&self, session_id: &str) -> bool {
        self.del(&keys::session(session_id)).await
    }

    pub async fn cache_recommendations<T: Serialize>(&self, user_id: &str, recommendations: &T) -> bool {
        self.set(
            &keys::recommendations(user_id),
            recommendations,
            self.ttl_for(CachePolicy::Recommendations),
        )
        .await
    }

    pub async fn get_recommendations<T: DeserializeOwned>(&self, user_id: &str) -> Option<T> {
        self.get(&keys::recommendations(user_id)).await
    }

    pub async fn cache_popular_products<T: Serialize>(&self, category: Option<&str>, products: &T) -> bool {
        self.set(
            &keys::popular_products(category),
            products,
            self.ttl_for(CachePolicy::PopularProducts),
        )
        .await
    }

    pub async fn get_popular_products<T: DeserializeOwned>(&self, category: Option<&str>) -> Option<T> {
        self.get(&keys::popular_products(category)).await
    }

    pub async fn cache_dynamic_price<T: Serialize>(&self, product_id: &str, price: &T) -> bool {
        self.set(
            &keys::dynamic_price(product_id),
            price,
            self.ttl_for(CachePolicy::DynamicPrice),
        )
        .await
    }

    pub async fn get_dynamic_price<T: DeserializeOwned>(&self, product_id: &str) -> Option<T> {
        self.get(&keys::dynamic_price(product_id)).await
    }

    pub async fn cache_inventory<T: Serialize>(&self, product_id: &str, inventory: &T) -> bool {
        self.set(&keys::inventory(product_id), inventory, self.ttl_for(CachePolicy::Inventory))
            .await
    }

    pub async fn get_inventory<T: DeserializeOwned>(&self, product_id: &str) -> Option<T> {
        self.get(&keys::inventory(product_id)).await
    }

    pub async fn cache_supplier_rankings<T: Serialize>(&self, category: Option<&str>, rankings: &T) -> bool {
        self.set(
            &keys::supplier_rankings(category),
            rankings,
            self.ttl_for(CachePolicy::SupplierRankings),
        )
        .await
    }

    pub async fn get_supplier_rankings<T: DeserializeOwned>(&self, category: Option<&str>) -> Option<T> {
        self.get(&keys::supplier_rankings(category)).await
    }

    // ========================================================================
    // Health and stats
    // ========================================================================

    /// Probe the store with `PING`
    pub async fn health_check(&self) -> CacheHealth {
        let Some(store) = self.available_store() else {
            return CacheHealth::Disconnected;
        };

        let started = Instant::now();
        match self.shared.guarded("ping", store.ping()).await {
            Ok(()) => CacheHealth::Healthy {
                latency_ms: (started.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0,
            },
            Err(e) => CacheHealth::Unhealthy { error: e.to_string() },
        }
    }

    /// Connection state, key count and parsed server info
    pub async fn get_stats(&self) -> CacheStats {
        let backend = self.shared.current_store().map(|s| s.name().to_string());
        let Some(store) = self.available_store() else {
            return CacheStats {
                backend,
                ..Default::default()
            };
        };

        let key_count = self.shared.guarded("dbsize", store.key_count()).await.ok();
        let info = self.shared.guarded("info", store.info()).await.ok();

        match (key_count, info) {
            (Some(key_count), Some(info)) => CacheStats {
                connected: true,
                backend,
                key_count,
                server_info: parse_info(&info),
            },
            _ => CacheStats {
                backend,
                ..Default::default()
            },
        }
    }
}

impl Drop for CacheService {
    fn drop(&mut self) {
        if let Some(handle) = self.supervisor.get_mut().take() {
            handle.abort();
        }
    }
}

/// Background loop: connect with backoff, then re-probe while disconnected.
async fn supervise(shared: Arc<Shared>, config: CacheConfig) {
    let mut schedule = ReconnectSchedule::new(Duration::from_secs(config.reconnect_max_interval_secs.max(1)));
    let probe_interval = Duration::from_secs(config.probe_interval_secs.max(1));

    loop {
        match shared.current_store() {
            None => {
                shared.state.handle(ConnectionEvent::Connect);
                match RedisStore::connect(&config).await {
                    Ok(redis) => {
                        info!("Redis cache ready at {}", redis.address());
                        *shared.store.write() = Some(Arc::new(redis));
                        shared.state.handle(ConnectionEvent::Ready);
                        schedule.reset();
                    }
                    Err(e) => {
                        shared.state.handle(ConnectionEvent::Error(e.to_string()));
                        let delay = schedule.next_delay();
                        debug!(
                            "Redis connect attempt {} failed, retrying in {}ms",
                            schedule.attempts(),
                            delay.as_millis()
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                }
            }
            Some(store) if !shared.state.is_connected() => {
                if shared.probe(&store).await {
                    schedule.reset();
                } else {
                    tokio::time::sleep(schedule.next_delay()).await;
                    continue;
                }
            }
            Some(_) => {}
        }

        tokio::time::sleep(probe_interval).await;
    }
}
