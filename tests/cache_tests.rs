// Cache service behaviour through the public API
// Author: kelexine (https://github.com/kelexine)

use agrocache::cache::{
    keys, CacheConfig, CacheHealth, CacheService, CacheStore, ConnectionEvent, Lookup, MemoryStore,
};
use agrocache::config::PerformanceConfig;
use agrocache::error::{AppError, Result};
use agrocache::metrics::{FixedMemoryProbe, ManualClock, PerformanceMonitor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Product {
    id: String,
    name: String,
    price_per_kg: f64,
    tags: Vec<String>,
}

fn product(id: &str) -> Product {
    Product {
        id: id.to_string(),
        name: "Basmati rice".to_string(),
        price_per_kg: 92.5,
        tags: vec!["grain".to_string(), "organic".to_string()],
    }
}

fn connected() -> (CacheService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let service = CacheService::with_store(CacheConfig::default(), store.clone());
    (service, store)
}

#[tokio::test]
async fn test_unset_key_is_none() {
    let (cache, _store) = connected();
    assert_eq!(cache.get::<Product>("product:missing").await, None);
    assert_eq!(cache.lookup::<Product>("product:missing").await, Lookup::Miss);
}

#[tokio::test]
async fn test_set_then_get_round_trips() {
    let (cache, _store) = connected();
    let value = product("p1");
    assert!(cache.set("product:p1", &value, Some(60)).await);
    assert_eq!(cache.get::<Product>("product:p1").await, Some(value));
}

#[tokio::test(start_paused = true)]
async fn test_value_expires_after_ttl() {
    let (cache, _store) = connected();
    assert!(cache.set("session:s1", &json!({"user": "u1"}), Some(5)).await);
    assert!(cache.exists("session:s1").await);

    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(cache.get::<serde_json::Value>("session:s1").await, None);
    assert!(!cache.exists("session:s1").await);
}

#[tokio::test]
async fn test_disconnected_operations_fail_silently() {
    let cache = CacheService::new(CacheConfig::default());
    assert!(!cache.is_connected());

    assert!(!cache.set("k", &1, Some(10)).await);
    assert_eq!(cache.get::<i32>("k").await, None);
    assert!(!cache.del("k").await);
    assert!(!cache.exists("k").await);
    assert_eq!(cache.lookup::<i32>("k").await, Lookup::Unavailable);

    let keys = vec!["a".to_string(), "b".to_string()];
    assert_eq!(cache.mget::<i32>(&keys).await, vec![None, None]);
    assert!(!cache.mset(&[("a".to_string(), 1)], None).await);
    assert!(!cache.invalidate_product_cache("p1").await);
    assert_eq!(cache.health_check().await, CacheHealth::Disconnected);

    let stats = cache.get_stats().await;
    assert!(!stats.connected);
    assert_eq!(stats.key_count, 0);
}

#[tokio::test]
async fn test_store_failure_degrades_to_noop() {
    let (cache, store) = connected();
    assert!(cache.set("k", &1, None).await);

    store.set_offline(true);
    assert_eq!(cache.get::<i32>("k").await, None);
    assert!(!cache.is_connected());
    assert!(!cache.set("k", &2, None).await);
    assert!(!cache.del("k").await);
    assert!(!cache.exists("k").await);
}

#[tokio::test]
async fn test_delete_then_get_is_none() {
    let (cache, _store) = connected();
    assert!(cache.set("product:p1", &product("p1"), None).await);
    assert!(cache.del("product:p1").await);
    assert_eq!(cache.get::<Product>("product:p1").await, None);
}

#[tokio::test]
async fn test_mset_then_mget_preserves_order() {
    let (cache, _store) = connected();
    let entries = vec![
        ("inventory:p1".to_string(), json!({"qty": 10})),
        ("inventory:p2".to_string(), json!({"qty": 0})),
    ];
    assert!(cache.mset(&entries, Some(900)).await);

    let keys = vec![
        "inventory:p2".to_string(),
        "inventory:none".to_string(),
        "inventory:p1".to_string(),
    ];
    let values = cache.mget::<serde_json::Value>(&keys).await;
    assert_eq!(values, vec![Some(json!({"qty": 0})), None, Some(json!({"qty": 10}))]);
}

#[tokio::test]
async fn test_mget_malformed_entry_only_blanks_its_slot() {
    let (cache, store) = connected();
    store.set("a", "1", None).await.unwrap();
    store.set("b", "not-json", None).await.unwrap();

    let keys = vec!["a".to_string(), "b".to_string()];
    assert_eq!(cache.mget::<i32>(&keys).await, vec![Some(1), None]);
    assert!(cache.is_connected());
}

#[tokio::test]
async fn test_product_invalidation_scope() {
    let (cache, store) = connected();
    let search_query = json!({"q": "rice", "productIds": ["p1", "p9"]});
    let other_query = json!({"q": "wheat"});

    assert!(cache.cache_product("p1", &product("p1")).await);
    assert!(cache.cache_dynamic_price("p1", &json!({"price": 88.0})).await);
    assert!(cache.cache_inventory("p1", &json!({"qty": 4})).await);
    assert!(cache.cache_search_results(&search_query, &vec!["p1", "p9"]).await);
    assert!(cache.cache_search_results(&other_query, &vec!["p3"]).await);
    assert!(cache.cache_product("p2", &product("p2")).await);
    assert!(cache.cache_session("s1", &json!({"user": "u1"})).await);

    assert!(cache.invalidate_product_cache("p1").await);

    assert_eq!(cache.get_product::<Product>("p1").await, None);
    assert_eq!(cache.get_dynamic_price::<serde_json::Value>("p1").await, None);
    assert_eq!(cache.get_inventory::<serde_json::Value>("p1").await, None);
    assert_eq!(cache.get_search_results::<_, Vec<String>>(&search_query).await, None);

    // Unrelated entries survive
    assert_eq!(cache.get_product::<Product>("p2").await, Some(product("p2")));
    assert_eq!(
        cache.get_search_results::<_, Vec<String>>(&other_query).await,
        Some(vec!["p3".to_string()])
    );
    assert!(store.exists(&keys::session("s1")).await.unwrap());
}

#[tokio::test]
async fn test_user_invalidation() {
    let (cache, _store) = connected();
    assert!(cache.cache_recommendations("u1", &vec!["p1"]).await);
    assert!(cache.cache_session("u1", &json!({"cart": []})).await);
    assert!(cache.cache_recommendations("u2", &vec!["p2"]).await);

    assert!(cache.invalidate_user_cache("u1").await);
    assert_eq!(cache.get_recommendations::<Vec<String>>("u1").await, None);
    assert_eq!(cache.get_session::<serde_json::Value>("u1").await, None);
    assert_eq!(
        cache.get_recommendations::<Vec<String>>("u2").await,
        Some(vec!["p2".to_string()])
    );
}

#[tokio::test]
async fn test_category_helpers_default_to_all() {
    let (cache, store) = connected();
    assert!(cache.cache_popular_products(None, &vec!["p1"]).await);
    assert!(cache.cache_supplier_rankings(Some("seeds"), &vec!["s1"]).await);
    assert!(store.exists("popular_products:all").await.unwrap());
    assert!(store.exists("supplier_rankings:seeds").await.unwrap());
    assert_eq!(
        cache.get_popular_products::<Vec<String>>(None).await,
        Some(vec!["p1".to_string()])
    );
}

#[tokio::test]
async fn test_session_delete() {
    let (cache, _store) = connected();
    assert!(cache.cache_session("s9", &json!({"user": "u9"})).await);
    assert!(cache.delete_session("s9").await);
    assert_eq!(cache.get_session::<serde_json::Value>("s9").await, None);
}

#[tokio::test]
async fn test_health_and_stats_when_connected() {
    let (cache, _store) = connected();
    cache.set("a", &1, None).await;
    cache.set("b", &2, None).await;

    assert!(matches!(cache.health_check().await, CacheHealth::Healthy { .. }));

    let stats = cache.get_stats().await;
    assert!(stats.connected);
    assert_eq!(stats.backend.as_deref(), Some("memory"));
    assert_eq!(stats.key_count, 2);
    assert_eq!(stats.server_info.get("keys").map(String::as_str), Some("2"));
}

#[tokio::test]
async fn test_connection_events_drive_state() {
    let (cache, _store) = connected();
    assert!(cache.is_connected());

    assert!(cache.handle_event(ConnectionEvent::Error("ECONNREFUSED".to_string())));
    assert!(!cache.is_connected());
    // Same error again is not re-warned
    assert!(!cache.handle_event(ConnectionEvent::Error("ECONNREFUSED".to_string())));
    assert!(!cache.set("k", &1, None).await);

    cache.handle_event(ConnectionEvent::Ready);
    assert!(cache.set("k", &1, None).await);

    cache.handle_event(ConnectionEvent::End);
    assert_eq!(cache.get::<i32>("k").await, None);
}

#[tokio::test]
async fn test_cache_accesses_reach_monitor() {
    let monitor = Arc::new(PerformanceMonitor::with_sources(
        PerformanceConfig::default(),
        Arc::new(ManualClock::default()),
        Arc::new(FixedMemoryProbe::with_usage(10, 100)),
    ));
    let store = Arc::new(MemoryStore::new());
    let cache = CacheService::with_store(CacheConfig::default(), store).with_monitor(monitor.clone());

    cache.set("hit", &1, None).await;
    cache.get::<i32>("hit").await;
    cache.get::<i32>("miss").await;
    cache
        .mget::<i32>(&["hit".to_string(), "miss".to_string()])
        .await;

    let stats = monitor.get_metrics(60_000).cache_hit_rate;
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hit_rate, 50.0);
}

/// Memory store that answers commands on one key the way Redis answers a
/// string command against a hash.
struct WrongTypeStore {
    inner: MemoryStore,
    bad_key: &'static str,
}

impl WrongTypeStore {
    fn check(&self, key: &str) -> Result<()> {
        if key == self.bad_key {
            return Err(AppError::Redis(redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "WRONGTYPE",
                "Operation against a key holding the wrong kind of value".to_string(),
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for WrongTypeStore {
    fn name(&self) -> &'static str {
        "wrongtype"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()> {
        self.check(key)?;
        self.inner.set(key, value, ttl_secs).await
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        self.inner.del(keys).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        self.inner.mget(keys).await
    }

    async fn mset(&self, entries: &[(String, String)], ttl_secs: Option<u64>) -> Result<()> {
        self.inner.mset(entries, ttl_secs).await
    }

    async fn incr(&self, key: &str, ttl_secs: Option<u64>) -> Result<u64> {
        self.check(key)?;
        self.inner.incr(key, ttl_secs).await
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        self.inner.scan(pattern).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn key_count(&self) -> Result<u64> {
        self.inner.key_count().await
    }

    async fn info(&self) -> Result<String> {
        self.inner.info().await
    }
}

#[tokio::test]
async fn test_rejected_key_leaves_other_keys_available() {
    let store = Arc::new(WrongTypeStore {
        inner: MemoryStore::new(),
        bad_key: "user:u1:profile",
    });
    let cache = CacheService::with_store(CacheConfig::default(), store);
    assert!(cache.set("product:p1", &product("p1"), None).await);

    assert_eq!(cache.lookup::<Product>("user:u1:profile").await, Lookup::Miss);
    assert!(!cache.set("user:u1:profile", &1, None).await);
    assert_eq!(cache.increment("user:u1:profile", 60).await, None);

    assert!(cache.is_connected());
    assert_eq!(cache.get::<Product>("product:p1").await, Some(product("p1")));
    assert!(matches!(cache.health_check().await, CacheHealth::Healthy { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_zero_ttl_means_no_expiry() {
    let (cache, _store) = connected();
    assert!(cache.set("inventory:p1", &40, Some(0)).await);
    assert!(cache.mset(&[("inventory:p2".to_string(), 7)], Some(0)).await);

    tokio::time::advance(Duration::from_secs(24 * 3600)).await;
    assert_eq!(cache.get::<i32>("inventory:p1").await, Some(40));
    assert_eq!(cache.get::<i32>("inventory:p2").await, Some(7));
    assert!(cache.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_huge_ttl_is_stored() {
    let (cache, _store) = connected();
    assert!(cache.set("session:s1", &json!({"user": "u1"}), Some(u64::MAX)).await);
    assert!(cache.mset(&[("session:s2".to_string(), 2)], Some(u64::MAX)).await);

    tokio::time::advance(Duration::from_secs(30 * 24 * 3600)).await;
    assert!(cache.exists("session:s1").await);
    assert_eq!(cache.get::<i32>("session:s2").await, Some(2));
}

#[tokio::test]
async fn test_delete_of_missing_key_still_succeeds() {
    let (cache, _store) = connected();
    // Success reports that the delete ran, not that a key was removed
    assert!(cache.del("product:never-cached").await);
    assert!(cache.is_connected());
}

#[tokio::test]
async fn test_increment_counts_and_fails_open() {
    let (cache, store) = connected();
    assert_eq!(cache.increment("rate_limit:10.0.0.1", 60).await, Some(1));
    assert_eq!(cache.increment("rate_limit:10.0.0.1", 60).await, Some(2));

    store.set_offline(true);
    assert_eq!(cache.increment("rate_limit:10.0.0.1", 60).await, None);
    assert!(!cache.is_connected());
}
