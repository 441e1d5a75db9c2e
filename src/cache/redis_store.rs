// Redis-backed cache store
// Author: kelexine (https://github.com/kelexine)

use crate::cache::store::CacheStore;
use crate::config::CacheConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ConnectionAddr, ConnectionInfo, IntoConnectionInfo, RedisConnectionInfo};
use std::time::Duration;
use tracing::debug;

/// Keys requested per SCAN round trip
const SCAN_BATCH: usize = 200;

/// INCR that starts the expiry only when the counter is created
const INCR_WITH_WINDOW: &str = r"
local count = redis.call('INCR', KEYS[1])
if count == 1 and tonumber(ARGV[1]) > 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
";

/// Build connection details from either a URL or a host/port pair.
///
/// An explicit `password` always wins over one embedded in the URL.
pub fn connection_info(config: &CacheConfig) -> Result<ConnectionInfo> {
    let url = config.url.as_deref().map(str::trim).filter(|u| !u.is_empty());
    let host = config.host.as_deref().map(str::trim).filter(|h| !h.is_empty());

    let mut info = match (url, host) {
        (Some(url), _) => url.into_connection_info()?,
        (None, Some(host)) => ConnectionInfo {
            addr: ConnectionAddr::Tcp(host.to_string(), config.port),
            redis: RedisConnectionInfo {
                db: config.db,
                ..Default::default()
            },
        },
        (None, None) => {
            return Err(AppError::Config(
                "no Redis url or host configured".to_string(),
            ))
        }
    };

    if let Some(password) = config.password.as_deref().filter(|p| !p.is_empty()) {
        info.redis.password = Some(password.to_string());
    }

    Ok(info)
}

/// Cache store backed by a Redis server.
///
/// Uses a `ConnectionManager`, which multiplexes commands over one
/// connection and transparently reconnects after I/O failures.
pub struct RedisStore {
    conn: ConnectionManager,
    address: String,
}

impl RedisStore {
    /// Connect to Redis, failing if the server is not reachable within the timeout
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        let info = connection_info(config)?;
        let address = info.addr.to_string();
        let client = Client::open(info)?;

        let timeout_ms = config.connect_timeout_ms;
        let conn = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            client.get_connection_manager(),
        )
        .await
        .map_err(|_| AppError::Timeout(timeout_ms))??;

        debug!("Redis connection manager established for {}", address);
        Ok(Self { conn, address })
    }

    /// `host:port` of the server
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl_secs {
            Some(ttl) if ttl > 0 => {
                let _: () = conn.set_ex(key, value, ttl).await?;
            }
            _ => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let deleted: u64 = conn.del(keys).await?;
        Ok(deleted)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        Ok(values)
    }

    async fn mset(&self, entries: &[(String, String)], ttl_secs: Option<u64>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();

        // MULTI/EXEC so either every pair lands or none does
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            let cmd = pipe.cmd("SET").arg(key).arg(value);
            if let Some(ttl) = ttl_secs.filter(|&t| t > 0) {
                cmd.arg("EX").arg(ttl);
            }
            cmd.ignore();
        }

        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn incr(&self, key: &str, ttl_secs: Option<u64>) -> Result<u64> {
        let mut conn = self.conn.clone();
        let script = redis::Script::new(INCR_WITH_WINDOW);
        let count: u64 = script
            .key(key)
            .arg(ttl_secs.unwrap_or(0))
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        // SCAN instead of KEYS so large keyspaces never block the server
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply.eq_ignore_ascii_case("PONG") {
            Ok(())
        } else {
            Err(AppError::Store(format!("unexpected PING reply: {}", reply)))
        }
    }

    async fn key_count(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let count: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;
        Ok(count)
    }

    async fn info(&self) -> Result<String> {
        let mut conn = self.conn.clone();
        let info: String = redis::cmd("INFO").query_async(&mut conn).await?;
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_info_from_host() {
        let config = CacheConfig {
            host: Some("cache.internal".to_string()),
            port: 6380,
            db: 2,
            password: Some("pw".to_string()),
            ..Default::default()
        };
        let info = connection_info(&config).unwrap();
        assert_eq!(info.addr, ConnectionAddr::Tcp("cache.internal".to_string(), 6380));
        assert_eq!(info.redis.db, 2);
        assert_eq!(info.redis.password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_connection_info_url_wins_over_host() {
        let config = CacheConfig {
            url: Some("redis://primary:6379/1".to_string()),
            host: Some("ignored".to_string()),
            ..Default::default()
        };
        let info = connection_info(&config).unwrap();
        assert_eq!(info.addr, ConnectionAddr::Tcp("primary".to_string(), 6379));
        assert_eq!(info.redis.db, 1);
        assert!(info.redis.password.is_none());
    }

    #[test]
    fn test_password_overrides_url() {
        let config = CacheConfig {
            url: Some("redis://:old@primary:6379".to_string()),
            password: Some("new".to_string()),
            ..Default::default()
        };
        let info = connection_info(&config).unwrap();
        assert_eq!(info.redis.password.as_deref(), Some("new"));
    }

    #[test]
    fn test_unconfigured_is_error() {
        let result = connection_info(&CacheConfig::default());
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
