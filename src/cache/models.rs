//! Cache result and statistics models.

// Author: kelexine (https://github.com/kelexine)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Three-way outcome of a cache read.
///
/// The public `get` API collapses `Unavailable` into a miss; this type keeps
/// the distinction for callers (and tests) that need it.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Hit(T),
    Miss,
    Unavailable,
}

impl<T> Lookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Hit(value) => Some(value),
            Lookup::Miss | Lookup::Unavailable => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }
}

/// Result of probing the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CacheHealth {
    Healthy { latency_ms: f64 },
    Unhealthy { error: String },
    Disconnected,
}

impl CacheHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheHealth::Healthy { .. } => "healthy",
            CacheHealth::Unhealthy { .. } => "unhealthy",
            CacheHealth::Disconnected => "disconnected",
        }
    }
}

/// Snapshot of the store for stats endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub connected: bool,
    /// Backend name (`redis`, `memory`), absent when caching is disabled
    pub backend: Option<String>,
    pub key_count: u64,
    /// Parsed `INFO` output
    pub server_info: BTreeMap<String, String>,
}

/// Parse `INFO`-style text into a flat map.
///
/// Section headers (`# Server`) and blank lines are skipped; values keep any
/// embedded colons.
pub fn parse_info(raw: &str) -> BTreeMap<String, String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_info() {
        let raw = "# Server\r\nredis_version:7.2.4\r\nuptime_in_seconds:42\r\n\r\n# Keyspace\r\ndb0:keys=3,expires=1,avg_ttl=0\r\n";
        let info = parse_info(raw);
        assert_eq!(info.get("redis_version").map(String::as_str), Some("7.2.4"));
        assert_eq!(info.get("uptime_in_seconds").map(String::as_str), Some("42"));
        assert_eq!(info.get("db0").map(String::as_str), Some("keys=3,expires=1,avg_ttl=0"));
        assert_eq!(info.len(), 3);
    }

    #[test]
    fn test_lookup_collapses() {
        assert_eq!(Lookup::Hit(1).into_option(), Some(1));
        assert_eq!(Lookup::<i32>::Miss.into_option(), None);
        assert_eq!(Lookup::<i32>::Unavailable.into_option(), None);
    }

    #[test]
    fn test_health_serialization() {
        let json = serde_json::to_value(CacheHealth::Disconnected).unwrap();
        assert_eq!(json["status"], "disconnected");
    }
}
