//! PORTCULLIS Cache
//!
//! Key/value store with per-entry TTL that mechanisms use to memoize
//! expensive side effects (e.g. credential verification), keyed by a
//! caller-constructed string.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;

pub use memory::InMemoryCache;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Cache capability shared by all mechanisms
///
/// Implementations must be safe for concurrent use from many request workers.
pub trait Cache: Send + Sync {
    /// Stored value, or `None` if missing, expired or deleted
    fn get(&self, key: &str) -> Option<Bytes>;

    /// Store `value` for `ttl`, replacing any previous entry
    fn set(&self, key: &str, value: Bytes, ttl: Duration);

    /// Remove the entry; absent keys are ignored
    fn delete(&self, key: &str);
}

/// Cache that never stores anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl Cache for NoopCache {
    fn get(&self, _key: &str) -> Option<Bytes> {
        None
    }

    fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) {}

    fn delete(&self, _key: &str) {}
}

/// Cache backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    /// [`InMemoryCache`]
    #[default]
    Memory,
    /// [`NoopCache`]
    Noop,
}

/// Cache configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Backend
    #[serde(rename = "type", default)]
    pub cache_type: CacheType,
}

impl CacheConfig {
    /// Instantiate the configured backend
    #[must_use]
    pub fn build(&self) -> Arc<dyn Cache> {
        tracing::debug!(cache_type = ?self.cache_type, "creating cache");
        match self.cache_type {
            CacheType::Memory => Arc::new(InMemoryCache::new()),
            CacheType::Noop => Arc::new(NoopCache),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_cache() {
        let cache = NoopCache;
        cache.set("k", Bytes::from_static(b"v"), Duration::from_secs(60));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_cache_config_default_is_memory() {
        let config: CacheConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.cache_type, CacheType::Memory);

        let cache = config.build();
        cache.set("k", Bytes::from_static(b"v"), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(Bytes::from_static(b"v")));
    }

    #[test]
    fn test_cache_config_noop() {
        let config: CacheConfig = serde_json::from_str(r#"{"type": "noop"}"#).unwrap();
        let cache = config.build();
        cache.set("k", Bytes::from_static(b"v"), Duration::from_secs(60));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_cache_config_rejects_unknown_fields() {
        let result: Result<CacheConfig, _> = serde_json::from_str(r#"{"type": "memory", "size": 3}"#);
        assert!(result.is_err());
    }
}
