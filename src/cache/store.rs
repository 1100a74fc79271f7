//! Cache store contract and the in-process implementation.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tracing::debug;

use super::config::CacheConfig;
use super::error::CacheResult;
use super::lock::recover;

const SOURCE: &str = "cache::store";

/// Key-value store with expiring entries.
///
/// Values are opaque strings; stores know nothing about their shape.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns `Ok(None)` for a missing or expired key. Errors are reserved for an
    /// unreachable or failing backend.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Unconditionally replace the value under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    fn backend_name(&self) -> &'static str;
}

struct MemoryEntry {
    payload: String,
    expires_at: Instant,
}

/// Bounded in-process store with per-entry expiration and LRU eviction.
///
/// Entries are not shared between processes; use the Redis store for multi-instance
/// deployments.
pub struct MemoryCacheStore {
    entries: Mutex<LruCache<String, MemoryEntry>>,
}

impl MemoryCacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.memory_capacity_non_zero())),
        }
    }

    /// Number of stored entries, including ones that have expired but not been evicted yet.
    pub fn len(&self) -> usize {
        recover(self.entries.lock(), SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = recover(self.entries.lock(), SOURCE, "get");
        let now = Instant::now();

        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                debug!(key, "Cache HIT (memory)");
                return Ok(Some(entry.payload.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
        }
        debug!(key, expired, "Cache MISS (memory)");
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let entry = MemoryEntry {
            payload: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        recover(self.entries.lock(), SOURCE, "set").put(key.to_string(), entry);
        debug!(key, ttl_seconds = ttl.as_secs(), "Cache SET (memory)");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
