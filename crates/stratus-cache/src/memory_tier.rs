//! In-process Tier-1 cache.

use crate::{CacheKey, CacheTier, PolicyTable};
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::Arc;
use stratus_core::{StratusError, StratusResult};
use tokio::time::Instant;
use tracing::debug;

/// A stored value with its lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Immutable JSON payload.
    pub value: String,
    /// When the entry was written.
    pub inserted_at: Instant,
    /// When the entry stops being served.
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Bounded in-process tier.
///
/// Each cache name gets its own LRU map sized from the policy table, so a
/// busy cache name cannot evict entries of another.
pub struct MemoryTier {
    policies: Arc<PolicyTable>,
    caches: HashMap<String, Mutex<LruCache<String, CacheEntry>>>,
}

impl MemoryTier {
    /// Creates a tier with one LRU map per cache name in the table.
    pub fn new(policies: Arc<PolicyTable>) -> StratusResult<Self> {
        let mut caches = HashMap::new();
        for (name, policy) in policies.iter() {
            let capacity = NonZeroUsize::new(policy.tier1_max_entries).ok_or_else(|| {
                StratusError::Configuration(format!(
                    "Tier-1 capacity for '{}' must be greater than zero",
                    name
                ))
            })?;
            caches.insert(name.to_string(), Mutex::new(LruCache::new(capacity)));
        }

        Ok(Self { policies, caches })
    }

    /// Returns the number of entries held for a cache name, expired ones included.
    pub fn len(&self, cache_name: &str) -> StratusResult<usize> {
        Ok(self.cache(cache_name)?.lock().len())
    }

    /// Returns true if the cache name holds no entries.
    pub fn is_empty(&self, cache_name: &str) -> StratusResult<bool> {
        Ok(self.len(cache_name)? == 0)
    }

    fn cache(&self, cache_name: &str) -> StratusResult<&Mutex<LruCache<String, CacheEntry>>> {
        self.caches
            .get(cache_name)
            .ok_or_else(|| StratusError::cache(format!("Unknown cache name '{}'", cache_name)))
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn label(&self) -> &'static str {
        "tier1"
    }

    async fn get(&self, key: &CacheKey) -> StratusResult<Option<String>> {
        let now = Instant::now();
        let mut cache = self.cache(key.cache_name())?.lock();

        let expired = match cache.get(key.key()) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            cache.pop(key.key());
            debug!("Tier-1 entry '{}' expired", key);
        }
        Ok(None)
    }

    async fn put(&self, key: &CacheKey, value: &str) -> StratusResult<()> {
        let ttl = self.policies.get(key.cache_name())?.tier1_ttl;
        let now = Instant::now();
        let entry = CacheEntry {
            value: value.to_string(),
            inserted_at: now,
            expires_at: now + ttl,
        };

        let evicted = self
            .cache(key.cache_name())?
            .lock()
            .push(key.key().to_string(), entry);

        if let Some((evicted_key, _)) = evicted {
            if evicted_key != key.key() {
                debug!(
                    "Tier-1 '{}' at capacity, evicted '{}'",
                    key.cache_name(),
                    evicted_key
                );
            }
        }
        Ok(())
    }

    async fn evict(&self, key: &CacheKey) -> StratusResult<bool> {
        Ok(self
            .cache(key.cache_name())?
            .lock()
            .pop(key.key())
            .is_some())
    }

    async fn clear(&self, cache_name: &str) -> StratusResult<u64> {
        let mut cache = self.cache(cache_name)?.lock();
        let removed = cache.len() as u64;
        cache.clear();
        Ok(removed)
    }

    async fn snapshot(&self, cache_name: &str) -> StratusResult<BTreeMap<String, String>> {
        let now = Instant::now();
        let cache = self.cache(cache_name)?.lock();

        // iter() does not touch recency
        Ok(cache
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect())
    }
}
