//! Cache tier contract.

use crate::CacheKey;
use async_trait::async_trait;
use std::collections::BTreeMap;
use stratus_core::StratusResult;

/// One storage tier.
///
/// Values are immutable JSON payloads; `put` replaces an entry wholesale. Each
/// tier looks up TTLs and bounds for a key's cache name in the shared
/// [`PolicyTable`](crate::PolicyTable) and rejects names it does not contain.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Short label used in logs and metrics.
    fn label(&self) -> &'static str;

    /// Get a raw JSON value from the tier.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    async fn get(&self, key: &CacheKey) -> StratusResult<Option<String>>;

    /// Store a raw JSON value using the tier's TTL for the cache name.
    async fn put(&self, key: &CacheKey, value: &str) -> StratusResult<()>;

    /// Remove a value.
    ///
    /// Returns `true` if the key existed.
    async fn evict(&self, key: &CacheKey) -> StratusResult<bool>;

    /// Remove every entry of a cache name.
    ///
    /// Returns the number of entries removed.
    async fn clear(&self, cache_name: &str) -> StratusResult<u64>;

    /// Read every live entry of a cache name without promoting or mutating.
    ///
    /// Keys are the parameter part of the cache key.
    async fn snapshot(&self, cache_name: &str) -> StratusResult<BTreeMap<String, String>>;
}
