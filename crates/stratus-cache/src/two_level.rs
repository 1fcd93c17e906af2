//! Two-level cache composing Tier-1 and Tier-2.
//!
//! Reads go Tier-1 then Tier-2 with promotion; writes and evictions fan out to
//! both tiers. Tier-2 is allowed to fail: read failures become misses and write
//! failures leave Tier-1 populated. Both are logged and counted in
//! [`TierStats`], never returned to the caller.

use crate::stats::{TierStats, TierStatsSnapshot};
use crate::{CacheKey, CacheTier, PolicyTable};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use stratus_core::{StratusError, StratusResult};
use tracing::{debug, info, warn};

/// Read-through, write-through composition of two cache tiers.
pub struct TwoLevelCache {
    policies: Arc<PolicyTable>,
    tier1: Arc<dyn CacheTier>,
    tier2: Arc<dyn CacheTier>,
    stats: TierStats,
}

impl TwoLevelCache {
    /// Creates a cache over the given tiers.
    ///
    /// Both tiers must be built from the same `policies` table.
    pub fn new(
        policies: Arc<PolicyTable>,
        tier1: Arc<dyn CacheTier>,
        tier2: Arc<dyn CacheTier>,
    ) -> Self {
        Self {
            policies,
            tier1,
            tier2,
            stats: TierStats::default(),
        }
    }

    /// Returns the policy table shared by both tiers.
    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    /// Returns the current cache counters.
    pub fn stats(&self) -> TierStatsSnapshot {
        self.stats.snapshot()
    }

    /// Looks a key up in Tier-1, then Tier-2, promoting Tier-2 hits.
    pub async fn get(&self, key: &CacheKey) -> StratusResult<Option<String>> {
        let policy = self.policies.get(key.cache_name())?;

        if let Some(value) = self.tier1.get(key).await? {
            debug!("Cache hit for key '{}' in {}", key, self.tier1.label());
            self.stats.tier1_hit(key.cache_name());
            return Ok(Some(value));
        }

        match self.tier2.get(key).await {
            Ok(Some(value)) => {
                debug!(
                    "Cache hit for key '{}' in {}, promoting with TTL {:?}",
                    key,
                    self.tier2.label(),
                    policy.tier1_ttl
                );
                self.stats.tier2_hit(key.cache_name());
                self.tier1.put(key, &value).await?;
                self.stats.promotion(key.cache_name());
                Ok(Some(value))
            }
            Ok(None) => {
                debug!("Cache miss for key '{}'", key);
                self.stats.miss(key.cache_name());
                Ok(None)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Tier-2 read failed, treating as miss");
                self.stats.tier2_read_failure("get");
                self.stats.miss(key.cache_name());
                Ok(None)
            }
        }
    }

    /// Writes a value to Tier-1, then Tier-2.
    ///
    /// A Tier-2 failure is counted but does not fail the write and does not
    /// roll back Tier-1.
    pub async fn put(&self, key: &CacheKey, value: &str) -> StratusResult<()> {
        self.policies.get(key.cache_name())?;
        self.tier1.put(key, value).await?;

        if let Err(e) = self.tier2.put(key, value).await {
            warn!(key = %key, error = %e, "Tier-2 write failed, value kept in Tier-1 only");
            self.stats.tier2_write_failure("put");
        }
        Ok(())
    }

    /// Removes a key from both tiers. Absence is not an error.
    pub async fn evict(&self, key: &CacheKey) -> StratusResult<()> {
        self.policies.get(key.cache_name())?;
        self.tier1.evict(key).await?;

        if let Err(e) = self.tier2.evict(key).await {
            warn!(key = %key, error = %e, "Tier-2 evict failed");
            self.stats.tier2_write_failure("evict");
        }
        Ok(())
    }

    /// Clears a cache name in both tiers.
    ///
    /// Unlike reads and writes, a Tier-2 failure is returned so that an
    /// administrator sees an incomplete purge.
    pub async fn clear(&self, cache_name: &str) -> StratusResult<()> {
        self.policies.get(cache_name)?;

        let tier1_removed = self.tier1.clear(cache_name).await?;
        let tier2_removed = self.tier2.clear(cache_name).await.map_err(|e| {
            self.stats.tier2_write_failure("clear");
            e
        })?;

        info!(
            cache = cache_name,
            tier1_removed, tier2_removed, "Cleared cache"
        );
        Ok(())
    }

    /// Returns the cached value, or runs `loader`, caches its result and returns it.
    ///
    /// A loader failure is wrapped in [`StratusError::ComputeFailed`] and
    /// nothing is cached.
    pub async fn get_or_compute<F, Fut>(&self, key: &CacheKey, loader: F) -> StratusResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StratusResult<String>>,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        let value = loader()
            .await
            .map_err(|e| StratusError::compute_failed(key.storage_key(), e))?;
        self.put(key, &value).await?;
        Ok(value)
    }

    /// Typed variant of [`get`](Self::get).
    ///
    /// A payload that fails to decode is evicted and reported as a miss.
    pub async fn get_typed<T: DeserializeOwned>(&self, key: &CacheKey) -> StratusResult<Option<T>> {
        let Some(raw) = self.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached payload failed to decode, evicting");
                self.stats.decode_failure(key.cache_name());
                self.evict(key).await?;
                Ok(None)
            }
        }
    }

    /// Typed variant of [`put`](Self::put).
    pub async fn put_typed<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T) -> StratusResult<()> {
        let raw = serde_json::to_string(value)?;
        self.put(key, &raw).await
    }

    /// Typed variant of [`get_or_compute`](Self::get_or_compute).
    pub async fn get_or_compute_typed<T, F, Fut>(&self, key: &CacheKey, loader: F) -> StratusResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = StratusResult<T>>,
    {
        if let Some(value) = self.get_typed(key).await? {
            return Ok(value);
        }

        let value = loader()
            .await
            .map_err(|e| StratusError::compute_failed(key.storage_key(), e))?;
        self.put_typed(key, &value).await?;
        Ok(value)
    }

    /// Reads every live Tier-1 entry of a cache name.
    pub async fn snapshot_tier1(&self, cache_name: &str) -> StratusResult<BTreeMap<String, String>> {
        self.policies.get(cache_name)?;
        self.tier1.snapshot(cache_name).await
    }

    /// Reads every live Tier-2 entry of a cache name. Failures are returned.
    pub async fn snapshot_tier2(&self, cache_name: &str) -> StratusResult<BTreeMap<String, String>> {
        self.policies.get(cache_name)?;
        self.tier2.snapshot(cache_name).await.map_err(|e| {
            self.stats.tier2_read_failure("snapshot");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryTier, TierPolicy};
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    /// Memory-backed Tier-2 double that can be switched into failure.
    struct FlakyTier {
        inner: MemoryTier,
        failing: AtomicBool,
        gets: AtomicU32,
    }

    impl FlakyTier {
        fn new(policies: Arc<PolicyTable>) -> Self {
            Self {
                inner: MemoryTier::new(policies).unwrap(),
                failing: AtomicBool::new(false),
                gets: AtomicU32::new(0),
            }
        }

        fn fail(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> StratusResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                Err(StratusError::cache("connection refused"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CacheTier for FlakyTier {
        fn label(&self) -> &'static str {
            "tier2"
        }

        async fn get(&self, key: &CacheKey) -> StratusResult<Option<String>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.get(key).await
        }

        async fn put(&self, key: &CacheKey, value: &str) -> StratusResult<()> {
            self.check()?;
            self.inner.put(key, value).await
        }

        async fn evict(&self, key: &CacheKey) -> StratusResult<bool> {
            self.check()?;
            self.inner.evict(key).await
        }

        async fn clear(&self, cache_name: &str) -> StratusResult<u64> {
            self.check()?;
            self.inner.clear(cache_name).await
        }

        async fn snapshot(&self, cache_name: &str) -> StratusResult<BTreeMap<String, String>> {
            self.check()?;
            self.inner.snapshot(cache_name).await
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Reading {
        temperature_c: f64,
    }

    struct Fixture {
        cache: TwoLevelCache,
        tier1: Arc<MemoryTier>,
        tier2: Arc<FlakyTier>,
    }

    fn fixture() -> Fixture {
        let policies = Arc::new(PolicyTable::new().with_policy(
            "currentTemp",
            TierPolicy {
                tier1_ttl: Duration::from_secs(1800),
                tier1_max_entries: 100,
                tier2_ttl: Duration::from_secs(300),
            },
        ));
        let tier1 = Arc::new(MemoryTier::new(Arc::clone(&policies)).unwrap());
        let tier2 = Arc::new(FlakyTier::new(Arc::clone(&policies)));
        let cache = TwoLevelCache::new(policies, tier1.clone(), tier2.clone());
        Fixture { cache, tier1, tier2 }
    }

    fn key(city: &str) -> CacheKey {
        CacheKey::new("currentTemp", city)
    }

    #[tokio::test]
    async fn test_put_then_get_served_from_tier1() {
        let f = fixture();
        f.cache.put(&key("London,UK"), "12.5").await.unwrap();

        assert_eq!(f.cache.get(&key("London,UK")).await.unwrap().as_deref(), Some("12.5"));
        assert_eq!(f.tier2.gets.load(Ordering::SeqCst), 0);
        assert_eq!(f.cache.stats().tier1_hits, 1);
        assert_eq!(f.tier2.inner.get(&key("London,UK")).await.unwrap().as_deref(), Some("12.5"));
    }

    #[tokio::test]
    async fn test_tier2_hit_is_promoted_verbatim() {
        let f = fixture();
        f.tier2.put(&key("Paris,FR"), r#"{"temperature_c":18.0}"#).await.unwrap();

        let value = f.cache.get(&key("Paris,FR")).await.unwrap();
        assert_eq!(value.as_deref(), Some(r#"{"temperature_c":18.0}"#));
        assert_eq!(
            f.tier1.get(&key("Paris,FR")).await.unwrap().as_deref(),
            Some(r#"{"temperature_c":18.0}"#)
        );

        let stats = f.cache.stats();
        assert_eq!(stats.tier2_hits, 1);
        assert_eq!(stats.promotions, 1);
    }

    #[tokio::test]
    async fn test_miss_in_both_tiers() {
        let f = fixture();
        assert!(f.cache.get(&key("Oslo,NO")).await.unwrap().is_none());
        assert_eq!(f.cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_evict_removes_from_both_tiers() {
        let f = fixture();
        f.cache.put(&key("London,UK"), "1").await.unwrap();
        f.cache.evict(&key("London,UK")).await.unwrap();

        assert!(f.tier1.get(&key("London,UK")).await.unwrap().is_none());
        assert!(f.tier2.inner.get(&key("London,UK")).await.unwrap().is_none());

        // Absent key is fine
        f.cache.evict(&key("London,UK")).await.unwrap();
    }

    #[tokio::test]
    async fn test_tier2_write_failure_keeps_tier1() {
        let f = fixture();
        f.tier2.fail(true);

        f.cache.put(&key("London,UK"), "1").await.unwrap();

        assert_eq!(f.tier1.get(&key("London,UK")).await.unwrap().as_deref(), Some("1"));
        assert_eq!(f.cache.stats().tier2_write_failures, 1);
    }

    #[tokio::test]
    async fn test_tier2_read_failure_is_a_miss() {
        let f = fixture();
        f.tier2.fail(true);

        assert!(f.cache.get(&key("London,UK")).await.unwrap().is_none());
        let stats = f.cache.stats();
        assert_eq!(stats.tier2_read_failures, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_get_or_compute_caches_loader_result() {
        let f = fixture();
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            let value = f
                .cache
                .get_or_compute(&key("London,UK"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("12.5".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "12.5");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loader_failure_is_compute_failed_and_not_cached() {
        let f = fixture();

        let err = f
            .cache
            .get_or_compute(&key("Atlantis"), || async {
                Err(StratusError::not_found("city", "Atlantis"))
            })
            .await
            .unwrap_err();

        match &err {
            StratusError::ComputeFailed { key, source } => {
                assert_eq!(key, "currentTemp::Atlantis");
                assert!(matches!(**source, StratusError::NotFound { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.status_code(), 404);
        assert!(f.tier1.is_empty("currentTemp").unwrap());
        assert!(f.tier2.inner.is_empty("currentTemp").unwrap());
    }

    #[tokio::test]
    async fn test_typed_round_trip_and_decode_failure() {
        let f = fixture();
        let reading = Reading { temperature_c: 12.5 };

        let loaded = f
            .cache
            .get_or_compute_typed(&key("London,UK"), || async { Ok(Reading { temperature_c: 12.5 }) })
            .await
            .unwrap();
        assert_eq!(loaded, reading);
        assert_eq!(f.cache.get_typed::<Reading>(&key("London,UK")).await.unwrap(), Some(reading));

        f.cache.put(&key("Paris,FR"), "not json").await.unwrap();
        assert!(f.cache.get_typed::<Reading>(&key("Paris,FR")).await.unwrap().is_none());
        assert!(f.tier1.get(&key("Paris,FR")).await.unwrap().is_none());
        assert!(f.tier2.inner.get(&key("Paris,FR")).await.unwrap().is_none());
        assert_eq!(f.cache.stats().decode_failures, 1);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let f = fixture();
        f.cache.put(&key("a"), "1").await.unwrap();
        f.cache.put(&key("b"), "2").await.unwrap();

        f.cache.clear("currentTemp").await.unwrap();
        f.cache.clear("currentTemp").await.unwrap();

        assert!(f.cache.snapshot_tier1("currentTemp").await.unwrap().is_empty());
        assert!(f.cache.snapshot_tier2("currentTemp").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_surfaces_tier2_failure() {
        let f = fixture();
        f.cache.put(&key("a"), "1").await.unwrap();
        f.tier2.fail(true);

        let err = f.cache.clear("currentTemp").await.unwrap_err();
        assert!(matches!(err, StratusError::Cache(_)));
        assert!(f.cache.snapshot_tier2("currentTemp").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_cache_name_rejected() {
        let f = fixture();
        let unknown = CacheKey::new("dailyForecast", "London,UK");

        assert!(f.cache.get(&unknown).await.is_err());
        assert!(f.cache.put(&unknown, "1").await.is_err());
        assert!(f.cache.clear("dailyForecast").await.is_err());
        assert_eq!(f.tier2.gets.load(Ordering::SeqCst), 0);
    }
}
