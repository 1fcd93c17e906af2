//! Administrative cache and breaker operations.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use stratus_cache::{TierStatsSnapshot, TwoLevelCache};
use stratus_core::{Caller, Permission, StratusError, StratusResult};
use stratus_resilience::{CircuitBreaker, CircuitSnapshot};
use tracing::{info, warn};

/// Tier contents: cache name → key → value.
pub type TierView<V> = BTreeMap<String, BTreeMap<String, V>>;

/// Admin-only view of the caches and breakers.
///
/// Inspection reads each tier on its own and never promotes or mutates.
pub struct CacheAdmin {
    cache: Arc<TwoLevelCache>,
    purge_targets: Vec<String>,
    breakers: Vec<Arc<CircuitBreaker>>,
}

impl CacheAdmin {
    /// Creates a new admin service.
    pub fn new(
        cache: Arc<TwoLevelCache>,
        purge_targets: Vec<String>,
        breakers: Vec<Arc<CircuitBreaker>>,
    ) -> Self {
        Self {
            cache,
            purge_targets,
            breakers,
        }
    }

    /// Clears every purge target in both tiers. Safe to repeat.
    ///
    /// Every target is attempted even when Tier-2 fails, so Tier-1 never keeps
    /// stale entries; the Tier-2 failures are then reported together.
    /// Returns the cache names that were cleared.
    pub async fn purge(&self, caller: &Caller) -> StratusResult<Vec<String>> {
        caller.require_permission(Permission::CachePurge)?;

        let mut failures = Vec::new();
        for cache_name in &self.purge_targets {
            if let Err(e) = self.cache.clear(cache_name).await {
                warn!(cache = %cache_name, error = %e, "Purge of cache incomplete");
                failures.push(format!("{cache_name}: {e}"));
            }
        }

        if !failures.is_empty() {
            return Err(StratusError::cache(format!(
                "Purge incomplete: {}",
                failures.join("; ")
            )));
        }

        info!(caller = %caller.subject, targets = ?self.purge_targets, "Purged caches");
        Ok(self.purge_targets.clone())
    }

    /// Reads Tier-1 for every cache name, with values decoded as JSON.
    pub async fn inspect_tier1(&self, caller: &Caller) -> StratusResult<TierView<Value>> {
        caller.require_permission(Permission::CacheInspect)?;

        let mut view = TierView::new();
        for cache_name in self.cache.policies().names() {
            let entries = self
                .cache
                .snapshot_tier1(cache_name)
                .await?
                .into_iter()
                .map(|(key, raw)| {
                    let value = serde_json::from_str(&raw).unwrap_or_else(|e| {
                        warn!(cache = cache_name, key = %key, error = %e, "Undecodable Tier-1 entry");
                        Value::String(raw)
                    });
                    (key, value)
                })
                .collect();
            view.insert(cache_name.to_string(), entries);
        }
        Ok(view)
    }

    /// Reads Tier-2 for every cache name, with values as stored.
    pub async fn inspect_tier2(&self, caller: &Caller) -> StratusResult<TierView<String>> {
        caller.require_permission(Permission::CacheInspect)?;

        let mut view = TierView::new();
        for cache_name in self.cache.policies().names() {
            let entries = self.cache.snapshot_tier2(cache_name).await?;
            view.insert(cache_name.to_string(), entries);
        }
        Ok(view)
    }

    /// Returns a snapshot of every operation's breaker.
    pub fn circuit_status(&self, caller: &Caller) -> StratusResult<Vec<CircuitSnapshot>> {
        caller.require_permission(Permission::CircuitInspect)?;
        Ok(self.breakers.iter().map(|b| b.snapshot()).collect())
    }

    /// Returns the cache hit, miss and Tier-2 failure counters.
    pub fn cache_stats(&self, caller: &Caller) -> StratusResult<TierStatsSnapshot> {
        caller.require_permission(Permission::CacheInspect)?;
        Ok(self.cache.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_cache::{CacheKey, MemoryTier, PolicyTable, RedisTier, TierPolicy};
    use std::time::Duration;

    fn admin() -> CacheAdmin {
        let policy = TierPolicy {
            tier1_ttl: Duration::from_secs(1800),
            tier1_max_entries: 100,
            tier2_ttl: Duration::from_secs(300),
        };
        let policies = Arc::new(
            PolicyTable::new()
                .with_policy("currentTemp", policy)
                .with_policy("hourlyForecast", policy),
        );
        let tier1 = Arc::new(MemoryTier::new(Arc::clone(&policies)).unwrap());
        let tier2 = Arc::new(RedisTier::disabled(Arc::clone(&policies)));
        let cache = Arc::new(TwoLevelCache::new(policies, tier1, tier2));

        CacheAdmin::new(
            cache,
            vec!["currentTemp".to_string(), "hourlyForecast".to_string()],
            vec![Arc::new(CircuitBreaker::with_defaults("current-conditions"))],
        )
    }

    #[tokio::test]
    async fn test_reader_is_denied() {
        let admin = admin();
        let reader = Caller::reader("alice");

        assert!(matches!(admin.purge(&reader).await, Err(StratusError::Forbidden(_))));
        assert!(matches!(admin.inspect_tier1(&reader).await, Err(StratusError::Forbidden(_))));
        assert!(matches!(admin.inspect_tier2(&reader).await, Err(StratusError::Forbidden(_))));
        assert!(matches!(admin.circuit_status(&reader), Err(StratusError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_inspect_tier1_decodes_values() {
        let admin = admin();
        admin
            .cache
            .put(&CacheKey::new("currentTemp", "London,UK"), r#"{"temperatureC":12.5}"#)
            .await
            .unwrap();

        let view = admin.inspect_tier1(&Caller::admin("root")).await.unwrap();

        assert_eq!(view["currentTemp"]["London,UK"]["temperatureC"], 12.5);
        assert!(view["hourlyForecast"].is_empty());
    }

    #[tokio::test]
    async fn test_purge_twice() {
        let admin = admin();
        let root = Caller::admin("root");
        admin
            .cache
            .put(&CacheKey::new("hourlyForecast", "London,UK|2025-05-23"), "[]")
            .await
            .unwrap();

        assert_eq!(admin.purge(&root).await.unwrap().len(), 2);
        admin.purge(&root).await.unwrap();

        let view = admin.inspect_tier1(&root).await.unwrap();
        assert!(view.values().all(BTreeMap::is_empty));
    }

    #[test]
    fn test_circuit_status() {
        let admin = admin();
        let status = admin.circuit_status(&Caller::admin("root")).unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].name, "current-conditions");
    }
}
