//! Redis-backed Tier-2 cache.

use crate::{CacheKey, CacheTier, PolicyTable};
use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Config, Pool, Runtime};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use stratus_core::{StratusError, StratusResult};
use tracing::{debug, info};

/// Default bound on a single Redis operation.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(250);

/// Create a Redis connection pool.
///
/// No connection is opened here; an unreachable server surfaces as Tier-2
/// failures on first use.
pub fn create_pool(url: &str, pool_size: usize) -> StratusResult<Pool> {
    info!("Creating Redis connection pool for Tier-2 cache...");

    Config::from_url(url)
        .builder()
        .map_err(|e| StratusError::Configuration(format!("Invalid Redis config: {}", e)))?
        .max_size(pool_size)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| StratusError::Configuration(format!("Failed to create Redis pool: {}", e)))
}

/// Shared Tier-2 tier.
///
/// Every operation is bounded by `op_timeout`; an elapsed bound is reported as
/// a cache error like any other Redis failure.
pub struct RedisTier {
    /// Redis connection pool, absent when Tier-2 is disabled.
    pool: Option<Arc<Pool>>,
    policies: Arc<PolicyTable>,
    op_timeout: Duration,
}

impl RedisTier {
    /// Create a new Redis tier.
    #[must_use]
    pub fn new(pool: Arc<Pool>, policies: Arc<PolicyTable>, op_timeout: Duration) -> Self {
        Self {
            pool: Some(pool),
            policies,
            op_timeout,
        }
    }

    /// Create a no-op tier that always misses (for when Redis is disabled).
    #[must_use]
    pub fn disabled(policies: Arc<PolicyTable>) -> Self {
        Self {
            pool: None,
            policies,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    /// Returns true if a Redis pool is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> StratusResult<deadpool_redis::Connection> {
        match &self.pool {
            Some(pool) => pool.get().await.map_err(|e| {
                StratusError::Cache(format!("Failed to get Redis connection: {}", e))
            }),
            None => Err(StratusError::Cache("Tier-2 cache is disabled".to_string())),
        }
    }

    async fn bounded<T, Fut>(&self, what: &str, fut: Fut) -> StratusResult<T>
    where
        Fut: Future<Output = StratusResult<T>>,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| {
                StratusError::Cache(format!(
                    "Redis {} timed out after {}ms",
                    what,
                    self.op_timeout.as_millis()
                ))
            })?
    }

    async fn matching_keys(
        conn: &mut deadpool_redis::Connection,
        cache_name: &str,
    ) -> StratusResult<Vec<String>> {
        // KEYS blocks the server; acceptable for the small admin-only key spaces here
        deadpool_redis::redis::cmd("KEYS")
            .arg(CacheKey::name_pattern(cache_name))
            .query_async(conn)
            .await
            .map_err(|e| StratusError::Cache(format!("Failed to scan keys: {}", e)))
    }
}

#[async_trait]
impl CacheTier for RedisTier {
    fn label(&self) -> &'static str {
        "tier2"
    }

    async fn get(&self, key: &CacheKey) -> StratusResult<Option<String>> {
        self.policies.get(key.cache_name())?;
        if !self.is_enabled() {
            return Ok(None);
        }

        let storage_key = key.storage_key();
        let value: Option<String> = self
            .bounded("GET", async {
                let mut conn = self.get_conn().await?;
                conn.get(&storage_key).await.map_err(|e| {
                    StratusError::Cache(format!("Failed to get key '{}': {}", storage_key, e))
                })
            })
            .await?;

        match &value {
            Some(_) => debug!("Tier-2 hit for key '{}'", storage_key),
            None => debug!("Tier-2 miss for key '{}'", storage_key),
        }

        Ok(value)
    }

    async fn put(&self, key: &CacheKey, value: &str) -> StratusResult<()> {
        let ttl = self.policies.get(key.cache_name())?.tier2_ttl;
        if !self.is_enabled() {
            return Ok(());
        }

        let storage_key = key.storage_key();
        let ttl_secs = ttl.as_secs().max(1);

        self.bounded("SETEX", async {
            let mut conn = self.get_conn().await?;
            conn.set_ex::<_, _, ()>(&storage_key, value, ttl_secs)
                .await
                .map_err(|e| {
                    StratusError::Cache(format!("Failed to set key '{}': {}", storage_key, e))
                })
        })
        .await?;

        debug!("Cached key '{}' in Tier-2 with TTL {}s", storage_key, ttl_secs);
        Ok(())
    }

    async fn evict(&self, key: &CacheKey) -> StratusResult<bool> {
        self.policies.get(key.cache_name())?;
        if !self.is_enabled() {
            return Ok(false);
        }

        let storage_key = key.storage_key();
        let deleted: i64 = self
            .bounded("DEL", async {
                let mut conn = self.get_conn().await?;
                conn.del(&storage_key).await.map_err(|e| {
                    StratusError::Cache(format!("Failed to delete key '{}': {}", storage_key, e))
                })
            })
            .await?;

        debug!("Deleted Tier-2 key '{}': {}", storage_key, deleted > 0);
        Ok(deleted > 0)
    }

    async fn clear(&self, cache_name: &str) -> StratusResult<u64> {
        self.policies.get(cache_name)?;
        if !self.is_enabled() {
            return Ok(0);
        }

        let deleted: i64 = self
            .bounded("clear", async {
                let mut conn = self.get_conn().await?;
                let keys = Self::matching_keys(&mut conn, cache_name).await?;
                if keys.is_empty() {
                    return Ok(0);
                }

                conn.del(&keys)
                    .await
                    .map_err(|e| StratusError::Cache(format!("Failed to delete keys: {}", e)))
            })
            .await?;

        debug!("Deleted {} Tier-2 keys of cache '{}'", deleted, cache_name);
        Ok(u64::try_from(deleted).unwrap_or_default())
    }

    async fn snapshot(&self, cache_name: &str) -> StratusResult<BTreeMap<String, String>> {
        self.policies.get(cache_name)?;
        if !self.is_enabled() {
            return Ok(BTreeMap::new());
        }

        self.bounded("snapshot", async {
            let mut conn = self.get_conn().await?;
            let keys = Self::matching_keys(&mut conn, cache_name).await?;
            if keys.is_empty() {
                return Ok(BTreeMap::new());
            }

            let values: Vec<Option<String>> = deadpool_redis::redis::cmd("MGET")
                .arg(&keys)
                .query_async(&mut conn)
                .await
                .map_err(|e| StratusError::Cache(format!("Failed to read keys: {}", e)))?;

            // Keys that expired between KEYS and MGET come back as nil
            Ok(keys
                .into_iter()
                .zip(values)
                .filter_map(|(storage_key, value)| {
                    let key = CacheKey::from_storage(&storage_key)?;
                    value.map(|v| (key.key().to_string(), v))
                })
                .collect())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TierPolicy;
    use tokio::net::TcpListener;

    fn policies() -> Arc<PolicyTable> {
        Arc::new(PolicyTable::new().with_policy(
            "currentTemp",
            TierPolicy {
                tier1_ttl: Duration::from_secs(1800),
                tier1_max_entries: 100,
                tier2_ttl: Duration::from_secs(300),
            },
        ))
    }

    #[tokio::test]
    async fn test_disabled_tier_always_misses() {
        let tier = RedisTier::disabled(policies());
        let key = CacheKey::new("currentTemp", "London,UK");

        assert!(!tier.is_enabled());
        tier.put(&key, "1").await.unwrap();
        assert!(tier.get(&key).await.unwrap().is_none());
        assert!(!tier.evict(&key).await.unwrap());
        assert_eq!(tier.clear("currentTemp").await.unwrap(), 0);
        assert!(tier.snapshot("currentTemp").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_tier_still_rejects_unknown_names() {
        let tier = RedisTier::disabled(policies());
        let key = CacheKey::new("dailyForecast", "London,UK");

        assert!(tier.get(&key).await.is_err());
        assert!(tier.put(&key, "1").await.is_err());
        assert!(tier.clear("dailyForecast").await.is_err());
    }

    #[tokio::test]
    async fn test_unresponsive_server_is_bounded() {
        // Accepts connections and never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let pool = create_pool(&format!("redis://{}", addr), 2).unwrap();
        let tier = RedisTier::new(Arc::new(pool), policies(), Duration::from_millis(100));
        let key = CacheKey::new("currentTemp", "London,UK");

        let started = std::time::Instant::now();
        let err = tier.get(&key).await.unwrap_err();

        assert!(matches!(err, StratusError::Cache(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(create_pool("not a url", 4).is_err());
    }
}
