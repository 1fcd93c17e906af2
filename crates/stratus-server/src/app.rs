//! Application wiring.

use std::sync::Arc;
use stratus_cache::{create_pool, MemoryTier, PolicyTable, RedisTier, TierPolicy, TwoLevelCache};
use stratus_config::{AppConfig, CacheConfig, RedisConfig};
use stratus_core::StratusResult;
use stratus_service::{
    CacheAdmin, OpenWeatherClient, ResilienceProfile, WeatherFetcher, WeatherService,
};
use tracing::info;

/// The assembled application.
pub struct App {
    pub weather: WeatherService,
    pub admin: CacheAdmin,
    pub cache: Arc<TwoLevelCache>,
}

/// Builds the policy table from the cache configuration.
pub fn policy_table(config: &CacheConfig) -> PolicyTable {
    config
        .policies
        .iter()
        .fold(PolicyTable::new(), |table, policy| {
            table.with_policy(
                policy.name.clone(),
                TierPolicy {
                    tier1_ttl: policy.tier1_ttl(),
                    tier1_max_entries: policy.tier1_max_entries,
                    tier2_ttl: policy.tier2_ttl(),
                },
            )
        })
}

fn redis_tier(config: &RedisConfig, policies: Arc<PolicyTable>) -> StratusResult<RedisTier> {
    if !config.enabled {
        return Ok(RedisTier::disabled(policies));
    }

    let pool = create_pool(&config.url, config.pool_size as usize)?;
    Ok(RedisTier::new(Arc::new(pool), policies, config.op_timeout()))
}

/// Builds the application against the configured upstream.
pub fn build_app(config: &AppConfig) -> StratusResult<App> {
    let fetcher: Arc<dyn WeatherFetcher> = Arc::new(OpenWeatherClient::new(&config.upstream)?);
    build_app_with_fetcher(config, fetcher)
}

/// Builds the application around a given fetcher.
pub fn build_app_with_fetcher(
    config: &AppConfig,
    fetcher: Arc<dyn WeatherFetcher>,
) -> StratusResult<App> {
    stratus_cache::register_metrics();
    stratus_resilience::metrics::register_metrics();

    let policies = Arc::new(policy_table(&config.cache));
    let tier1 = Arc::new(MemoryTier::new(Arc::clone(&policies))?);
    let tier2 = Arc::new(redis_tier(&config.redis, Arc::clone(&policies))?);
    let tier2_enabled = tier2.is_enabled();
    let cache = Arc::new(TwoLevelCache::new(Arc::clone(&policies), tier1, tier2));

    let profile = ResilienceProfile::from_config(&config.resilience, &config.upstream);
    let weather = WeatherService::new(
        fetcher,
        Arc::clone(&cache),
        &profile,
        config.forecast.clone(),
    );
    let admin = CacheAdmin::new(
        Arc::clone(&cache),
        config.cache.purge_targets.clone(),
        weather.breakers(),
    );

    info!(
        caches = ?policies.names(),
        tier2_enabled,
        "Application assembled"
    );

    Ok(App {
        weather,
        admin,
        cache,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_config::CURRENT_TEMP_CACHE;
    use stratus_core::Caller;
    use std::time::Duration;

    fn offline_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.redis.enabled = false;
        config
    }

    #[test]
    fn test_policy_table_from_config() {
        let table = policy_table(&CacheConfig::default());

        assert_eq!(table.names().len(), 3);
        let current = table.get(CURRENT_TEMP_CACHE).unwrap();
        assert_eq!(current.tier1_ttl, Duration::from_secs(1800));
        assert_eq!(current.tier2_ttl, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_build_app_without_redis() {
        let app = build_app(&offline_config()).unwrap();
        let root = Caller::admin("root");

        let circuits = app.admin.circuit_status(&root).unwrap();
        assert_eq!(circuits.len(), 3);

        let purged = app.admin.purge(&root).await.unwrap();
        assert_eq!(purged, vec!["currentTemp", "hourlyForecast"]);

        let tier2 = app.admin.inspect_tier2(&root).await.unwrap();
        assert!(tier2.values().all(|entries| entries.is_empty()));
    }

    #[tokio::test]
    async fn test_build_app_with_lazy_redis_pool() {
        let mut config = AppConfig::default();
        config.redis.url = "redis://127.0.0.1:1".to_string();

        assert!(build_app(&config).is_ok());
    }
}
