//! The cached-operation pipeline.
//!
//! Every weather read runs the same steps in order: validate, authorize,
//! derive the cache key, then read through the two-level cache with the
//! resilient upstream call as the loader.

use crate::dto::{DateWindow, WeatherRequest};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use stratus_cache::{CacheKey, TwoLevelCache};
use stratus_config::{ResilienceConfig, UpstreamConfig};
use stratus_core::{Caller, FetchError, Permission, StratusResult};
use stratus_resilience::{
    default_fallback, CircuitBreaker, CircuitBreakerConfig, Fallback, ResilientInvoker, RetryPolicy,
};
use tracing::debug;

/// Resource type reported when the provider does not know a city.
pub const CITY_RESOURCE: &str = "City";

/// Retry policy, breaker settings and fetch deadlines for the weather operations.
#[derive(Debug, Clone)]
pub struct ResilienceProfile {
    pub retry: RetryPolicy,
    pub breaker: CircuitBreakerConfig,
    /// Per-attempt deadline for current conditions.
    pub current_timeout: Duration,
    /// Per-attempt deadline for the hourly and five-day series.
    pub series_timeout: Duration,
}

impl Default for ResilienceProfile {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            breaker: CircuitBreakerConfig::default(),
            current_timeout: Duration::from_secs(2),
            series_timeout: Duration::from_secs(3),
        }
    }
}

impl ResilienceProfile {
    /// Builds the profile from configuration.
    #[must_use]
    pub fn from_config(resilience: &ResilienceConfig, upstream: &UpstreamConfig) -> Self {
        let retry = &resilience.retry;
        let breaker = &resilience.circuit_breaker;

        Self {
            retry: RetryPolicy {
                max_attempts: retry.max_attempts,
                base_delay: retry.base_delay(),
                max_delay: retry.max_delay(),
                multiplier: retry.multiplier,
                retry_on: retry.retry_on.iter().copied().collect(),
                jitter: retry.jitter,
            },
            breaker: CircuitBreakerConfig {
                sliding_window_size: breaker.sliding_window_size,
                minimum_calls: breaker.minimum_calls,
                failure_rate_threshold: breaker.failure_rate_threshold,
                open_duration: breaker.open_duration(),
                permitted_calls_in_half_open: breaker.permitted_calls_in_half_open,
                record_failures: breaker.record_failures.iter().copied().collect::<HashSet<_>>(),
            },
            current_timeout: upstream.current_timeout(),
            series_timeout: upstream.series_timeout(),
        }
    }
}

/// One logical weather operation bound to a cache name and its own breaker.
pub struct CachedOperation<P, T> {
    cache_name: &'static str,
    permission: Permission,
    cache: Arc<TwoLevelCache>,
    invoker: ResilientInvoker<P, T>,
}

impl<P, T> CachedOperation<P, T>
where
    P: WeatherRequest + 'static,
    T: Serialize + DeserializeOwned + 'static,
{
    /// Creates an operation with an explicit fallback.
    pub fn new(
        operation: &str,
        cache_name: &'static str,
        cache: Arc<TwoLevelCache>,
        retry: RetryPolicy,
        breaker: CircuitBreakerConfig,
        attempt_timeout: Duration,
        fallback: Fallback<P, T>,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(operation, breaker));
        Self {
            cache_name,
            permission: Permission::WeatherRead,
            cache,
            invoker: ResilientInvoker::new(operation, breaker, retry, attempt_timeout, fallback),
        }
    }

    /// Creates an operation using the standard fallback.
    pub fn with_default_fallback(
        operation: &str,
        cache_name: &'static str,
        cache: Arc<TwoLevelCache>,
        profile: &ResilienceProfile,
        attempt_timeout: Duration,
    ) -> Self {
        Self::new(
            operation,
            cache_name,
            cache,
            profile.retry.clone(),
            profile.breaker.clone(),
            attempt_timeout,
            default_fallback(operation, CITY_RESOURCE),
        )
    }

    /// Returns the operation name.
    pub fn operation(&self) -> &str {
        self.invoker.operation()
    }

    /// Returns the cache name results are stored under.
    pub fn cache_name(&self) -> &'static str {
        self.cache_name
    }

    /// Returns the breaker guarding this operation.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        self.invoker.breaker()
    }

    /// Runs the pipeline for one request.
    pub async fn run<F, Fut>(
        &self,
        caller: &Caller,
        request: &P,
        window: &DateWindow,
        fetch: F,
    ) -> StratusResult<T>
    where
        F: Fn(&P) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        request.check(window)?;
        caller.require_permission(self.permission)?;

        let key = CacheKey::new(self.cache_name, request.cache_key());
        debug!(
            operation = self.operation(),
            caller = %caller.subject,
            key = %key,
            "Running cached operation"
        );

        self.cache
            .get_or_compute_typed(&key, || self.invoker.call(request, fetch))
            .await
    }
}
