//! Application configuration structures.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use stratus_core::{FailureKind, TelemetryConfig};

/// Cache name for current conditions.
pub const CURRENT_TEMP_CACHE: &str = "currentTemp";
/// Cache name for the hourly series.
pub const HOURLY_FORECAST_CACHE: &str = "hourlyForecast";
/// Cache name for the five-day series.
pub const FIVE_DAYS_FORECAST_CACHE: &str = "fiveDaysForecast";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Application name and metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// Upstream weather provider.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Redis (Tier-2) configuration.
    #[serde(default)]
    pub redis: RedisConfig,

    /// Per-cache tier policies.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Retry and circuit breaker configuration.
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Forecast request limits.
    #[serde(default)]
    pub forecast: ForecastConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: TelemetryConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMetadata {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Environment (development, staging, production).
    pub environment: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "stratus".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

impl AppMetadata {
    /// Returns true when running in production.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Upstream weather provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the provider.
    pub base_url: String,
    /// API key sent as `appid`.
    pub api_key: String,
    /// Deadline for current-conditions calls, in milliseconds.
    pub current_timeout_ms: u64,
    /// Deadline for series calls, in milliseconds.
    pub series_timeout_ms: u64,
    /// TCP connect timeout, in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openweathermap.org".to_string(),
            api_key: String::new(),
            current_timeout_ms: 2000,
            series_timeout_ms: 3000,
            connect_timeout_ms: 1000,
        }
    }
}

impl UpstreamConfig {
    /// Returns the current-conditions deadline as a Duration.
    #[must_use]
    pub const fn current_timeout(&self) -> Duration {
        Duration::from_millis(self.current_timeout_ms)
    }

    /// Returns the series deadline as a Duration.
    #[must_use]
    pub const fn series_timeout(&self) -> Duration {
        Duration::from_millis(self.series_timeout_ms)
    }

    /// Returns the connect timeout as a Duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Redis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis URL.
    pub url: String,
    /// Connection pool size.
    pub pool_size: u32,
    /// Enable Redis (can be disabled for local development).
    pub enabled: bool,
    /// Deadline for a single Tier-2 operation, in milliseconds.
    pub op_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            enabled: true,
            op_timeout_ms: 250,
        }
    }
}

impl RedisConfig {
    /// Returns the per-operation timeout as a Duration.
    #[must_use]
    pub const fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

/// Tier policy for one cache name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicyConfig {
    /// Logical cache name.
    pub name: String,
    /// Tier-1 time to live, in seconds.
    pub tier1_ttl_secs: u64,
    /// Tier-1 maximum entry count.
    pub tier1_max_entries: usize,
    /// Tier-2 time to live, in seconds.
    pub tier2_ttl_secs: u64,
}

impl CachePolicyConfig {
    /// Returns the Tier-1 TTL as a Duration.
    #[must_use]
    pub const fn tier1_ttl(&self) -> Duration {
        Duration::from_secs(self.tier1_ttl_secs)
    }

    /// Returns the Tier-2 TTL as a Duration.
    #[must_use]
    pub const fn tier2_ttl(&self) -> Duration {
        Duration::from_secs(self.tier2_ttl_secs)
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// One policy per cache name.
    pub policies: Vec<CachePolicyConfig>,
    /// Cache names cleared by a purge. The five-day series is kept by default.
    pub purge_targets: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let policy = |name: &str, tier2_ttl_secs| CachePolicyConfig {
            name: name.to_string(),
            tier1_ttl_secs: 30 * 60,
            tier1_max_entries: 10_000,
            tier2_ttl_secs,
        };

        Self {
            policies: vec![
                policy(CURRENT_TEMP_CACHE, 5 * 60),
                policy(HOURLY_FORECAST_CACHE, 60 * 60),
                policy(FIVE_DAYS_FORECAST_CACHE, 6 * 60 * 60),
            ],
            purge_targets: vec![
                CURRENT_TEMP_CACHE.to_string(),
                HOURLY_FORECAST_CACHE.to_string(),
            ],
        }
    }
}

impl CacheConfig {
    /// Returns the policy for a cache name.
    #[must_use]
    pub fn policy(&self, name: &str) -> Option<&CachePolicyConfig> {
        self.policies.iter().find(|p| p.name == name)
    }
}

/// Retry and circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Retry policy shared by all operations.
    pub retry: RetrySettings,
    /// Circuit breaker settings applied to each operation's breaker.
    pub circuit_breaker: CircuitBreakerSettings,
}

/// Retry policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// Delay cap, in milliseconds.
    pub max_delay_ms: u64,
    /// Failure kinds that are retried.
    pub retry_on: Vec<FailureKind>,
    /// Add random jitter to delays.
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            multiplier: 2.0,
            max_delay_ms: 2000,
            retry_on: FailureKind::all()
                .into_iter()
                .filter(FailureKind::is_retryable_by_default)
                .collect(),
            jitter: false,
        }
    }
}

impl RetrySettings {
    /// Returns the base delay as a Duration.
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Returns the delay cap as a Duration.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Number of recent outcomes considered.
    pub sliding_window_size: usize,
    /// Outcomes required before the failure rate is evaluated.
    pub minimum_calls: usize,
    /// Failure rate, in percent, at which the breaker opens.
    pub failure_rate_threshold: f64,
    /// Time spent open before trial calls, in milliseconds.
    pub open_duration_ms: u64,
    /// Trial calls admitted while half-open.
    pub permitted_calls_in_half_open: u32,
    /// Failure kinds recorded in the window.
    pub record_failures: Vec<FailureKind>,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            sliding_window_size: 2,
            minimum_calls: 2,
            failure_rate_threshold: 100.0,
            open_duration_ms: 10_000,
            permitted_calls_in_half_open: 1,
            record_failures: FailureKind::all()
                .into_iter()
                .filter(FailureKind::counts_as_failure_by_default)
                .collect(),
        }
    }
}

impl CircuitBreakerSettings {
    /// Returns the open duration as a Duration.
    #[must_use]
    pub const fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }
}

/// Forecast request limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Latest accepted date, in days after today (UTC).
    pub max_days_ahead: u32,
    /// Maximum points returned by the five-day series.
    pub max_extended_points: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            max_days_ahead: 5,
            max_extended_points: 40,
        }
    }
}
