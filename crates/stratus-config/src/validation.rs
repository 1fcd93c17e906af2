//! Configuration validation module.
//!
//! Provides comprehensive validation for all configuration values,
//! failing fast on invalid configuration rather than at runtime.

use crate::AppConfig;
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    /// URL format is invalid.
    InvalidUrl { url_type: String, message: String },
    /// Upstream API key must be set in production.
    MissingApiKey,
    /// Pool size is zero.
    ZeroPoolSize,
    /// Pool size exceeds maximum allowed.
    PoolSizeTooLarge { value: u32, maximum: u32 },
    /// Timeout or TTL value must be positive.
    NonPositiveTimeout { name: String, value: u64 },
    /// A size or count must be at least one.
    ZeroSize { name: String },
    /// Two policies share a cache name.
    DuplicateCacheName { name: String },
    /// No policies configured.
    EmptyPolicyTable,
    /// Purge target has no policy.
    UnknownPurgeTarget { name: String },
    /// Failure rate threshold must lie in (0, 100].
    InvalidFailureRateThreshold { value: f64 },
    /// Minimum calls cannot exceed the window size.
    MinimumCallsExceedWindow { minimum_calls: usize, window: usize },
    /// Backoff multiplier must be at least 1.0.
    InvalidMultiplier { value: f64 },
    /// Maximum delay below base delay.
    MaxDelayBelowBase { base_ms: u64, max_ms: u64 },
    /// Log level is invalid.
    InvalidLogLevel { value: String },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { url_type, message } => {
                write!(f, "Invalid {} URL: {}", url_type, message)
            }
            Self::MissingApiKey => {
                write!(f, "Upstream API key is required in production")
            }
            Self::ZeroPoolSize => write!(f, "Redis pool size must be at least 1"),
            Self::PoolSizeTooLarge { value, maximum } => {
                write!(
                    f,
                    "Pool size {} exceeds maximum allowed ({})",
                    value, maximum
                )
            }
            Self::NonPositiveTimeout { name, value } => {
                write!(f, "Timeout '{}' must be positive, got {}", name, value)
            }
            Self::ZeroSize { name } => write!(f, "'{}' must be at least 1", name),
            Self::DuplicateCacheName { name } => {
                write!(f, "Cache policy '{}' is defined more than once", name)
            }
            Self::EmptyPolicyTable => write!(f, "At least one cache policy is required"),
            Self::UnknownPurgeTarget { name } => {
                write!(f, "Purge target '{}' has no cache policy", name)
            }
            Self::InvalidFailureRateThreshold { value } => {
                write!(
                    f,
                    "Invalid failure rate threshold: {} (must be in (0, 100])",
                    value
                )
            }
            Self::MinimumCallsExceedWindow {
                minimum_calls,
                window,
            } => {
                write!(
                    f,
                    "Minimum calls ({}) cannot exceed sliding window size ({})",
                    minimum_calls, window
                )
            }
            Self::InvalidMultiplier { value } => {
                write!(f, "Invalid backoff multiplier: {} (must be >= 1.0)", value)
            }
            Self::MaxDelayBelowBase { base_ms, max_ms } => {
                write!(
                    f,
                    "Maximum retry delay ({}ms) is below base delay ({}ms)",
                    max_ms, base_ms
                )
            }
            Self::InvalidLogLevel { value } => {
                write!(
                    f,
                    "Invalid log level: '{}' (valid: trace, debug, info, warn, error, off)",
                    value
                )
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Result of configuration validation containing all errors found.
#[derive(Debug)]
pub struct ValidationResult {
    errors: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Creates a new validation result.
    fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Adds an error to the result.
    fn add_error(&mut self, error: ConfigValidationError) {
        self.errors.push(error);
    }

    /// Records a non-positive timeout.
    fn require_positive(&mut self, name: &str, value: u64) {
        if value == 0 {
            self.add_error(ConfigValidationError::NonPositiveTimeout {
                name: name.to_string(),
                value,
            });
        }
    }

    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the validation errors.
    pub fn errors(&self) -> &[ConfigValidationError] {
        &self.errors
    }

    /// Converts to Result, returning Err with all errors if any exist.
    pub fn into_result(self) -> Result<(), Vec<ConfigValidationError>> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Maximum connection pool size.
    const MAX_POOL_SIZE: u32 = 1000;
    /// Valid log levels.
    const VALID_LOG_LEVELS: &'static [&'static str] =
        &["trace", "debug", "info", "warn", "error", "off"];

    /// Validates the entire application configuration.
    ///
    /// Returns Ok(()) if valid, or Err with all validation errors found.
    pub fn validate(config: &AppConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut result = ValidationResult::new();

        Self::validate_upstream(config, &mut result);
        Self::validate_redis(&config.redis, &mut result);
        Self::validate_cache(&config.cache, &mut result);
        Self::validate_resilience(&config.resilience, &mut result);
        Self::validate_forecast(&config.forecast, &mut result);
        Self::validate_observability(&config.observability, &mut result);

        result.into_result()
    }

    /// Validates upstream configuration.
    fn validate_upstream(config: &AppConfig, result: &mut ValidationResult) {
        let upstream = &config.upstream;

        match Url::parse(&upstream.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => result.add_error(ConfigValidationError::InvalidUrl {
                url_type: "upstream".to_string(),
                message: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => result.add_error(ConfigValidationError::InvalidUrl {
                url_type: "upstream".to_string(),
                message: format!("{}: {}", upstream.base_url, e),
            }),
        }

        if config.app.is_production() && upstream.api_key.trim().is_empty() {
            result.add_error(ConfigValidationError::MissingApiKey);
        }

        result.require_positive("upstream.current_timeout_ms", upstream.current_timeout_ms);
        result.require_positive("upstream.series_timeout_ms", upstream.series_timeout_ms);
        result.require_positive("upstream.connect_timeout_ms", upstream.connect_timeout_ms);
    }

    /// Validates Redis configuration.
    fn validate_redis(config: &crate::RedisConfig, result: &mut ValidationResult) {
        if !config.enabled {
            return;
        }

        // URL format validation
        if !config.url.starts_with("redis://") && !config.url.starts_with("rediss://") {
            result.add_error(ConfigValidationError::InvalidUrl {
                url_type: "redis".to_string(),
                message: "URL must start with redis:// or rediss://".to_string(),
            });
        }

        if config.pool_size == 0 {
            result.add_error(ConfigValidationError::ZeroPoolSize);
        } else if config.pool_size > Self::MAX_POOL_SIZE {
            result.add_error(ConfigValidationError::PoolSizeTooLarge {
                value: config.pool_size,
                maximum: Self::MAX_POOL_SIZE,
            });
        }

        result.require_positive("redis.op_timeout_ms", config.op_timeout_ms);
    }

    /// Validates the cache policy table.
    fn validate_cache(config: &crate::CacheConfig, result: &mut ValidationResult) {
        if config.policies.is_empty() {
            result.add_error(ConfigValidationError::EmptyPolicyTable);
        }

        let mut seen = HashSet::new();
        for policy in &config.policies {
            if !seen.insert(policy.name.as_str()) {
                result.add_error(ConfigValidationError::DuplicateCacheName {
                    name: policy.name.clone(),
                });
            }
            result.require_positive(
                &format!("cache.{}.tier1_ttl_secs", policy.name),
                policy.tier1_ttl_secs,
            );
            result.require_positive(
                &format!("cache.{}.tier2_ttl_secs", policy.name),
                policy.tier2_ttl_secs,
            );
            if policy.tier1_max_entries == 0 {
                result.add_error(ConfigValidationError::ZeroSize {
                    name: format!("cache.{}.tier1_max_entries", policy.name),
                });
            }
        }

        for target in &config.purge_targets {
            if !seen.contains(target.as_str()) {
                result.add_error(ConfigValidationError::UnknownPurgeTarget {
                    name: target.clone(),
                });
            }
        }
    }

    /// Validates retry and circuit breaker settings.
    fn validate_resilience(config: &crate::ResilienceConfig, result: &mut ValidationResult) {
        let retry = &config.retry;
        if retry.max_attempts == 0 {
            result.add_error(ConfigValidationError::ZeroSize {
                name: "resilience.retry.max_attempts".to_string(),
            });
        }
        if retry.multiplier < 1.0 || !retry.multiplier.is_finite() {
            result.add_error(ConfigValidationError::InvalidMultiplier {
                value: retry.multiplier,
            });
        }
        if retry.max_delay_ms < retry.base_delay_ms {
            result.add_error(ConfigValidationError::MaxDelayBelowBase {
                base_ms: retry.base_delay_ms,
                max_ms: retry.max_delay_ms,
            });
        }

        let breaker = &config.circuit_breaker;
        if breaker.sliding_window_size == 0 {
            result.add_error(ConfigValidationError::ZeroSize {
                name: "resilience.circuit_breaker.sliding_window_size".to_string(),
            });
        }
        if breaker.minimum_calls == 0 {
            result.add_error(ConfigValidationError::ZeroSize {
                name: "resilience.circuit_breaker.minimum_calls".to_string(),
            });
        } else if breaker.minimum_calls > breaker.sliding_window_size {
            result.add_error(ConfigValidationError::MinimumCallsExceedWindow {
                minimum_calls: breaker.minimum_calls,
                window: breaker.sliding_window_size,
            });
        }
        if !(breaker.failure_rate_threshold > 0.0 && breaker.failure_rate_threshold <= 100.0) {
            result.add_error(ConfigValidationError::InvalidFailureRateThreshold {
                value: breaker.failure_rate_threshold,
            });
        }
        if breaker.permitted_calls_in_half_open == 0 {
            result.add_error(ConfigValidationError::ZeroSize {
                name: "resilience.circuit_breaker.permitted_calls_in_half_open".to_string(),
            });
        }
        result.require_positive(
            "resilience.circuit_breaker.open_duration_ms",
            breaker.open_duration_ms,
        );
    }

    /// Validates forecast limits.
    fn validate_forecast(config: &crate::ForecastConfig, result: &mut ValidationResult) {
        if config.max_extended_points == 0 {
            result.add_error(ConfigValidationError::ZeroSize {
                name: "forecast.max_extended_points".to_string(),
            });
        }
    }

    /// Validates observability configuration.
    ///
    /// Accepts env-filter directives such as `info,stratus=debug`.
    fn validate_observability(
        config: &stratus_core::TelemetryConfig,
        result: &mut ValidationResult,
    ) {
        let all_valid = config.log_level.split(',').all(|directive| {
            let level = directive
                .rsplit_once('=')
                .map_or(directive, |(_, level)| level)
                .trim()
                .to_lowercase();
            Self::VALID_LOG_LEVELS.contains(&level.as_str())
        });

        if !all_valid {
            result.add_error(ConfigValidationError::InvalidLogLevel {
                value: config.log_level.clone(),
            });
        }
    }
}

/// Formats validation errors for display.
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    let mut output = String::from("Configuration validation failed:\n");
    for (i, error) in errors.iter().enumerate() {
        output.push_str(&format!("  {}. {}\n", i + 1, error));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CachePolicyConfig, CURRENT_TEMP_CACHE};

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.upstream.api_key = "test-key".to_string();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(ConfigValidator::validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_api_key_only_in_production() {
        let mut config = valid_config();
        config.upstream.api_key = String::new();
        assert!(ConfigValidator::validate(&config).is_ok());

        config.app.environment = "production".to_string();
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors, vec![ConfigValidationError::MissingApiKey]);
    }

    #[test]
    fn test_invalid_upstream_url() {
        let mut config = valid_config();
        config.upstream.base_url = "not a url".to_string();
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(matches!(
            &errors[0],
            ConfigValidationError::InvalidUrl { url_type, .. } if url_type == "upstream"
        ));

        config.upstream.base_url = "ftp://weather.example".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_invalid_redis_url() {
        let mut config = valid_config();
        config.redis.url = "http://localhost:6379".to_string();
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(matches!(
            &errors[0],
            ConfigValidationError::InvalidUrl { url_type, .. } if url_type == "redis"
        ));

        config.redis.enabled = false;
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = valid_config();
        config.cache.policies[0].tier2_ttl_secs = 0;
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(matches!(
            &errors[0],
            ConfigValidationError::NonPositiveTimeout { name, .. } if name.contains("tier2_ttl_secs")
        ));
    }

    #[test]
    fn test_duplicate_cache_name() {
        let mut config = valid_config();
        config.cache.policies.push(CachePolicyConfig {
            name: CURRENT_TEMP_CACHE.to_string(),
            tier1_ttl_secs: 1,
            tier1_max_entries: 1,
            tier2_ttl_secs: 1,
        });
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ConfigValidationError::DuplicateCacheName {
                name: CURRENT_TEMP_CACHE.to_string()
            }]
        );
    }

    #[test]
    fn test_unknown_purge_target() {
        let mut config = valid_config();
        config.cache.purge_targets.push("dailyForecast".to_string());
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ConfigValidationError::UnknownPurgeTarget {
                name: "dailyForecast".to_string()
            }]
        );
    }

    #[test]
    fn test_invalid_failure_rate_threshold() {
        let mut config = valid_config();
        config.resilience.circuit_breaker.failure_rate_threshold = 0.0;
        assert!(ConfigValidator::validate(&config).is_err());

        config.resilience.circuit_breaker.failure_rate_threshold = 100.0;
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_minimum_calls_exceed_window() {
        let mut config = valid_config();
        config.resilience.circuit_breaker.minimum_calls = 5;
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ConfigValidationError::MinimumCallsExceedWindow {
                minimum_calls: 5,
                window: 2
            }]
        );
    }

    #[test]
    fn test_invalid_retry_settings() {
        let mut config = valid_config();
        config.resilience.retry.multiplier = 0.5;
        config.resilience.retry.max_delay_ms = 100;
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_log_level_directives() {
        let mut config = valid_config();
        config.observability.log_level = "warn,stratus_cache=trace".to_string();
        assert!(ConfigValidator::validate(&config).is_ok());

        config.observability.log_level = "verbose".to_string();
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(matches!(errors[0], ConfigValidationError::InvalidLogLevel { .. }));
    }

    #[test]
    fn test_multiple_errors() {
        let mut config = valid_config();
        config.redis.pool_size = 0;
        config.forecast.max_extended_points = 0;
        config.upstream.current_timeout_ms = 0;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_format_validation_errors() {
        let errors = vec![
            ConfigValidationError::ZeroPoolSize,
            ConfigValidationError::InvalidFailureRateThreshold { value: 150.0 },
        ];
        let formatted = format_validation_errors(&errors);
        assert!(formatted.contains("1. Redis pool size"));
        assert!(formatted.contains("2. Invalid failure rate threshold"));
    }
}
