//! Configuration loader with layered sources.

use crate::validation::{format_validation_errors, ConfigValidator};
use crate::AppConfig;
use config::{Config, ConfigError, Environment, File};
use std::path::Path;
use stratus_core::StratusError;
use tracing::{debug, info, warn};

/// Configuration loader with layered sources.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: AppConfig,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `config/default.toml` - Default values
    /// 2. `config/{environment}.toml` - Environment-specific overrides
    /// 3. `config/local.toml` - Local overrides
    /// 4. Environment variables with `STRATUS__` prefix
    pub fn new(config_dir: impl AsRef<str>) -> Result<Self, StratusError> {
        let config = Self::load_config(config_dir.as_ref())?;
        Ok(Self { config })
    }

    /// Returns the loaded configuration.
    pub fn get(&self) -> &AppConfig {
        &self.config
    }

    /// Loads configuration from the specified directory.
    fn load_config(config_dir: &str) -> Result<AppConfig, StratusError> {
        // Load .env file if present
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment =
            std::env::var("STRATUS_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        info!("Loading configuration for environment: {}", environment);

        let mut builder = Config::builder();

        // 1. Load default configuration
        let default_path = format!("{}/default.toml", config_dir);
        if Path::new(&default_path).exists() {
            debug!("Loading default config from: {}", default_path);
            builder = builder.add_source(File::with_name(&default_path).required(false));
        }

        // 2. Load environment-specific configuration
        let env_path = format!("{}/{}.toml", config_dir, environment);
        if Path::new(&env_path).exists() {
            debug!("Loading environment config from: {}", env_path);
            builder = builder.add_source(File::with_name(&env_path).required(false));
        }

        // 3. Load local overrides (not committed to version control)
        let local_path = format!("{}/local.toml", config_dir);
        if Path::new(&local_path).exists() {
            debug!("Loading local config from: {}", local_path);
            builder = builder.add_source(File::with_name(&local_path).required(false));
        }

        // 4. Override with environment variables (STRATUS__ prefix)
        builder = builder.add_source(
            Environment::with_prefix("STRATUS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_error_to_stratus_error)?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(config_error_to_stratus_error)?;

        Self::validate_config(&app_config)?;

        Ok(app_config)
    }

    /// Validates the configuration, reporting every problem at once.
    fn validate_config(config: &AppConfig) -> Result<(), StratusError> {
        if !config.redis.enabled {
            warn!("Redis is disabled, serving from Tier-1 only");
        }

        ConfigValidator::validate(config)
            .map_err(|errors| StratusError::Configuration(format_validation_errors(&errors)))
    }
}

fn config_error_to_stratus_error(err: ConfigError) -> StratusError {
    StratusError::Configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CURRENT_TEMP_CACHE;
    use std::fs;
    use std::time::Duration;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) {
        fs::write(dir.path().join(name), contents).unwrap();
    }

    fn dir_str(dir: &tempfile::TempDir) -> String {
        dir.path().to_string_lossy().into_owned()
    }

    #[test]
    fn test_loads_defaults_from_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir_str(&dir)).unwrap();
        let config = loader.get();

        assert_eq!(config.upstream.current_timeout(), Duration::from_secs(2));
        assert_eq!(config.forecast.max_days_ahead, 5);
        assert_eq!(config.cache.policies.len(), 3);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir,
            "default.toml",
            r#"
[upstream]
base_url = "http://localhost:9000"
api_key = "test-key"

[resilience.retry]
max_attempts = 5

[cache]
purge_targets = ["currentTemp"]

[[cache.policies]]
name = "currentTemp"
tier1_ttl_secs = 60
tier1_max_entries = 100
tier2_ttl_secs = 120
"#,
        );

        let loader = ConfigLoader::new(dir_str(&dir)).unwrap();
        let config = loader.get();

        assert_eq!(config.upstream.base_url, "http://localhost:9000");
        assert_eq!(config.resilience.retry.max_attempts, 5);
        assert_eq!(config.resilience.retry.base_delay_ms, 500);
        assert_eq!(config.cache.policies.len(), 1);
        let policy = config.cache.policy(CURRENT_TEMP_CACHE).unwrap();
        assert_eq!(policy.tier1_max_entries, 100);
        assert_eq!(policy.tier2_ttl(), Duration::from_secs(120));
    }

    #[test]
    fn test_local_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "default.toml", "[forecast]\nmax_days_ahead = 3\n");
        write(&dir, "local.toml", "[forecast]\nmax_days_ahead = 4\n");

        let loader = ConfigLoader::new(dir_str(&dir)).unwrap();
        assert_eq!(loader.get().forecast.max_days_ahead, 4);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir,
            "default.toml",
            "[resilience.circuit_breaker]\nfailure_rate_threshold = 150.0\n",
        );

        let err = ConfigLoader::new(dir_str(&dir)).err().unwrap();
        assert!(matches!(err, StratusError::Configuration(_)));
        assert!(err.to_string().contains("failure rate threshold"));
    }
}
