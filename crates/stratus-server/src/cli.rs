//! Command-line interface.

use crate::app::App;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use stratus_core::{AccessRole, Caller, StratusResult};

#[derive(Parser)]
#[command(name = "stratus")]
#[command(about = "Cached, resilient weather lookups")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration directory
    #[arg(short, long, global = true, env = "STRATUS_CONFIG_DIR", default_value = "./config")]
    pub config_dir: String,

    /// Role of the caller
    #[arg(short, long, global = true, env = "STRATUS_ROLE", default_value = "reader")]
    pub role: RoleArg,

    /// Caller identity, used for logging
    #[arg(short, long, global = true, env = "STRATUS_SUBJECT", default_value = "cli")]
    pub subject: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Reader,
    Admin,
}

impl From<RoleArg> for AccessRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Reader => Self::Reader,
            RoleArg::Admin => Self::Admin,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TierArg {
    Tier1,
    Tier2,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Current conditions for a city
    Current(CityDateArgs),
    /// Hourly series of one day
    Hourly(CityDateArgs),
    /// Five-day, three-hour series
    Forecast {
        /// City, e.g. "London,UK"
        city: String,
    },
    /// Clear every purge target in both tiers (admin)
    Purge,
    /// Dump the contents of one tier (admin)
    Inspect {
        #[arg(value_enum)]
        tier: TierArg,
    },
    /// Show circuit breaker states (admin)
    Circuits,
    /// Show cache counters (admin)
    Stats,
}

#[derive(clap::Args, Debug, PartialEq, Eq)]
pub struct CityDateArgs {
    /// City, e.g. "London,UK"
    pub city: String,
    /// Date as YYYY-MM-DD; defaults to today (UTC)
    #[arg(short, long)]
    pub date: Option<NaiveDate>,
}

impl CityDateArgs {
    fn date_or_today(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Utc::now().date_naive())
    }
}

impl Cli {
    /// Returns the caller described by the global flags.
    pub fn caller(&self) -> Caller {
        Caller::new(self.subject.clone(), self.role.into())
    }

    /// Runs the command and returns its result as JSON.
    pub async fn execute(&self, app: &App) -> StratusResult<Value> {
        let caller = self.caller();

        match &self.command {
            Command::Current(args) => to_json(
                &app.weather
                    .get_current(&caller, &args.city, args.date_or_today())
                    .await?,
            ),
            Command::Hourly(args) => to_json(
                &app.weather
                    .get_short_range_series(&caller, &args.city, args.date_or_today())
                    .await?,
            ),
            Command::Forecast { city } => {
                to_json(&app.weather.get_extended_series(&caller, city).await?)
            }
            Command::Purge => to_json(&app.admin.purge(&caller).await?),
            Command::Inspect { tier: TierArg::Tier1 } => {
                to_json(&app.admin.inspect_tier1(&caller).await?)
            }
            Command::Inspect { tier: TierArg::Tier2 } => {
                to_json(&app.admin.inspect_tier2(&caller).await?)
            }
            Command::Circuits => to_json(&app.admin.circuit_status(&caller)?),
            Command::Stats => to_json(&app.admin.cache_stats(&caller)?),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> StratusResult<Value> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_app_with_fetcher;
    use async_trait::async_trait;
    use chrono::NaiveDateTime;
    use std::sync::Arc;
    use stratus_config::AppConfig;
    use stratus_core::{FetchError, StratusError};
    use stratus_service::{CurrentConditions, ForecastPoint, HourlyPoint, WeatherFetcher};

    struct StaticFetcher;

    fn noon() -> NaiveDateTime {
        Utc::now().date_naive().and_hms_opt(12, 0, 0).unwrap()
    }

    #[async_trait]
    impl WeatherFetcher for StaticFetcher {
        async fn fetch_current(&self, city: &str) -> Result<CurrentConditions, FetchError> {
            Ok(CurrentConditions::new(city, noon(), 21.0, 20.5, 40, "clear sky").unwrap())
        }

        async fn fetch_hourly(&self, _city: &str) -> Result<Vec<HourlyPoint>, FetchError> {
            Ok(vec![HourlyPoint::new(noon(), 21.0, 20.5, 40, "clear sky").unwrap()])
        }

        async fn fetch_five_day(&self, city: &str) -> Result<Vec<ForecastPoint>, FetchError> {
            Ok(vec![ForecastPoint::new(city, noon(), 21.0, 20.5, 40, "clear sky").unwrap()])
        }
    }

    fn app() -> App {
        let mut config = AppConfig::default();
        config.redis.enabled = false;
        build_app_with_fetcher(&config, Arc::new(StaticFetcher)).unwrap()
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("stratus").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_current_with_date() {
        let cli = parse(&["current", "London,UK", "--date", "2025-05-23"]);

        assert_eq!(
            cli.command,
            Command::Current(CityDateArgs {
                city: "London,UK".to_string(),
                date: NaiveDate::from_ymd_opt(2025, 5, 23),
            })
        );
        assert_eq!(cli.role, RoleArg::Reader);
    }

    #[test]
    fn test_parse_global_role_after_subcommand() {
        let cli = parse(&["inspect", "tier2", "--role", "admin"]);

        assert_eq!(cli.command, Command::Inspect { tier: TierArg::Tier2 });
        assert_eq!(cli.caller().role, AccessRole::Admin);
    }

    #[test]
    fn test_parse_rejects_bad_date() {
        let result = Cli::try_parse_from(["stratus", "hourly", "Paris,FR", "--date", "23/05/2025"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_current_then_stats() {
        let app = app();

        let current = parse(&["current", "London,UK"]).execute(&app).await.unwrap();
        assert_eq!(current["city"], "London,UK");
        assert_eq!(current["temperatureC"], 21.0);

        let stats = parse(&["stats", "--role", "admin"]).execute(&app).await.unwrap();
        assert!(stats.is_object());
    }

    #[tokio::test]
    async fn test_admin_commands_need_admin_role() {
        let app = app();

        let err = parse(&["purge"]).execute(&app).await.unwrap_err();
        assert!(matches!(err, StratusError::Forbidden(_)));

        let purged = parse(&["purge", "--role", "admin"]).execute(&app).await.unwrap();
        assert_eq!(purged, serde_json::json!(["currentTemp", "hourlyForecast"]));
    }

    #[tokio::test]
    async fn test_circuits_lists_every_operation() {
        let app = app();

        let circuits = parse(&["circuits", "-r", "admin"]).execute(&app).await.unwrap();
        let names: Vec<_> = circuits
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap().to_string())
            .collect();

        assert_eq!(names, vec!["current-conditions", "hourly-forecast", "five-day-forecast"]);
    }
}
