//! Upstream weather provider contract.

use crate::dto::{CurrentConditions, ForecastPoint, HourlyPoint};
use async_trait::async_trait;
use stratus_core::FetchError;

/// Fetches weather data from the upstream provider.
///
/// Every failure is classified as a [`FetchError`] so the resilience layer can
/// decide what to retry and what to count.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherFetcher: Send + Sync {
    /// Fetches current conditions for a city.
    async fn fetch_current(&self, city: &str) -> Result<CurrentConditions, FetchError>;

    /// Fetches the hourly series for a city, unfiltered and in upstream order.
    async fn fetch_hourly(&self, city: &str) -> Result<Vec<HourlyPoint>, FetchError>;

    /// Fetches the five-day, three-hour series for a city.
    async fn fetch_five_day(&self, city: &str) -> Result<Vec<ForecastPoint>, FetchError>;
}
