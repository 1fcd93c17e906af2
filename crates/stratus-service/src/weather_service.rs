//! Weather reads through the cache and the resilience layer.

use crate::dto::{
    CurrentConditions, CurrentRequest, DateWindow, ExtendedRequest, ForecastPoint, HourlyPoint,
    HourlyRequest,
};
use crate::fetcher::WeatherFetcher;
use crate::operation::{CachedOperation, ResilienceProfile};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use stratus_cache::TwoLevelCache;
use stratus_config::{
    ForecastConfig, CURRENT_TEMP_CACHE, FIVE_DAYS_FORECAST_CACHE, HOURLY_FORECAST_CACHE,
};
use stratus_core::{Caller, StratusResult};
use stratus_resilience::CircuitBreaker;
use tracing::debug;

/// Operation name of current-conditions reads.
pub const CURRENT_OPERATION: &str = "current-conditions";
/// Operation name of hourly series reads.
pub const HOURLY_OPERATION: &str = "hourly-forecast";
/// Operation name of five-day series reads.
pub const EXTENDED_OPERATION: &str = "five-day-forecast";

/// Source of "today" for the date window.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Weather service.
///
/// Each read has its own cache name and circuit breaker; see
/// [`CachedOperation::run`] for the pipeline.
pub struct WeatherService {
    fetcher: Arc<dyn WeatherFetcher>,
    current: CachedOperation<CurrentRequest, CurrentConditions>,
    hourly: CachedOperation<HourlyRequest, Vec<HourlyPoint>>,
    extended: CachedOperation<ExtendedRequest, Vec<ForecastPoint>>,
    limits: ForecastConfig,
    clock: Clock,
}

impl WeatherService {
    /// Creates a new weather service.
    pub fn new(
        fetcher: Arc<dyn WeatherFetcher>,
        cache: Arc<TwoLevelCache>,
        profile: &ResilienceProfile,
        limits: ForecastConfig,
    ) -> Self {
        Self {
            fetcher,
            current: CachedOperation::with_default_fallback(
                CURRENT_OPERATION,
                CURRENT_TEMP_CACHE,
                Arc::clone(&cache),
                profile,
                profile.current_timeout,
            ),
            hourly: CachedOperation::with_default_fallback(
                HOURLY_OPERATION,
                HOURLY_FORECAST_CACHE,
                Arc::clone(&cache),
                profile,
                profile.series_timeout,
            ),
            extended: CachedOperation::with_default_fallback(
                EXTENDED_OPERATION,
                FIVE_DAYS_FORECAST_CACHE,
                cache,
                profile,
                profile.series_timeout,
            ),
            limits,
            clock: Arc::new(|| Utc::now().date_naive()),
        }
    }

    /// Replaces the UTC clock used for the date window.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Returns the breakers of all operations.
    pub fn breakers(&self) -> Vec<Arc<CircuitBreaker>> {
        vec![
            Arc::clone(self.current.breaker()),
            Arc::clone(self.hourly.breaker()),
            Arc::clone(self.extended.breaker()),
        ]
    }

    fn window(&self) -> DateWindow {
        DateWindow::new((self.clock)(), self.limits.max_days_ahead)
    }

    /// Gets current conditions for a city.
    ///
    /// `date` must lie within the accepted window even though the provider
    /// only reports the present.
    pub async fn get_current(
        &self,
        caller: &Caller,
        city: &str,
        date: NaiveDate,
    ) -> StratusResult<CurrentConditions> {
        debug!("Getting current conditions: {}", city);

        let request = CurrentRequest {
            city: city.to_string(),
            date,
        };
        let fetcher = &self.fetcher;

        self.current
            .run(caller, &request, &self.window(), |req: &CurrentRequest| {
                let fetcher = Arc::clone(fetcher);
                let city = req.city.clone();
                async move { fetcher.fetch_current(&city).await }
            })
            .await
    }

    /// Gets the hourly series of one day, sorted by time.
    pub async fn get_short_range_series(
        &self,
        caller: &Caller,
        city: &str,
        date: NaiveDate,
    ) -> StratusResult<Vec<HourlyPoint>> {
        debug!("Getting hourly series: {} on {}", city, date);

        let request = HourlyRequest {
            city: city.to_string(),
            date,
        };
        let fetcher = &self.fetcher;

        self.hourly
            .run(caller, &request, &self.window(), |req: &HourlyRequest| {
                let fetcher = Arc::clone(fetcher);
                let city = req.city.clone();
                let date = req.date;
                async move {
                    let mut points = fetcher.fetch_hourly(&city).await?;
                    points.retain(|p| p.at.date() == date);
                    points.sort_by_key(|p| p.at);
                    Ok(points)
                }
            })
            .await
    }

    /// Gets the five-day series, sorted by time and capped.
    pub async fn get_extended_series(
        &self,
        caller: &Caller,
        city: &str,
    ) -> StratusResult<Vec<ForecastPoint>> {
        debug!("Getting five-day series: {}", city);

        let request = ExtendedRequest {
            city: city.to_string(),
        };
        let fetcher = &self.fetcher;
        let max_points = self.limits.max_extended_points;

        self.extended
            .run(caller, &request, &self.window(), |req: &ExtendedRequest| {
                let fetcher = Arc::clone(fetcher);
                let city = req.city.clone();
                async move {
                    let mut points = fetcher.fetch_five_day(&city).await?;
                    points.sort_by_key(|p| p.at);
                    points.truncate(max_points);
                    Ok(points)
                }
            })
            .await
    }
}
