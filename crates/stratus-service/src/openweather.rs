//! HTTP fetcher for the OpenWeather API.

use crate::dto::{CurrentConditions, ForecastPoint, HourlyPoint};
use crate::fetcher::WeatherFetcher;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use stratus_config::UpstreamConfig;
use stratus_core::{FetchError, StratusError, StratusResult};
use tracing::{debug, info};

/// Description used when the provider sends no weather entry.
const NO_DESCRIPTION: &str = "n/a";

/// `dt_txt` format of the five-day endpoint.
const FORECAST_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// OpenWeather client.
///
/// Requests carry `units=metric` and the configured API key as `appid`.
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
    current_timeout: Duration,
    series_timeout: Duration,
}

impl OpenWeatherClient {
    /// Creates a client from the upstream configuration.
    pub fn new(config: &UpstreamConfig) -> StratusResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| StratusError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            current_timeout: config.current_timeout(),
            series_timeout: config.series_timeout(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<T, FetchError> {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_transport_error(&e, timeout))?;

        handle_response(response, timeout).await
    }

    async fn geocode(&self, city: &str) -> Result<GeoResponse, FetchError> {
        let matches: Vec<GeoResponse> = self
            .get_json(
                "/geo/1.0/direct",
                &[("q", city.to_string()), ("limit", "1".to_string())],
                self.series_timeout,
            )
            .await?;

        matches
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::NotFound(city.to_string()))
    }
}

#[async_trait]
impl WeatherFetcher for OpenWeatherClient {
    async fn fetch_current(&self, city: &str) -> Result<CurrentConditions, FetchError> {
        info!("Fetching current conditions for {}", city);

        let resp: WeatherResponse = self
            .get_json(
                "/data/2.5/weather",
                &[("q", city.to_string()), ("units", "metric".to_string())],
                self.current_timeout,
            )
            .await?;

        CurrentConditions::new(
            city,
            from_epoch(resp.dt)?,
            resp.main.temp,
            resp.main.feels_like,
            resp.main.humidity,
            first_description(&resp.weather),
        )
        .map_err(malformed)
    }

    async fn fetch_hourly(&self, city: &str) -> Result<Vec<HourlyPoint>, FetchError> {
        info!("Fetching hourly series for {}", city);

        let geo = self.geocode(city).await?;
        debug!("Geocoded {} to ({}, {})", city, geo.lat, geo.lon);

        let resp: OneCallResponse = self
            .get_json(
                "/data/2.5/onecall",
                &[
                    ("lat", geo.lat.to_string()),
                    ("lon", geo.lon.to_string()),
                    ("exclude", "current,minutely,daily,alerts".to_string()),
                    ("units", "metric".to_string()),
                ],
                self.series_timeout,
            )
            .await?;

        resp.hourly
            .into_iter()
            .map(|hour| {
                HourlyPoint::new(
                    from_epoch(hour.dt)?,
                    hour.temp,
                    hour.feels_like,
                    hour.humidity,
                    first_description(&hour.weather),
                )
                .map_err(malformed)
            })
            .collect()
    }

    async fn fetch_five_day(&self, city: &str) -> Result<Vec<ForecastPoint>, FetchError> {
        info!("Fetching five-day series for {}", city);

        let resp: ForecastResponse = self
            .get_json(
                "/data/2.5/forecast",
                &[("q", city.to_string()), ("units", "metric".to_string())],
                self.series_timeout,
            )
            .await?;

        resp.list
            .into_iter()
            .map(|item| {
                let at = NaiveDateTime::parse_from_str(&item.dt_txt, FORECAST_TIME_FORMAT)
                    .map_err(|e| {
                        FetchError::malformed(format!("Invalid dt_txt '{}': {}", item.dt_txt, e))
                    })?;
                ForecastPoint::new(
                    city,
                    at,
                    item.main.temp,
                    item.main.feels_like,
                    item.main.humidity,
                    first_description(&item.weather),
                )
                .map_err(malformed)
            })
            .collect()
    }
}

async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
    timeout: Duration,
) -> Result<T, FetchError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(map_http_error(status, &body));
    }

    let body = response
        .text()
        .await
        .map_err(|e| map_transport_error(&e, timeout))?;

    serde_json::from_str(&body)
        .map_err(|e| FetchError::malformed(format!("JSON parse error: {}", e)))
}

/// Classifies a non-success status.
fn map_http_error(status: StatusCode, body: &str) -> FetchError {
    match status {
        StatusCode::NOT_FOUND => FetchError::NotFound(body.to_string()),
        StatusCode::UNAUTHORIZED => FetchError::Unauthorized(body.to_string()),
        s if s.is_client_error() => FetchError::ClientError {
            status: s.as_u16(),
            message: body.to_string(),
        },
        s => FetchError::ServerError {
            status: s.as_u16(),
            message: body.to_string(),
        },
    }
}

fn map_transport_error(err: &reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Network(err.to_string())
    }
}

fn malformed(err: StratusError) -> FetchError {
    FetchError::malformed(format!("Invalid record from provider: {}", err))
}

fn from_epoch(dt: i64) -> Result<NaiveDateTime, FetchError> {
    DateTime::from_timestamp(dt, 0)
        .map(|at| at.naive_utc())
        .ok_or_else(|| FetchError::malformed(format!("Timestamp out of range: {}", dt)))
}

fn first_description(weather: &[Weather]) -> &str {
    weather
        .first()
        .map_or(NO_DESCRIPTION, |w| w.description.as_str())
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    dt: i64,
    main: Main,
    #[serde(default)]
    weather: Vec<Weather>,
}

#[derive(Debug, Deserialize)]
struct Main {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct Weather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OneCallResponse {
    #[serde(default)]
    hourly: Vec<OneCallHour>,
}

#[derive(Debug, Deserialize)]
struct OneCallHour {
    dt: i64,
    temp: f64,
    feels_like: f64,
    humidity: u8,
    #[serde(default)]
    weather: Vec<Weather>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Vec<ForecastItem>,
}

#[derive(Debug, Deserialize)]
struct ForecastItem {
    main: Main,
    #[serde(default)]
    weather: Vec<Weather>,
    dt_txt: String,
}
