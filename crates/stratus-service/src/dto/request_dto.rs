//! Weather requests and their validation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use stratus_core::rules::{not_blank, within_days_ahead};
use stratus_core::{StratusError, StratusResult, ValidateExt};
use validator::Validate;

/// Accepted request dates: `[today, today + max_days_ahead]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub today: NaiveDate,
    pub max_days_ahead: u32,
}

impl DateWindow {
    /// Creates a window starting at `today`.
    #[must_use]
    pub fn new(today: NaiveDate, max_days_ahead: u32) -> Self {
        Self {
            today,
            max_days_ahead,
        }
    }

    /// Rejects dates outside the window.
    pub fn check(&self, date: NaiveDate) -> StratusResult<()> {
        within_days_ahead(date, self.today, self.max_days_ahead).map_err(|e| {
            let message = e.message.map_or_else(|| e.code.to_string(), |m| m.to_string());
            StratusError::validation(format!("date: {}", message))
        })
    }
}

/// Request for current conditions.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CurrentRequest {
    #[validate(custom(function = "not_blank", message = "City must not be blank"))]
    pub city: String,
    pub date: NaiveDate,
}

/// Request for the hourly series of one day.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HourlyRequest {
    #[validate(custom(function = "not_blank", message = "City must not be blank"))]
    pub city: String,
    pub date: NaiveDate,
}

/// Request for the five-day series.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExtendedRequest {
    #[validate(custom(function = "not_blank", message = "City must not be blank"))]
    pub city: String,
}

/// A request that can run through a cached operation.
pub trait WeatherRequest: fmt::Display + Send + Sync {
    /// Rejects the request before anything is authorized, looked up or fetched.
    fn check(&self, window: &DateWindow) -> StratusResult<()>;

    /// Parameter part of the cache key.
    fn cache_key(&self) -> String;
}

impl WeatherRequest for CurrentRequest {
    fn check(&self, window: &DateWindow) -> StratusResult<()> {
        self.validate_request()?;
        window.check(self.date)
    }

    fn cache_key(&self) -> String {
        self.city.clone()
    }
}

impl WeatherRequest for HourlyRequest {
    fn check(&self, window: &DateWindow) -> StratusResult<()> {
        self.validate_request()?;
        window.check(self.date)
    }

    fn cache_key(&self) -> String {
        format!("{}|{}", self.city, self.date)
    }
}

impl WeatherRequest for ExtendedRequest {
    fn check(&self, _window: &DateWindow) -> StratusResult<()> {
        self.validate_request()
    }

    fn cache_key(&self) -> String {
        self.city.clone()
    }
}

impl fmt::Display for CurrentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.city)
    }
}

impl fmt::Display for HourlyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.city)
    }
}

impl fmt::Display for ExtendedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.city)
    }
}
