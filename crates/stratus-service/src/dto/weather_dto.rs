//! Weather records returned by the service and stored in the cache.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use stratus_core::rules::not_blank;
use stratus_core::{StratusResult, ValidateExt};
use validator::Validate;

/// Wire format of `at`: `yyyy-MM-ddTHH:mm:ss`, no offset, UTC.
pub mod at_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S: Serializer>(at: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&at.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Current conditions for a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConditions {
    #[validate(custom(function = "not_blank"))]
    pub city: String,
    #[serde(with = "at_format")]
    pub at: NaiveDateTime,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    #[validate(range(max = 100, message = "Humidity must be 0-100"))]
    pub humidity_percent: u8,
    #[validate(custom(function = "not_blank"))]
    pub description: String,
}

impl CurrentConditions {
    /// Creates a validated record.
    pub fn new(
        city: impl Into<String>,
        at: NaiveDateTime,
        temperature_c: f64,
        feels_like_c: f64,
        humidity_percent: u8,
        description: impl Into<String>,
    ) -> StratusResult<Self> {
        let record = Self {
            city: city.into(),
            at,
            temperature_c,
            feels_like_c,
            humidity_percent,
            description: description.into(),
        };
        record.validate_request()?;
        Ok(record)
    }
}

/// One hour of a short-range series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HourlyPoint {
    #[serde(with = "at_format")]
    pub at: NaiveDateTime,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    #[validate(range(max = 100, message = "Humidity must be 0-100"))]
    pub humidity_percent: u8,
    #[validate(custom(function = "not_blank"))]
    pub description: String,
}

impl HourlyPoint {
    /// Creates a validated point.
    pub fn new(
        at: NaiveDateTime,
        temperature_c: f64,
        feels_like_c: f64,
        humidity_percent: u8,
        description: impl Into<String>,
    ) -> StratusResult<Self> {
        let point = Self {
            at,
            temperature_c,
            feels_like_c,
            humidity_percent,
            description: description.into(),
        };
        point.validate_request()?;
        Ok(point)
    }
}

/// One three-hour step of the five-day series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    #[validate(custom(function = "not_blank"))]
    pub city: String,
    #[serde(with = "at_format")]
    pub at: NaiveDateTime,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    #[validate(range(max = 100, message = "Humidity must be 0-100"))]
    pub humidity_percent: u8,
    #[validate(custom(function = "not_blank"))]
    pub description: String,
}

impl ForecastPoint {
    /// Creates a validated point.
    pub fn new(
        city: impl Into<String>,
        at: NaiveDateTime,
        temperature_c: f64,
        feels_like_c: f64,
        humidity_percent: u8,
        description: impl Into<String>,
    ) -> StratusResult<Self> {
        let point = Self {
            city: city.into(),
            at,
            temperature_c,
            feels_like_c,
            humidity_percent,
            description: description.into(),
        };
        point.validate_request()?;
        Ok(point)
    }
}
