//! # Stratus Service
//!
//! Weather reads through the two-level cache and the resilience layer, plus
//! the admin operations over both.

pub mod cache_admin;
pub mod dto;
pub mod fetcher;
pub mod openweather;
pub mod operation;
pub mod weather_service;

pub use cache_admin::*;
pub use dto::*;
pub use fetcher::*;
pub use openweather::OpenWeatherClient;
pub use operation::*;
pub use weather_service::*;
