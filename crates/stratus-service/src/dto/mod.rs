//! Data Transfer Objects (DTOs).

mod request_dto;
mod weather_dto;

pub use request_dto::*;
pub use weather_dto::*;
