//! # Stratus Core
//!
//! Error taxonomy, caller roles, validation helpers and tracing setup shared
//! by every Stratus crate.

pub mod error;
pub mod result;
pub mod role;
pub mod telemetry;
pub mod validation;

pub use error::*;
pub use result::*;
pub use role::*;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
pub use validation::*;
