//! Result type aliases for Stratus.

use crate::StratusError;

/// A specialized `Result` type for Stratus operations.
pub type StratusResult<T> = Result<T, StratusError>;
