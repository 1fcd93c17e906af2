//! # Stratus Resilience
//!
//! Resilience patterns for upstream calls.
//! Provides a sliding-window circuit breaker, retry with exponential backoff,
//! per-attempt timeouts, and the invoker that composes them with a fallback.

pub mod circuit_breaker;
pub mod invoker;
pub mod metrics;
pub mod retry;
pub mod timeout;

pub use circuit_breaker::*;
pub use invoker::*;
pub use metrics::ResilienceMetrics;
pub use retry::*;
pub use timeout::*;
