//! Resilient upstream invocation.
//!
//! Every attempt runs under the operation's circuit breaker and a hard
//! deadline; retryable failures are re-attempted with exponential backoff.
//! Whatever failure remains goes to the operation's fallback, whose result is
//! what the caller sees.

use crate::circuit_breaker::CircuitBreaker;
use crate::metrics::ResilienceMetrics;
use crate::retry::RetryPolicy;
use crate::timeout::with_timeout;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use stratus_core::{FetchError, StratusError, StratusResult};
use tracing::warn;

/// Recovery callback invoked with the original parameters and the final failure.
pub type Fallback<P, T> = Arc<dyn Fn(&P, FetchError) -> StratusResult<T> + Send + Sync>;

/// Builds the standard fallback for an operation.
///
/// Absence maps to `NotFound`, a rejected credential to `UpstreamAuth`, and
/// every other failure to `ServiceUnavailable` carrying the cause.
pub fn default_fallback<P, T>(
    operation: impl Into<String>,
    resource_type: &'static str,
) -> Fallback<P, T>
where
    P: Display + 'static,
    T: 'static,
{
    let operation = operation.into();
    Arc::new(
        move |params: &P, failure: FetchError| -> StratusResult<T> {
            match failure {
                FetchError::NotFound(_) => Err(StratusError::not_found(resource_type, params)),
                FetchError::Unauthorized(message) => Err(StratusError::UpstreamAuth(message)),
                other => Err(StratusError::service_unavailable(
                    operation.clone(),
                    format!("Unable to fetch {} for {}", operation, params),
                    other,
                )),
            }
        },
    )
}

/// Retry + circuit breaker + timeout wrapper around one logical upstream operation.
pub struct ResilientInvoker<P, T> {
    operation: String,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
    fallback: Fallback<P, T>,
}

impl<P, T> ResilientInvoker<P, T> {
    /// Creates a new invoker.
    pub fn new(
        operation: impl Into<String>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
        attempt_timeout: Duration,
        fallback: Fallback<P, T>,
    ) -> Self {
        Self {
            operation: operation.into(),
            breaker,
            retry,
            attempt_timeout,
            fallback,
        }
    }

    /// Returns the operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the breaker guarding this operation.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Returns the per-attempt deadline.
    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Calls `fetch` with retries and circuit breaking, falling back on failure.
    pub async fn call<F, Fut>(&self, params: &P, fetch: F) -> StratusResult<T>
    where
        F: Fn(&P) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let operation = self.operation.as_str();
        let breaker = &self.breaker;
        let deadline = self.attempt_timeout;
        let fetch = &fetch;

        let result = self
            .retry
            .execute(operation, || async move {
                let outcome = breaker
                    .call(|| with_timeout(deadline, || fetch(params)))
                    .await;
                match &outcome {
                    Ok(_) => ResilienceMetrics::attempt(operation, "success"),
                    Err(e) => ResilienceMetrics::attempt(operation, &e.kind().to_string()),
                }
                outcome
            })
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(failure) => {
                warn!(
                    operation = %self.operation,
                    kind = %failure.kind(),
                    error = %failure,
                    "Upstream call failed, invoking fallback"
                );
                ResilienceMetrics::fallback(&self.operation, &failure.kind().to_string());
                (self.fallback)(params, failure)
            }
        }
    }
}
