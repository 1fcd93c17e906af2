//! Retry policy implementation.

use crate::metrics::ResilienceMetrics;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use stratus_core::{FailureKind, FetchError};
use tracing::debug;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
    /// Failure kinds that are retried.
    pub retry_on: HashSet<FailureKind>,
    /// Whether to add jitter to delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            retry_on: FailureKind::all()
                .into_iter()
                .filter(FailureKind::is_retryable_by_default)
                .collect(),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with the specified max attempts.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Returns true if a failure of this kind is retried.
    #[must_use]
    pub fn should_retry(&self, kind: FailureKind) -> bool {
        self.retry_on.contains(&kind)
    }

    /// Calculates the delay after the given number of failed attempts.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay =
            self.base_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32 - 1);
        let delay = Duration::from_millis(base_delay.min(self.max_delay.as_millis() as f64) as u64);

        if self.jitter {
            // Add up to 25% jitter
            let jitter_factor = 1.0 + (rand_simple() * 0.5 - 0.25);
            Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64)
        } else {
            delay
        }
    }

    /// Executes a function with retry logic.
    ///
    /// Non-retryable failures and the final failure are returned unchanged.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut f: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 1;

        loop {
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt >= self.max_attempts || !self.should_retry(e.kind()) {
                        debug!(operation, attempt, error = %e, "Giving up");
                        return Err(e);
                    }

                    let delay = self.delay_for_attempt(attempt);
                    debug!(
                        operation,
                        attempt,
                        ?delay,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    ResilienceMetrics::retry(operation, attempt);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Simple pseudo-random number generator for jitter.
fn rand_simple() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    f64::from(nanos % 1000) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn network_error() -> FetchError {
        FetchError::Network("connection reset".to_string())
    }

    #[tokio::test]
    async fn test_retry_success() {
        let policy = RetryPolicy::with_max_attempts(3);
        let result = policy.execute("test", || async { Ok::<_, FetchError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_eventual_success() {
        let policy = RetryPolicy::with_max_attempts(3);
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = policy
            .execute("test", || {
                let attempts = attempts_clone.clone();
                async move {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err(network_error())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_counts_exact_attempts() {
        let policy = RetryPolicy::with_max_attempts(3);
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<i32, _> = policy
            .execute("test", || {
                let a = attempts_clone.clone();
                async move {
                    a.fetch_add(1, Ordering::SeqCst);
                    Err(FetchError::Timeout(Duration::from_secs(2)))
                }
            })
            .await;

        assert!(matches!(result, Err(FetchError::Timeout(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_stops_immediately() {
        let policy = RetryPolicy::with_max_attempts(3);
        let attempts = Arc::new(AtomicU32::new(0));

        for error in [
            FetchError::NotFound("Atlantis".to_string()),
            FetchError::Unauthorized("bad key".to_string()),
            FetchError::ClientError {
                status: 400,
                message: "bad request".to_string(),
            },
            FetchError::CircuitOpen("current".to_string()),
        ] {
            attempts.store(0, Ordering::SeqCst);
            let attempts_clone = attempts.clone();
            let result: Result<i32, _> = policy
                .execute("test", || {
                    let a = attempts_clone.clone();
                    let error = error.clone();
                    async move {
                        a.fetch_add(1, Ordering::SeqCst);
                        Err(error)
                    }
                })
                .await;

            assert_eq!(result.unwrap_err(), error);
            assert_eq!(attempts.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_between_attempts() {
        let policy = RetryPolicy::default();
        let stamps = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let stamps_clone = stamps.clone();

        let result: Result<i32, _> = policy
            .execute("test", || {
                let stamps = stamps_clone.clone();
                async move {
                    stamps.lock().push(tokio::time::Instant::now());
                    Err(network_error())
                }
            })
            .await;

        assert!(result.is_err());
        let stamps = stamps.lock();
        assert_eq!(stamps.len(), 3);
        assert_eq!(stamps[1] - stamps[0], Duration::from_millis(500));
        assert_eq!(stamps[2] - stamps[1], Duration::from_millis(1000));
    }

    #[test]
    fn test_delay_for_attempt_zero() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn test_delay_for_attempt_increases() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            multiplier: 1000.0,
            max_delay: Duration::from_millis(500),
            ..Default::default()
        };

        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            jitter: true,
            ..Default::default()
        };

        let delay = policy.delay_for_attempt(1);
        assert!(delay >= Duration::from_millis(375));
        assert!(delay <= Duration::from_millis(625));
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert!(!policy.jitter);
        assert!(policy.should_retry(FailureKind::UpstreamServerError));
        assert!(!policy.should_retry(FailureKind::NotFound));
    }

    #[tokio::test]
    async fn test_retry_single_attempt() {
        let policy = RetryPolicy::with_max_attempts(1);
        let result: Result<i32, _> = policy.execute("test", || async { Err(network_error()) }).await;
        assert!(result.is_err());
    }
}
