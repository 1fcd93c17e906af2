//! Timeout wrapper for upstream calls.

use std::future::Future;
use std::time::Duration;
use stratus_core::FetchError;

/// Wraps an upstream call with a hard deadline.
///
/// An elapsed deadline becomes [`FetchError::Timeout`] and the call's future is dropped.
pub async fn with_timeout<F, Fut, T>(duration: Duration, f: F) -> Result<T, FetchError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    tokio::time::timeout(duration, f())
        .await
        .map_err(|_| FetchError::Timeout(duration))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_success() {
        let result = with_timeout(Duration::from_secs(1), || async { Ok::<_, FetchError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_exceeded() {
        let result = with_timeout(Duration::from_secs(2), || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, FetchError>(42)
        })
        .await;

        assert_eq!(result, Err(FetchError::Timeout(Duration::from_secs(2))));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<i32, _> = with_timeout(Duration::from_secs(1), || async {
            Err(FetchError::NotFound("Atlantis".to_string()))
        })
        .await;

        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }
}
