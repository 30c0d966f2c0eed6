//! Exponential retry wrapper for logical requests.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::{Result, ScrapeError};

const BASE_DELAY_MS: u64 = 500;
const MAX_DELAY_MS: u64 = 30_000;
const JITTER_PERCENT: f64 = 0.2;

/// Delay before retry number `attempt` (0-based): exponential with ±20%
/// jitter, capped at 30 s.
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    let exp = BASE_DELAY_MS.saturating_mul(1 << attempt.min(6));
    let jitter = rand::rng().random_range(-JITTER_PERCENT..=JITTER_PERCENT);
    let jittered = (exp as f64 * (1.0 + jitter)) as u64;
    Duration::from_millis(jittered.min(MAX_DELAY_MS))
}

/// Run `op` until it succeeds, the error is non-retryable, or `fail_after`
/// attempts are exhausted.
///
/// The retry predicate is [`ScrapeError::is_retryable`]: client-side aborts
/// and any HTTP status other than 404 retry; a 404 surfaces immediately.
pub async fn with_backoff<T, F, Fut>(label: &str, fail_after: u32, op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < fail_after => {
                let delay = backoff_delay(attempt);
                log::debug!(
                    "retrying {label} after {:?} (attempt {}/{}): {err}",
                    delay,
                    attempt + 1,
                    fail_after
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_backoff("test", 7, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ScrapeError::Timeout("u".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn not_found_is_never_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_backoff("test", 7, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ScrapeError::NotFound("u".into())) }
        })
        .await;
        assert!(matches!(result, Err(ScrapeError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_fail_after_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_backoff("test", 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ScrapeError::Network("down".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn delay_grows_and_is_capped() {
        let early = backoff_delay(0);
        assert!(early >= Duration::from_millis(400));
        assert!(early <= Duration::from_millis(600));
        let late = backoff_delay(20);
        assert!(late <= Duration::from_millis(MAX_DELAY_MS));
    }
}
