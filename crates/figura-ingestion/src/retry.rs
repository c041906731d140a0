use std::future::Future;
use std::time::Duration;

use figura_common::config::IngestionConfig;
use tokio::time::sleep;
use tracing::{info, warn};

/// Fixed-delay retry for pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never less than one.
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(cfg: &IngestionConfig) -> Self {
        Self::new(cfg.max_retries, Duration::from_millis(cfg.retry_delay_ms))
    }

    /// Single attempt, no delay.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `f` until it succeeds, fails with an error `is_retryable`
    /// rejects, or the attempts run out. Returns the last result and the
    /// number of attempts made.
    pub async fn retry<F, Fut, T, E>(
        &self,
        operation_name: &str,
        is_retryable: impl Fn(&E) -> bool,
        mut f: F,
    ) -> (Result<T, E>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match f().await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(operation = operation_name, attempts = attempt, "Operation succeeded after retries");
                    }
                    return (Ok(result), attempt);
                }
                Err(e) if !is_retryable(&e) => return (Err(e), attempt),
                Err(e) if attempt >= self.max_attempts => {
                    warn!(
                        operation = operation_name,
                        attempts = attempt,
                        error = %e,
                        "Operation failed after max attempts"
                    );
                    return (Err(e), attempt);
                }
                Err(e) => {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying"
                    );
                    sleep(self.delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&IngestionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_until_success() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let calls = AtomicU32::new(0);
        let (result, attempts) = policy
            .retry("op", |_: &String| true, || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let calls = AtomicU32::new(0);
        let (result, attempts) = policy
            .retry("op", |_: &String| true, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("down".to_string())
            })
            .await;
        assert!(result.is_err());
        assert_eq!((attempts, calls.load(Ordering::SeqCst)), (3, 3));
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let (result, attempts) = policy
            .retry("op", |_: &String| false, || async { Err::<(), _>("bad input".to_string()) })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_defaults_from_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay, Duration::from_millis(1000));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }
}
