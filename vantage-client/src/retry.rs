//! Retry controller with exponential backoff.
//!
//! Only transient errors are re-attempted; terminal errors surface
//! immediately. Backoff delays are awaited with `tokio::time::sleep`, so the
//! chain never blocks the runtime and is cancelled transitively when the
//! owning task is cancelled.

use crate::config::RetryConfig;
use crate::error::{ClientError, ClientResult};
use crate::metrics::ClientMetrics;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay before the n-th retry (1-based): `base * 2^(n-1)`, capped at
    /// `max_delay`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Run `op` until it succeeds, fails terminally, or the retry bound is
    /// hit. Every failed attempt increments the failure counter; after
    /// `max_retries` re-attempts the last error is wrapped in
    /// [`ClientError::ExhaustedRetries`].
    pub async fn run<T, F, Fut>(&self, metrics: &ClientMetrics, mut op: F) -> ClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    metrics.record_failure();
                    if !err.is_transient() {
                        return Err(err);
                    }
                    if attempt > self.max_retries {
                        return Err(ClientError::ExhaustedRetries {
                            attempts: attempt,
                            last: Box::new(err),
                        });
                    }
                    let delay = self.backoff_delay(attempt);
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use vantage_core::ErrorCode;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(5_000),
        }
    }

    #[test]
    fn test_backoff_doubles_per_retry() {
        let policy = policy();
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_delay(4), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_caps_at_max_delay() {
        let policy = policy();
        assert_eq!(policy.backoff_delay(10), Duration::from_millis(5_000));
        assert_eq!(policy.backoff_delay(31), Duration::from_millis(5_000));
        assert_eq!(policy.backoff_delay(200), Duration::from_millis(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_op_exhausts_after_bound() {
        let policy = policy();
        let metrics = ClientMetrics::new();
        let attempts = AtomicU32::new(0);

        let start = tokio::time::Instant::now();
        let result: ClientResult<()> = policy
            .run(&metrics, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(ClientError::transient(ErrorCode::Timeout, "timeout")) }
            })
            .await;

        // 4 attempts total (1 initial + 3 retries), delays 100 + 200 + 400.
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_millis(700));
        assert_eq!(metrics.snapshot().failed, 4);
        match result {
            Err(ClientError::ExhaustedRetries { attempts: n, last }) => {
                assert_eq!(n, 4);
                assert!(last.is_transient());
            }
            other => panic!("expected ExhaustedRetries, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_transient_failures() {
        let policy = policy();
        let metrics = ClientMetrics::new();
        let attempts = AtomicU32::new(0);

        let result = policy
            .run(&metrics, || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ClientError::transient(ErrorCode::Unavailable, "down"))
                    } else {
                        Ok(42u32)
                    }
                }
            })
            .await;

        assert_eq!(result.expect("should succeed on third attempt"), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // Failures are counted per attempt even when the op later succeeds.
        assert_eq!(metrics.snapshot().failed, 2);
    }

    #[tokio::test]
    async fn test_terminal_error_is_not_retried() {
        let policy = policy();
        let metrics = ClientMetrics::new();
        let attempts = AtomicU32::new(0);

        let result: ClientResult<()> = policy
            .run(&metrics, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(ClientError::terminal(ErrorCode::ValidationFailed, "bad")) }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.snapshot().failed, 1);
        assert!(matches!(result, Err(ClientError::Terminal { .. })));
    }

    #[tokio::test]
    async fn test_zero_retries_surfaces_first_transient() {
        let policy = RetryPolicy {
            max_retries: 0,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
        };
        let metrics = ClientMetrics::new();

        let result: ClientResult<()> = policy
            .run(&metrics, || async {
                Err(ClientError::transient(ErrorCode::Timeout, "timeout"))
            })
            .await;

        assert!(matches!(
            result,
            Err(ClientError::ExhaustedRetries { attempts: 1, .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Backoff delays never decrease as the retry count grows.
        #[test]
        fn prop_backoff_monotone(
            base_ms in 1u64..1_000,
            max_ms in 1_000u64..60_000,
            retry in 1u32..40,
        ) {
            let policy = RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_millis(max_ms),
            };
            prop_assert!(policy.backoff_delay(retry) <= policy.backoff_delay(retry + 1));
            prop_assert!(policy.backoff_delay(retry) <= policy.max_delay);
        }
    }
}
