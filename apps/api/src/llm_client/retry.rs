//! Bounded retry with exponential backoff, shared by every outbound API call.
//!
//! The delay after failed attempt `n` (1-based) is `multiplier * 2^(n-1)`,
//! clamped to `[min_delay, max_delay]`. With the defaults that gives
//! 10s, 10s, 10s, 10s, 16s, 32s, 60s, 60s, ... for up to 100 attempts.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::LlmError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub multiplier: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            multiplier: Duration::from_secs(1),
            min_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt that follows failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let raw = self.multiplier.saturating_mul(1u32 << exponent);
        raw.clamp(self.min_delay, self.max_delay)
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the
/// policy runs out of attempts. The error that ends the loop is returned as-is.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "{operation} attempt {attempt}/{max_attempts} failed ({err}), retrying after {}s",
                    delay.as_secs_f32()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_transient() {
                    warn!("{operation} giving up after {attempt} attempts: {err}");
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn transient() -> LlmError {
        LlmError::Api {
            status: 503,
            message: "overloaded".to_string(),
        }
    }

    #[test]
    fn test_default_policy_matches_documented_schedule() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=8).map(|n| policy.delay_after(n).as_secs()).collect();
        assert_eq!(delays, vec![10, 10, 10, 10, 16, 32, 60, 60]);
    }

    #[test]
    fn test_delays_non_decreasing_and_bounded() {
        let policy = RetryPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 1..policy.max_attempts {
            let delay = policy.delay_after(attempt);
            assert!(delay >= previous, "delay shrank at attempt {attempt}");
            assert!(delay >= Duration::from_secs(10) && delay <= Duration::from_secs(60));
            previous = delay;
        }
    }

    #[test]
    fn test_huge_attempt_number_does_not_overflow() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(u32::MAX), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try_does_not_sleep() {
        let start = Instant::now();
        let result = with_backoff(&RetryPolicy::default(), "test", || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result = with_backoff(&RetryPolicy::default(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 6 {
                    Err(transient())
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        // 10 + 10 + 10 + 10 + 16
        assert!(start.elapsed() >= Duration::from_secs(56));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result: Result<(), _> = with_backoff(&RetryPolicy::default(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(LlmError::Api {
                    status: 400,
                    message: "bad request".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(LlmError::Api { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy_returns_first_error() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;

        assert!(matches!(result, Err(LlmError::Api { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
