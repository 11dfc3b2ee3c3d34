//! Bounded retry driven by a validity check rather than by errors.

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Base delay between attempts; attempt `n` waits `n * backoff`.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }

    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3).with_backoff(Duration::from_secs(1))
    }
}

/// The value a retry loop settled on and how it got there.
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
    /// True when every attempt was rejected and `value` is the fallback.
    pub exhausted: bool,
}

/// Run `op` until `accept` turns its output into a value, at most
/// `policy.max_attempts` times. When no attempt is accepted the result of
/// `fallback` is returned instead.
pub async fn retry_until<T, U, Op, Fut, Accept, Fallback>(
    policy: RetryPolicy,
    mut op: Op,
    mut accept: Accept,
    fallback: Fallback,
) -> Retried<U>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = T>,
    Accept: FnMut(T) -> Option<U>,
    Fallback: FnOnce() -> U,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        if let Some(value) = accept(op(attempt).await) {
            return Retried {
                value,
                attempts: attempt,
                exhausted: false,
            };
        }

        if attempt < max_attempts && !policy.backoff.is_zero() {
            tokio::time::sleep(policy.backoff * attempt).await;
        }
    }

    Retried {
        value: fallback(),
        attempts: max_attempts,
        exhausted: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn stops_at_first_accepted_attempt() {
        let calls = Cell::new(0);
        let result = retry_until(
            RetryPolicy::new(5),
            |attempt| {
                calls.set(calls.get() + 1);
                async move { attempt }
            },
            |n| (n == 2).then_some(n * 10),
            || 0,
        )
        .await;

        assert_eq!(result, Retried { value: 20, attempts: 2, exhausted: false });
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn falls_back_after_budget_is_spent() {
        let calls = Cell::new(0);
        let result = retry_until(
            RetryPolicy::new(3),
            |_| {
                calls.set(calls.get() + 1);
                async { "garbage" }
            },
            |_| None::<u8>,
            || 42,
        )
        .await;

        assert_eq!(result, Retried { value: 42, attempts: 3, exhausted: true });
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let result = retry_until(RetryPolicy::new(0), |_| async { 1 }, Some, || 0).await;
        assert_eq!(result.attempts, 1);
        assert!(!result.exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn backs_off_between_attempts() {
        let start = tokio::time::Instant::now();
        let policy = RetryPolicy::new(3).with_backoff(Duration::from_secs(2));

        let result = retry_until(policy, |_| async {}, |_| None::<()>, || ()).await;

        assert!(result.exhausted);
        // 2s after the first attempt, 4s after the second, none after the last
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }
}
