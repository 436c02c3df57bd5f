//! Retry logic with configurable backoff policies for network-facing stages.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

/// Backoff policy controlling the delay between retry attempts.
#[derive(Debug, Clone)]
pub enum BackoffPolicy {
    /// Fixed delay between retries.
    Fixed(Duration),
    /// Exponential backoff: base * 2^attempt, capped at max.
    Exponential { base: Duration, max: Duration },
    /// No delay between retries.
    None,
}

impl BackoffPolicy {
    /// Compute the delay after a failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        match self {
            BackoffPolicy::Fixed(d) => *d,
            BackoffPolicy::Exponential { base, max } => {
                let millis = (base.as_millis() as u64)
                    .saturating_mul(2u64.saturating_pow(attempt as u32));
                Duration::from_millis(millis).min(*max)
            }
            BackoffPolicy::None => Duration::ZERO,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

/// Attempt budget plus the delays between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub backoff: BackoffPolicy,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, backoff: BackoffPolicy) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// The schedule used for evaluation callbacks: 5 attempts, 1s/2s/4s/8s apart.
    pub fn evaluation_callback() -> Self {
        Self::new(5, BackoffPolicy::default())
    }

    /// Sum of every delay slept when all attempts fail.
    pub fn total_delay(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|k| self.backoff.delay_for_attempt(k))
            .sum()
    }
}

/// Source of delays. Tests substitute a recording implementation.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returned when every attempt failed.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: usize,
    pub last_error: E,
}

/// Call `f` until it succeeds or the attempt budget is spent.
///
/// `f` receives the 1-based attempt number. Every error is retryable. The
/// success value comes back with the number of attempts it took; no delay
/// follows the final attempt.
pub async fn execute_with_retry<T, E, F, Fut>(
    mut f: F,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    label: &str,
) -> Result<(T, usize), Exhausted<E>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(e) if attempt >= max_attempts => {
                tracing::error!(target_name = %label, attempts = attempt, error = %e, "Retries exhausted");
                return Err(Exhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Err(e) => {
                let delay = policy.backoff.delay_for_attempt(attempt - 1);
                tracing::warn!(
                    target_name = %label,
                    attempt,
                    delay_ms = %delay.as_millis(),
                    error = %e,
                    "Attempt failed, retrying"
                );
                sleeper.sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    // 1. Success on first try, no sleeping
    #[tokio::test]
    async fn success_on_first_try() {
        let sleeper = RecordingSleeper::default();
        let result: Result<(&str, usize), Exhausted<String>> = execute_with_retry(
            |_| async { Ok("done") },
            &RetryPolicy::evaluation_callback(),
            &sleeper,
            "callback",
        )
        .await;

        assert_eq!(result.unwrap(), ("done", 1));
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    // 2. Fails four times, succeeds on the fifth
    #[tokio::test]
    async fn succeeds_on_last_attempt_after_full_schedule() {
        let sleeper = RecordingSleeper::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let cc = calls.clone();

        let result = execute_with_retry(
            move |attempt| {
                let cc = cc.clone();
                async move {
                    cc.fetch_add(1, Ordering::SeqCst);
                    if attempt < 5 {
                        Err(format!("status 503 on attempt {attempt}"))
                    } else {
                        Ok(attempt)
                    }
                }
            },
            &RetryPolicy::evaluation_callback(),
            &sleeper,
            "callback",
        )
        .await;

        assert_eq!(result.unwrap(), (5, 5));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        let slept = sleeper.slept.lock().unwrap().clone();
        assert_eq!(
            slept,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
        assert_eq!(slept.iter().sum::<Duration>(), Duration::from_secs(15));
    }

    // 3. Always failing reports attempt count and the last error
    #[tokio::test]
    async fn exhaustion_reports_attempts_and_last_error() {
        let sleeper = RecordingSleeper::default();
        let result: Result<((), usize), Exhausted<String>> = execute_with_retry(
            |attempt| async move { Err(format!("failure #{attempt}")) },
            &RetryPolicy::evaluation_callback(),
            &sleeper,
            "callback",
        )
        .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 5);
        assert_eq!(exhausted.last_error, "failure #5");
        // No delay after the final attempt.
        assert_eq!(sleeper.slept.lock().unwrap().len(), 4);
    }

    // 4. Fixed backoff returns constant delay
    #[test]
    fn fixed_backoff_constant_delay() {
        let policy = BackoffPolicy::Fixed(Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(100), Duration::from_millis(200));
    }

    // 5. Exponential backoff doubles correctly and respects max
    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let policy = BackoffPolicy::Exponential {
            base: Duration::from_millis(100),
            max: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        // 800 capped at 500
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(64), Duration::from_millis(500));
    }

    // 6. Default backoff is the 1s doubling schedule
    #[test]
    fn default_backoff_is_one_second_doubling() {
        let policy = BackoffPolicy::default();
        let delays: Vec<u64> = (0..4)
            .map(|k| policy.delay_for_attempt(k).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8]);
    }

    // 7. Total delay of the callback schedule
    #[test]
    fn callback_schedule_total_delay() {
        assert_eq!(
            RetryPolicy::evaluation_callback().total_delay(),
            Duration::from_secs(15)
        );
    }

    // 8. A zero budget still makes one attempt
    #[tokio::test]
    async fn zero_budget_makes_one_attempt() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::new(0, BackoffPolicy::None);
        let result: Result<((), usize), Exhausted<&str>> =
            execute_with_retry(|_| async { Err("nope") }, &policy, &sleeper, "x").await;
        assert_eq!(result.unwrap_err().attempts, 1);
    }
}
