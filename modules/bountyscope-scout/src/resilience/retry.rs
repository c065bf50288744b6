use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::warn;

/// Why a retried operation gave up. `Failed` carries the last attempt's
/// error unchanged.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    #[error("{0}")]
    Failed(E),

    #[error("deadline of {0:?} elapsed")]
    DeadlineElapsed(Duration),

    #[error("cancelled")]
    Cancelled,
}

impl<E> RetryError<E> {
    pub fn failure(&self) -> Option<&E> {
        match self {
            RetryError::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_failure(self) -> Option<E> {
        match self {
            RetryError::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Exponential backoff: the delay before attempt `k + 1` is
/// `base_delay * 2^(k - 1)`. An optional deadline bounds the whole run,
/// waits included.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    deadline: Option<Duration>,
    cancelled: Option<Arc<AtomicBool>>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            deadline: None,
            cancelled: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Checked before every attempt and after every backoff wait.
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(cancelled);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait inserted after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Retry every failure.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Display + Send,
    {
        self.run_if(op, |_| true).await
    }

    /// Retry only failures `should_retry` accepts; others return at once.
    pub async fn run_if<T, E, F, Fut, P>(&self, mut op: F, should_retry: P) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Display + Send,
        P: Fn(&E) -> bool + Send + Sync,
    {
        let deadline_at = self.deadline.map(|d| (Instant::now() + d, d));
        let mut attempt = 0;

        loop {
            attempt += 1;
            if self.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            let outcome = match deadline_at {
                Some((at, total)) => match timeout_at(at, op()).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(attempt, deadline_ms = total.as_millis() as u64, "Deadline elapsed mid-attempt");
                        return Err(RetryError::DeadlineElapsed(total));
                    }
                },
                None => op().await,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt >= self.max_attempts || !should_retry(&err) {
                return Err(RetryError::Failed(err));
            }

            let delay = self.delay_after(attempt);
            if let Some((at, _)) = deadline_at {
                if Instant::now() + delay >= at {
                    warn!(attempt, error = %err, "No time left before deadline for another attempt");
                    return Err(RetryError::Failed(err));
                }
            }

            warn!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Attempt failed, retrying"
            );
            sleep(delay).await;

            if self.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn delays_double_from_base() {
        let policy = RetryPolicy::new(4, Duration::from_millis(1_000));
        assert_eq!(policy.delay_after(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2_000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(4_000));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_returns_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let result: Result<(), _> = policy
            .run_if(
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("bad input")
                },
                |e: &&str| *e != "bad input",
            )
            .await;
        assert!(matches!(result, Err(RetryError::Failed("bad input"))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_abandons_slow_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100)).with_deadline(Duration::from_secs(2));
        let result: Result<(), RetryError<String>> = policy
            .run(|| async {
                sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(RetryError::DeadlineElapsed(d)) if d == Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_first_attempt_makes_no_calls() {
        let flag = Arc::new(AtomicBool::new(true));
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(3, Duration::from_millis(100)).with_cancel_flag(flag);
        let result: Result<(), RetryError<String>> = policy
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
