//! Rate limiting, retries, deadlines and cancellation for outbound calls.

mod rate_limiter;
mod retry;

pub use rate_limiter::RateLimiter;
pub use retry::{RetryError, RetryPolicy};

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bountyscope_common::Config;

/// Everything one remote consumer needs to make a well-behaved call: its
/// (possibly shared) limiter, the retry schedule and the run's cancel flag.
#[derive(Clone)]
pub struct RequestPolicy {
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    cancelled: Arc<AtomicBool>,
}

impl RequestPolicy {
    pub fn new(limiter: Arc<RateLimiter>, retry: RetryPolicy, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            limiter,
            retry: retry.with_cancel_flag(cancelled.clone()),
            cancelled,
        }
    }

    /// Retry schedule and deadline from config.
    pub fn retry_from_config(config: &Config) -> RetryPolicy {
        RetryPolicy::new(config.max_attempts, config.retry_base_delay)
            .with_deadline(config.request_deadline)
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn cancel_flag(&self) -> &Arc<AtomicBool> {
        &self.cancelled
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Acquire a slot, then run `op` under the retry policy.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Display + Send,
    {
        self.call_if(op, |_| true).await
    }

    pub async fn call_if<T, E, F, Fut, P>(&self, op: F, should_retry: P) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Display + Send,
        P: Fn(&E) -> bool + Send + Sync,
    {
        if self.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        if !self.limiter.acquire_unless(&self.cancelled).await {
            return Err(RetryError::Cancelled);
        }
        self.retry.run_if(op, should_retry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn cancelled_policy_skips_the_limiter() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(1)));
        let policy = RequestPolicy::new(
            limiter.clone(),
            RetryPolicy::new(1, Duration::from_millis(10)),
            Arc::new(AtomicBool::new(true)),
        );
        let result: Result<(), RetryError<String>> = policy.call(|| async { Ok(()) }).await;
        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(limiter.in_window().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_rate_limit_wait_skips_the_call() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(60)));
        let cancel = Arc::new(AtomicBool::new(false));
        let policy = RequestPolicy::new(limiter, RetryPolicy::new(1, Duration::ZERO), cancel.clone());
        let _: Result<(), RetryError<String>> = policy.call(|| async { Ok(()) }).await;

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.store(true, Ordering::Relaxed);
        });

        let start = tokio::time::Instant::now();
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let counter = &calls;
        let result: Result<(), RetryError<String>> = policy
            .call(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn shared_limiter_counts_every_consumer() {
        let limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(60)));
        let cancel = Arc::new(AtomicBool::new(false));
        let search = RequestPolicy::new(limiter.clone(), RetryPolicy::new(1, Duration::ZERO), cancel.clone());
        let content = RequestPolicy::new(limiter.clone(), RetryPolicy::new(1, Duration::ZERO), cancel);

        let _: Result<u8, RetryError<String>> = search.call(|| async { Ok(1) }).await;
        let _: Result<u8, RetryError<String>> = content.call(|| async { Ok(2) }).await;
        assert_eq!(limiter.in_window().await, 2);
    }
}
