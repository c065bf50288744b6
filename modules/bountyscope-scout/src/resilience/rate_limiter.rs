use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bountyscope_common::RateSettings;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Added to every forced wait so the oldest request has definitely left the
/// window when we wake.
const JITTER_BUFFER: Duration = Duration::from_millis(100);

/// How often a forced wait checks the cancel flag.
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Sliding-window limiter: at most `max_requests` acquisitions in any
/// `window`. Callers are admitted one at a time; the lock is held across a
/// forced wait so concurrent callers can't both claim the last slot.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    requests: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            requests: Mutex::new(VecDeque::with_capacity(max_requests.max(1))),
        }
    }

    pub fn from_settings(settings: &RateSettings) -> Self {
        Self::new(settings.max_requests, settings.window)
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Suspend until a request may be made, then record it.
    pub async fn acquire(&self) {
        self.admit(None).await;
    }

    /// Like [`acquire`](Self::acquire), but gives up a forced wait once
    /// `cancelled` is set. Returns `false` without recording a request when
    /// it gave up.
    pub async fn acquire_unless(&self, cancelled: &AtomicBool) -> bool {
        self.admit(Some(cancelled)).await
    }

    async fn admit(&self, cancelled: Option<&AtomicBool>) -> bool {
        let mut requests = self.requests.lock().await;
        let now = Instant::now();
        prune(&mut requests, now, self.window);

        if requests.len() >= self.max_requests {
            if let Some(&oldest) = requests.front() {
                let elapsed = now.saturating_duration_since(oldest);
                let wait = self.window.saturating_sub(elapsed) + JITTER_BUFFER;
                debug!(
                    in_window = requests.len(),
                    wait_ms = wait.as_millis() as u64,
                    "Rate limit reached, waiting"
                );
                match cancelled {
                    Some(flag) => {
                        tokio::select! {
                            _ = sleep(wait) => {}
                            _ = cancellation(flag) => {
                                debug!("Cancelled while waiting for a rate limit slot");
                                return false;
                            }
                        }
                    }
                    None => sleep(wait).await,
                }
            }
            prune(&mut requests, Instant::now(), self.window);
        }

        requests.push_back(Instant::now());
        true
    }

    /// Requests recorded inside the current window.
    pub async fn in_window(&self) -> usize {
        let mut requests = self.requests.lock().await;
        prune(&mut requests, Instant::now(), self.window);
        requests.len()
    }
}

async fn cancellation(flag: &AtomicBool) {
    while !flag.load(Ordering::Relaxed) {
        sleep(CANCEL_POLL).await;
    }
}

fn prune(requests: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = requests.front() {
        if now.saturating_duration_since(front) >= window {
            requests.pop_front();
        } else {
            break;
        }
    }
}
