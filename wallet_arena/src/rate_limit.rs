//! Sliding-window rate limiting for balance provider calls.

use std::collections::VecDeque;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant, sleep};

/// Small cushion added to computed waits so a slot is really free on retry
const WAIT_BUFFER: Duration = Duration::from_millis(100);

/// Current limiter occupancy, for logs and dashboards
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterStatus {
    /// Requests recorded in the trailing window
    pub used: usize,
    /// Maximum requests per window
    pub limit: usize,
    /// Window length
    pub window: Duration,
    /// Slots currently available
    pub available: usize,
    /// Occupancy as a percentage
    pub percent_used: f64,
}

/// Sliding-window rate limiter shared by all snapshot operations.
///
/// `acquire` suspends the caller until fewer than `max_requests` timestamps
/// fall inside the trailing window, then records one. Pruning, the admission
/// check, and the record happen under a single lock hold, so concurrent
/// callers can never over-admit. Callers are never dropped; they wait as long
/// as the window requires.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    requests: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter admitting `max_requests` per `window`
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            requests: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait for a free slot in the window, then claim it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut requests = self.requests.lock().await;
                let now = Instant::now();
                Self::prune(&mut requests, now, self.window);

                if requests.len() < self.max_requests {
                    requests.push_back(now);
                    return;
                }

                // Window is full; oldest entry decides when a slot frees
                let oldest = *requests.front().expect("window is full");
                self.window.saturating_sub(now - oldest) + WAIT_BUFFER
            };

            sleep(wait).await;
        }
    }

    /// Snapshot of current occupancy
    pub async fn status(&self) -> RateLimiterStatus {
        let mut requests = self.requests.lock().await;
        Self::prune(&mut requests, Instant::now(), self.window);

        let used = requests.len();
        RateLimiterStatus {
            used,
            limit: self.max_requests,
            window: self.window,
            available: self.max_requests.saturating_sub(used),
            percent_used: used as f64 / self.max_requests as f64 * 100.0,
        }
    }

    fn prune(requests: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = requests.front() {
            if now.duration_since(*oldest) >= window {
                requests.pop_front();
            } else {
                break;
            }
        }
    }
}
