//! Rate Tracker
//!
//! Sliding-window log of outbound extraction calls. The count is advisory:
//! admission and processing consult it, and anyone waiting on it re-checks
//! after waking because other jobs may have used the freed capacity.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Length of the rate window used in production
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Counter of calls made within a trailing window
#[derive(Debug)]
pub struct RateTracker {
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateTracker {
    /// Creates a tracker over the one-minute window
    pub fn new() -> Self {
        Self::with_window(RATE_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    /// Records a call made now
    pub fn record_call(&self) {
        let now = Instant::now();
        let mut calls = self.lock();
        Self::prune(&mut calls, now, self.window);
        calls.push_back(now);
    }

    /// Number of calls within the trailing window
    ///
    /// Expired entries are discarded as a side effect.
    pub fn current_count(&self) -> usize {
        let mut calls = self.lock();
        Self::prune(&mut calls, Instant::now(), self.window);
        calls.len()
    }

    /// Waits until fewer than `limit` calls are in the window
    ///
    /// Sleeps until the oldest recorded call leaves the window instead of
    /// polling on a fixed interval, then re-checks.
    pub async fn wait_for_capacity(&self, limit: usize) {
        loop {
            let wait = {
                let now = Instant::now();
                let mut calls = self.lock();
                Self::prune(&mut calls, now, self.window);

                if calls.len() < limit.max(1) {
                    return;
                }
                let Some(oldest) = calls.front() else {
                    return;
                };
                (*oldest + self.window).saturating_duration_since(now)
            };

            tracing::debug!("Rate limit reached, waiting {:?} for capacity", wait);
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    fn prune(calls: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = calls.front() {
            if now.saturating_duration_since(*oldest) >= window {
                calls.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Instant>> {
        // no invariant spans a panic, so a poisoned lock is still usable
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RateTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_counts_calls_in_window() {
        let tracker = RateTracker::new();
        assert_eq!(tracker.current_count(), 0);

        tracker.record_call();
        tracker.record_call();
        tracker.record_call();
        assert_eq!(tracker.current_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_calls_are_excluded() {
        let tracker = RateTracker::new();
        tracker.record_call();
        tracker.record_call();

        tokio::time::advance(Duration::from_secs(30)).await;
        tracker.record_call();
        assert_eq!(tracker.current_count(), 3);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(tracker.current_count(), 1);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(tracker.current_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_capacity_returns_immediately_below_limit() {
        let tracker = RateTracker::new();
        tracker.record_call();

        let start = Instant::now();
        tracker.wait_for_capacity(2).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_capacity_sleeps_until_oldest_expires() {
        let tracker = RateTracker::new();
        tracker.record_call();
        tokio::time::advance(Duration::from_secs(20)).await;
        tracker.record_call();

        let start = Instant::now();
        tracker.wait_for_capacity(2).await;

        // the first call leaves the window 40s after the wait started
        assert_eq!(start.elapsed(), Duration::from_secs(40));
        assert_eq!(tracker.current_count(), 1);
    }
}
