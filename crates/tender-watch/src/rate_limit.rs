//! Spacing for outbound webhook calls.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Grants permission to make the next call.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until the next call may proceed.
    async fn acquire(&self);
}

/// Enforces a minimum gap between consecutive acquisitions.
///
/// The first acquisition returns immediately.
#[derive(Debug)]
pub struct IntervalLimiter {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl IntervalLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl RateLimiter for IntervalLimiter {
    async fn acquire(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            tokio::time::sleep_until(prev + self.interval).await;
        }
        *last = Some(Instant::now());
    }
}

/// Never waits.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn acquire(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let limiter = IntervalLimiter::new(Duration::from_millis(500));
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_between_acquires() {
        let limiter = IntervalLimiter::new(Duration::from_millis(500));
        let start = Instant::now();
        for _ in 0..4 {
            limiter.acquire().await;
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1600), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_long_gap() {
        let limiter = IntervalLimiter::new(Duration::from_millis(500));
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        let before = Instant::now();
        limiter.acquire().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_unlimited() {
        let limiter = Unlimited;
        for _ in 0..100 {
            limiter.acquire().await;
        }
    }
}
