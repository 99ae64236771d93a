//! Token-bucket rate limiter
//!
//! Public market-data endpoints tolerate only a modest request rate per
//! client; exceeding it earns 429s or temporary bans. Each acquired
//! permit is consumed, and the bucket refills to capacity once per
//! refill interval.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RateLimiter {
    permits: Arc<Semaphore>,
    max_permits: usize,
    last_refill: Arc<Mutex<Instant>>,
    refill_interval: Duration,
}

impl RateLimiter {
    /// Limiter allowing `requests_per_second` requests, refilled each second.
    pub fn new(requests_per_second: usize) -> Self {
        Self::with_interval(requests_per_second, Duration::from_secs(1))
    }

    pub fn with_interval(max_permits: usize, refill_interval: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_permits)),
            max_permits,
            last_refill: Arc::new(Mutex::new(Instant::now())),
            refill_interval,
        }
    }

    /// Take one permit, sleeping until the next refill when the bucket is
    /// empty. Refills only happen inside this loop, so waiters poll
    /// rather than park in the semaphore.
    pub async fn acquire(&self) {
        loop {
            let until_refill = self.refill_if_due().await;
            match self.permits.try_acquire() {
                Ok(permit) => {
                    // consumed, not returned; refills restore capacity
                    permit.forget();
                    return;
                }
                Err(_) => tokio::time::sleep(until_refill).await,
            }
        }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Refill the bucket when the interval has elapsed; returns the time
    /// until the next refill is due.
    async fn refill_if_due(&self) -> Duration {
        let mut last_refill = self.last_refill.lock().await;
        let elapsed = last_refill.elapsed();
        if elapsed < self.refill_interval {
            return self.refill_interval - elapsed;
        }

        let current = self.permits.available_permits();
        let to_add = self.max_permits.saturating_sub(current);
        if to_add > 0 {
            self.permits.add_permits(to_add);
        }
        *last_refill = Instant::now();
        self.refill_interval
    }
}
