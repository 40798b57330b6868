//! Token bucket rate limiter for judge API requests.
//!
//! Tokens refill continuously with elapsed time; `acquire` waits until a
//! token is available and consumes it. Capacity equals the refill rate so a
//! one-second burst is the most that can pass at once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Clone, Debug)]
pub struct TokenBucketRateLimiter {
    tokens: Arc<Mutex<f64>>,
    capacity: f64,
    refill_rate: f64,
    last_refill: Arc<Mutex<Instant>>,
}

impl TokenBucketRateLimiter {
    /// `rate_limit_rps` requests per second.
    pub fn new(rate_limit_rps: f64) -> Self {
        let capacity = rate_limit_rps.max(1.0);
        Self {
            tokens: Arc::new(Mutex::new(capacity)),
            capacity,
            refill_rate: capacity,
            last_refill: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Wait for and consume one token.
    pub async fn acquire(&self) {
        loop {
            self.refill().await;
            {
                let mut tokens = self.tokens.lock().await;
                if *tokens >= 1.0 {
                    *tokens -= 1.0;
                    return;
                }
            }
            sleep(Duration::from_millis(50)).await;
        }
    }

    async fn refill(&self) {
        let mut last = self.last_refill.lock().await;
        let elapsed = last.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return;
        }
        *last = Instant::now();
        let mut tokens = self.tokens.lock().await;
        *tokens = (*tokens + elapsed * self.refill_rate).min(self.capacity);
    }
}
