use std::sync::Mutex;

use tokio::time::{Duration, Instant};

/// Classic token bucket controlling the global placement-attempt rate across all task groups.
///
/// Capacity and refill rate are both expressed in permits/sec; `acquire` waits until a permit
/// is available rather than failing, matching the spec's "blocking acquisition is acceptable"
/// note for the attempt loop. The lock is never held across an `.await`, so a plain
/// `std::sync::Mutex` is enough, matching this crate's other short-critical-section components.
#[derive(Debug)]
pub struct RateLimiter {
    inner: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(rate_per_sec: u32) -> Self {
        let rate = rate_per_sec.max(1) as f64;
        RateLimiter {
            inner: Mutex::new(Bucket { tokens: rate, capacity: rate, refill_per_sec: rate, last_refill: Instant::now() }),
        }
    }

    /// Blocks until one permit is available, then consumes it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.inner.lock().expect("poisoned");
                bucket.refill();
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - bucket.tokens;
                    Some(Duration::from_secs_f64(deficit / bucket.refill_per_sec))
                }
            };
            match wait {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }
}

impl Bucket {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }
}
