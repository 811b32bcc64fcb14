use std::time::{Duration, Instant};

/// Token-bucket limiter applied per connection. Guess spam and reroll
/// loops drain the bucket; the refill keeps normal play unaffected.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tokens: u32,
    max_tokens: u32,
    refill_interval: Duration,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        // 30 messages burst, one token back per second
        Self::with_limits(30, Duration::from_secs(1))
    }

    pub fn with_limits(max_tokens: u32, refill_interval: Duration) -> Self {
        Self {
            tokens: max_tokens,
            max_tokens,
            refill_interval,
            last_refill: Instant::now(),
        }
    }

    /// Spend a token; false means the message should be dropped.
    pub fn allow(&mut self) -> bool {
        self.refill();

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let elapsed = self.last_refill.elapsed();
        if elapsed >= self.refill_interval {
            let refilled = (elapsed.as_millis() / self.refill_interval.as_millis()) as u32;
            self.tokens = (self.tokens + refilled).min(self.max_tokens);
            self.last_refill = Instant::now();
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_drains_and_blocks() {
        let mut limiter = RateLimiter::with_limits(3, Duration::from_secs(60));
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[test]
    fn test_bucket_refills_over_time() {
        let mut limiter = RateLimiter::with_limits(1, Duration::from_millis(5));
        assert!(limiter.allow());
        assert!(!limiter.allow());
        std::thread::sleep(Duration::from_millis(10));
        assert!(limiter.allow());
    }

    #[test]
    fn test_refill_never_exceeds_capacity() {
        let mut limiter = RateLimiter::with_limits(2, Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }
}
