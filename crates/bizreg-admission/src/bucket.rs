//! Token bucket.
//!
//! Holds up to `burst` tokens, refilled continuously at `rate` tokens per
//! second. Each admitted request consumes one token. Refill is computed
//! lazily from the elapsed time on each call, so an idle bucket costs
//! nothing.

use std::time::Instant;

/// A single client's token bucket. Starts full.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Bucket refilling at `rate` tokens/second with capacity `burst`.
    pub fn new(rate: f64, burst: u32, now: Instant) -> Self {
        let capacity = f64::from(burst);
        Self {
            rate,
            capacity,
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Consume one token if available.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens available at `now`, without consuming any.
    pub fn available(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }

    fn refill(&mut self, now: Instant) {
        // Instants from a mock clock may go "backwards" relative to a bucket
        // created later; saturating_duration_since treats that as no time.
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed.is_zero() {
            return;
        }
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.rate).min(self.capacity);
        self.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    #[test]
    fn burst_one_rate_one() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(1.0, 1, t0);
        assert!(bucket.try_acquire(t0));
        assert!(!bucket.try_acquire(t0));
        assert!(!bucket.try_acquire(t0 + Duration::from_millis(999)));
        assert!(bucket.try_acquire(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn burst_two_back_to_back() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(2.0, 2, t0);
        let results: Vec<bool> = (0..3).map(|_| bucket.try_acquire(t0)).collect();
        assert_eq!(results, vec![true, true, false]);
    }

    #[test]
    fn refill_is_capped_at_burst() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(10.0, 3, t0);
        assert_eq!(bucket.available(t0 + Duration::from_secs(60)), 3.0);
    }

    #[test]
    fn fractional_rate_accumulates() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(0.5, 1, t0);
        assert!(bucket.try_acquire(t0));
        assert!(!bucket.try_acquire(t0 + Duration::from_secs(1)));
        assert!(bucket.try_acquire(t0 + Duration::from_secs(2)));
    }

    proptest! {
        #[test]
        fn never_admits_more_than_burst_plus_refill(
            burst in 1u32..20,
            rate in 0.1f64..50.0,
            calls in 1usize..200,
            step_ms in 0u64..50,
        ) {
            let t0 = Instant::now();
            let mut bucket = TokenBucket::new(rate, burst, t0);
            let mut admitted = 0usize;
            let mut now = t0;
            for _ in 0..calls {
                if bucket.try_acquire(now) {
                    admitted += 1;
                }
                now += Duration::from_millis(step_ms);
            }
            let elapsed = now.duration_since(t0).as_secs_f64();
            let ceiling = f64::from(burst) + elapsed * rate;
            prop_assert!(admitted as f64 <= ceiling + 1e-9);
        }
    }
}
