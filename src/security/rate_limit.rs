//! Per-client token-bucket rate limiting.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::model::RateLimiterConfig;

/// Slack for float accumulation when comparing token counts.
const TOKEN_EPSILON: f64 = 1e-9;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn refill(&mut self, capacity: f64, refill_rate: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        self.refill(capacity, refill_rate, now);

        if self.tokens + TOKEN_EPSILON >= 1.0 {
            self.tokens = (self.tokens - 1.0).max(0.0);
            true
        } else {
            false
        }
    }

    /// Full again and untouched for at least `idle`.
    fn is_idle(&self, capacity: f64, refill_rate: f64, now: Instant, idle: Duration) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update);
        let tokens = (self.tokens + elapsed.as_secs_f64() * refill_rate).min(capacity);
        elapsed >= idle && tokens + TOKEN_EPSILON >= capacity
    }
}

/// One lazily created bucket per client address.
///
/// Rate and burst are fixed at construction.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<IpAddr, TokenBucket>,
    rate: f64,
    burst: f64,
}

impl RateLimiter {
    /// `tps` tokens per second, bucket capacity `size`.
    pub fn new(tps: u32, size: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            rate: f64::from(tps),
            burst: f64::from(size),
        }
    }

    pub fn from_config(config: &RateLimiterConfig) -> Self {
        Self::new(config.tps, config.size)
    }

    /// Time for one token to accrue, rounded up to whole nanoseconds.
    pub fn token_interval(&self) -> Duration {
        if self.rate > 0.0 {
            Duration::from_nanos((1e9 / self.rate).ceil() as u64)
        } else {
            Duration::MAX
        }
    }

    pub fn check(&self, client: IpAddr) -> bool {
        self.check_at(client, Instant::now())
    }

    /// Take a token for `client` as of `now`.
    pub fn check_at(&self, client: IpAddr, now: Instant) -> bool {
        let mut bucket = self
            .buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::new(self.burst, now));
        bucket.try_acquire(self.burst, self.rate, now)
    }

    /// Drop buckets that are full and have been idle for `idle`. Returns how many were removed.
    pub fn sweep_idle(&self, idle: Duration) -> usize {
        self.sweep_idle_at(Instant::now(), idle)
    }

    pub fn sweep_idle_at(&self, now: Instant, idle: Duration) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| !bucket.is_idle(self.burst, self.rate, now, idle));
        before.saturating_sub(self.buckets.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_burst_then_refill() {
        let limiter = RateLimiter::new(10, 5);
        let client = ip("10.0.0.5");
        let start = Instant::now();

        for i in 0..5 {
            assert!(limiter.check_at(client, start), "request {i} should pass");
        }
        assert!(!limiter.check_at(client, start));

        let later = start + limiter.token_interval();
        assert!(limiter.check_at(client, later));
        assert!(!limiter.check_at(client, later));
    }

    #[test]
    fn test_one_token_per_interval_at_uneven_rates() {
        for rate in [3, 7, 1024, RateLimiterConfig::DEFAULT_TPS] {
            let limiter = RateLimiter::new(rate, 2);
            let client = ip("10.0.0.9");
            let start = Instant::now();

            assert!(limiter.check_at(client, start));
            assert!(limiter.check_at(client, start));
            assert!(!limiter.check_at(client, start), "rate {rate}: burst exhausted");

            let interval = limiter.token_interval();
            let mut now = start;
            for step in 1..=5 {
                now += interval;
                assert!(limiter.check_at(client, now), "rate {rate}: interval {step} should admit");
                assert!(!limiter.check_at(client, now), "rate {rate}: interval {step} admits only one");
            }
        }
    }

    #[test]
    fn test_clients_have_separate_buckets() {
        let limiter = RateLimiter::new(1, 1);
        let now = Instant::now();

        assert!(limiter.check_at(ip("10.0.0.1"), now));
        assert!(!limiter.check_at(ip("10.0.0.1"), now));
        assert!(limiter.check_at(ip("10.0.0.2"), now));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_refill_caps_at_burst() {
        let limiter = RateLimiter::new(100, 3);
        let client = ip("::1");
        let start = Instant::now();

        assert!(limiter.check_at(client, start));
        let much_later = start + Duration::from_secs(60);
        for _ in 0..3 {
            assert!(limiter.check_at(client, much_later));
        }
        assert!(!limiter.check_at(client, much_later));
    }

    #[test]
    fn test_sweep_removes_only_idle_full_buckets() {
        let limiter = RateLimiter::new(1, 2);
        let start = Instant::now();

        limiter.check_at(ip("10.0.0.1"), start);
        limiter.check_at(ip("10.0.0.2"), start + Duration::from_secs(50));

        let removed = limiter.sweep_idle_at(start + Duration::from_secs(60), Duration::from_secs(30));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_concurrent_first_sight_shares_one_bucket() {
        let limiter = Arc::new(RateLimiter::new(1, 100));
        let now = Instant::now();
        let client = ip("10.1.1.1");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..25).filter(|_| limiter.check_at(client, now)).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(admitted, 100);
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
