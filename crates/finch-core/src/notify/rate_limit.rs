//! Per-user notification rate limiting
//!
//! Hour and day counters each keep their own window start and reset once a
//! full window has elapsed since that start, not on clock boundaries.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

#[derive(Debug, Clone)]
struct Counters {
    hour_count: u32,
    hour_start: DateTime<Utc>,
    day_count: u32,
    day_start: DateTime<Utc>,
}

impl Counters {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            hour_count: 0,
            hour_start: now,
            day_count: 0,
            day_start: now,
        }
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        if now - self.hour_start >= Duration::hours(1) {
            self.hour_count = 0;
            self.hour_start = now;
        }
        if now - self.day_start >= Duration::hours(24) {
            self.day_count = 0;
            self.day_start = now;
        }
    }
}

/// Process-local rate limiter keyed by user id
#[derive(Debug, Default)]
pub struct RateLimiter {
    counters: DashMap<String, Counters>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    /// Whether another notification fits in both windows
    pub fn is_allowed(
        &self,
        user_id: &str,
        max_per_hour: u32,
        max_per_day: u32,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(mut counters) = self.counters.get_mut(user_id) else {
            return max_per_hour > 0 && max_per_day > 0;
        };
        counters.roll(now);
        counters.hour_count < max_per_hour && counters.day_count < max_per_day
    }

    /// Count a delivered notification against both windows
    pub fn record(&self, user_id: &str, now: DateTime<Utc>) {
        let mut counters = self
            .counters
            .entry(user_id.to_string())
            .or_insert_with(|| Counters::new(now));
        counters.roll(now);
        counters.hour_count += 1;
        counters.day_count += 1;
    }

    /// Current (hour, day) counts after rolling expired windows
    pub fn counts(&self, user_id: &str, now: DateTime<Utc>) -> (u32, u32) {
        match self.counters.get_mut(user_id) {
            Some(mut counters) => {
                counters.roll(now);
                (counters.hour_count, counters.day_count)
            }
            None => (0, 0),
        }
    }

    /// Forget a user's counters
    pub fn reset(&self, user_id: &str) {
        self.counters.remove(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_hourly_limit() {
        let limiter = RateLimiter::new();
        for i in 0..3 {
            assert!(limiter.is_allowed("u1", 3, 50, t0() + Duration::minutes(i)));
            limiter.record("u1", t0() + Duration::minutes(i));
        }
        assert!(!limiter.is_allowed("u1", 3, 50, t0() + Duration::minutes(10)));
        // Other users are unaffected
        assert!(limiter.is_allowed("u2", 3, 50, t0()));
    }

    #[test]
    fn test_hour_window_is_relative_to_start() {
        let limiter = RateLimiter::new();
        limiter.record("u1", t0());
        limiter.record("u1", t0());
        // Crossing 11:00 does not reset; the window started at 10:30
        assert!(!limiter.is_allowed("u1", 2, 50, t0() + Duration::minutes(45)));
        assert!(limiter.is_allowed("u1", 2, 50, t0() + Duration::minutes(60)));
        assert_eq!(limiter.counts("u1", t0() + Duration::minutes(60)), (0, 2));
    }

    #[test]
    fn test_daily_limit_independent_of_hourly() {
        let limiter = RateLimiter::new();
        for h in 0..4 {
            limiter.record("u1", t0() + Duration::hours(h));
        }
        assert_eq!(limiter.counts("u1", t0() + Duration::hours(4)), (0, 4));
        assert!(!limiter.is_allowed("u1", 10, 4, t0() + Duration::hours(4)));
        assert!(limiter.is_allowed("u1", 10, 4, t0() + Duration::hours(24)));
    }

    #[test]
    fn test_zero_limit_blocks() {
        let limiter = RateLimiter::new();
        assert!(!limiter.is_allowed("u1", 0, 50, t0()));
    }

    #[test]
    fn test_reset() {
        let limiter = RateLimiter::new();
        limiter.record("u1", t0());
        limiter.reset("u1");
        assert_eq!(limiter.counts("u1", t0()), (0, 0));
    }
}
