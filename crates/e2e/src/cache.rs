//! Time-bounded cache entries

use std::time::Duration;

use tokio::time::Instant;

/// A value together with when it was fetched and how long it stays fresh
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    value: T,
    fetched_at: Instant,
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self::fetched_at(value, Instant::now(), ttl)
    }

    pub fn fetched_at(value: T, fetched_at: Instant, ttl: Duration) -> Self {
        Self {
            value,
            fetched_at,
            ttl,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }

    /// Stale once strictly more than `ttl` has passed since the fetch
    pub fn is_stale_at(&self, now: Instant) -> bool {
        self.age_at(now) > self.ttl
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_within_ttl() {
        let t0 = Instant::now();
        let entry = CacheEntry::fetched_at("ps", t0, Duration::from_secs(10));
        assert!(!entry.is_stale_at(t0));
        assert!(!entry.is_stale_at(t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_ttl_boundary_is_still_fresh() {
        let t0 = Instant::now();
        let entry = CacheEntry::fetched_at("ps", t0, Duration::from_secs(10));
        assert!(!entry.is_stale_at(t0 + Duration::from_secs(10)));
        assert!(entry.is_stale_at(t0 + Duration::from_millis(10_001)));
    }

    #[test]
    fn test_clock_before_fetch_counts_as_fresh() {
        let t0 = Instant::now();
        let entry = CacheEntry::fetched_at(1u8, t0 + Duration::from_secs(1), Duration::ZERO);
        assert_eq!(entry.age_at(t0), Duration::ZERO);
        assert!(!entry.is_stale_at(t0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_goes_stale_as_time_passes() {
        let entry = CacheEntry::new(String::from("u0_a1 1234 com.foo"), Duration::from_secs(10));
        assert!(!entry.is_stale());
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(entry.is_stale());
        assert_eq!(entry.value(), "u0_a1 1234 com.foo");
    }
}
