//! Time-bounded result cache, owned by the caller of the pipeline.
//!
//! The pipeline itself stays stateless; whoever drives it decides whether
//! a previous result is still fresh enough to reuse, and can drop it early
//! via [`TtlCache::invalidate`] (the "refresh" action).

use std::time::{Duration, Instant};

pub struct TtlCache<T> {
    ttl: Duration,
    entry: Option<(T, Instant)>,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    /// Cached value, if one was stored less than a TTL ago.
    pub fn get(&self) -> Option<&T> {
        match &self.entry {
            Some((value, stored_at)) if stored_at.elapsed() < self.ttl => Some(value),
            _ => None,
        }
    }

    /// Store a fresh value, arming the TTL from now.
    pub fn put(&mut self, value: T) {
        self.entry = Some((value, Instant::now()));
    }

    /// Drop the cached value regardless of age.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_value_is_served() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        assert!(cache.get().is_none());

        cache.put(42);
        assert_eq!(cache.get(), Some(&42));
    }

    #[test]
    fn test_expired_value_is_not_served() {
        let mut cache = TtlCache::new(Duration::ZERO);
        cache.put(42);
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_invalidate_clears_before_expiry() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.put(42);
        cache.invalidate();
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_put_rearms_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.put(1);
        cache.put(2);
        assert_eq!(cache.get(), Some(&2));
    }
}
