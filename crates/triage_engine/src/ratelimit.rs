//! Token-bucket rate limiting.
//!
//! One bucket holds `count` tokens and refills at `count / window` tokens per
//! second, lazily, from elapsed wall time on each acquisition. Buckets are
//! partitioned per policy by an optional key field's value; evaluators on
//! different threads share the buckets.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

/// A single token bucket with lazy refill.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A bucket admitting `count` records per `window_secs` seconds, starting
    /// full.
    #[must_use]
    pub fn new(count: u64, window_secs: u64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let capacity = count as f64;
        #[allow(clippy::cast_precision_loss)]
        let window = window_secs.max(1) as f64;
        Self {
            capacity,
            refill_per_sec: capacity / window,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Takes one token, refilling from elapsed time first.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            state.last_refill = now;
        }
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Rate-limit buckets for one policy, keyed by the configured key field's
/// value (the empty string when no key is configured or the field is absent).
#[derive(Debug)]
pub struct KeyedLimiter {
    count: u64,
    window_secs: u64,
    buckets: RwLock<HashMap<String, Arc<TokenBucket>>>,
}

impl KeyedLimiter {
    /// A limiter admitting `count` records per `window_secs` per key value.
    #[must_use]
    pub fn new(count: u64, window_secs: u64) -> Self {
        Self {
            count,
            window_secs,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Acquires one token from the bucket for `key`, creating the bucket on
    /// first use.
    pub fn try_acquire(&self, key: &str) -> bool {
        let existing = self.buckets.read().get(key).cloned();
        let bucket = existing.unwrap_or_else(|| {
            let mut buckets = self.buckets.write();
            Arc::clone(
                buckets
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(TokenBucket::new(self.count, self.window_secs))),
            )
        });
        let admitted = bucket.try_acquire();
        if !admitted {
            tracing::debug!(key, "rate limit exhausted");
        }
        admitted
    }

    /// Number of distinct key values seen so far.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn burst_admits_exactly_capacity() {
        let bucket = TokenBucket::new(2, 1);
        let admitted = (0..10).filter(|_| bucket.try_acquire()).count();
        assert_eq!(admitted, 2);
    }

    #[test]
    fn refill_restores_tokens() {
        let bucket = TokenBucket::new(2, 1);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());

        thread::sleep(Duration::from_millis(1100));
        assert!(bucket.try_acquire());
    }

    #[test]
    fn refill_never_exceeds_capacity() {
        let bucket = TokenBucket::new(3, 1);
        thread::sleep(Duration::from_millis(50));
        let admitted = (0..10).filter(|_| bucket.try_acquire()).count();
        assert_eq!(admitted, 3);
    }

    #[test]
    fn minute_window_admits_count_in_burst() {
        let bucket = TokenBucket::new(5, 60);
        let admitted = (0..20).filter(|_| bucket.try_acquire()).count();
        assert_eq!(admitted, 5);
    }

    #[test]
    fn keys_get_independent_buckets() {
        let limiter = KeyedLimiter::new(1, 3600);
        assert!(limiter.try_acquire("tenant-a"));
        assert!(!limiter.try_acquire("tenant-a"));
        assert!(limiter.try_acquire("tenant-b"));
        assert!(!limiter.try_acquire("tenant-b"));
        assert_eq!(limiter.bucket_count(), 2);
    }

    #[test]
    fn empty_key_is_a_regular_bucket() {
        let limiter = KeyedLimiter::new(2, 3600);
        assert!(limiter.try_acquire(""));
        assert!(limiter.try_acquire(""));
        assert!(!limiter.try_acquire(""));
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn concurrent_acquisitions_never_over_admit() {
        let limiter = Arc::new(KeyedLimiter::new(100, 3600));
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || (0..20).filter(|_| limiter.try_acquire("shared")).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 100);
    }
}
