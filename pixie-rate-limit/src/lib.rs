//! Token-bucket rate limiting.
//!
//! The auth core needs exactly one process-wide bucket admitting token
//! validations (`RateLimiter::global`). The keyed variant is kept alongside
//! it for call sites that want independent buckets per caller (e.g. per
//! plugin) without inventing a second crate for it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Refill tokens based on elapsed time and try to consume one.
/// Returns `true` if a token was consumed, `false` if rate-limited.
#[inline]
fn refill_and_try_consume(
    tokens: &mut f64,
    last_refill: &mut Instant,
    max_tokens: f64,
    window: Duration,
) -> bool {
    let now = Instant::now();
    let elapsed = now.duration_since(*last_refill);
    let refill = (elapsed.as_secs_f64() / window.as_secs_f64()) * max_tokens;
    *tokens = (*tokens + refill).min(max_tokens);
    *last_refill = now;

    if *tokens >= 1.0 {
        *tokens -= 1.0;
        true
    } else {
        false
    }
}

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

/// A single process-wide token bucket admitting one resource (e.g. all
/// `validateToken` calls, regardless of caller).
///
/// Uses a `std::sync::Mutex` rather than `DashMap` since there is exactly one
/// bucket — a map would just add indirection for a single entry.
pub struct GlobalRateLimiter {
    bucket: std::sync::Mutex<TokenBucket>,
    max_tokens: f64,
    window: Duration,
    rejected: AtomicU64,
}

impl GlobalRateLimiter {
    /// `rate_per_sec` sustained rate, `burst` maximum instantaneous tokens.
    pub fn new(rate_per_sec: f64, burst: f64) -> Self {
        Self {
            bucket: std::sync::Mutex::new(TokenBucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
            max_tokens: burst,
            window: Duration::from_secs_f64(burst / rate_per_sec.max(f64::MIN_POSITIVE)),
            rejected: AtomicU64::new(0),
        }
    }

    /// The configuration the spec calls for: ~10/s sustained, burst ~30.
    pub fn default_auth_admitter() -> Self {
        Self::new(10.0, 30.0)
    }

    /// Try to consume a single token. Returns `true` if admitted.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().expect("rate limiter mutex poisoned");
        let admitted =
            refill_and_try_consume(&mut bucket.tokens, &mut bucket.last_refill, self.max_tokens, self.window);
        if !admitted {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
        admitted
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// A token-bucket rate limiter keyed by an arbitrary type, each key getting
/// its own independent bucket.
#[derive(Clone)]
pub struct RateLimiter<K> {
    buckets: std::sync::Arc<DashMap<K, TokenBucket>>,
    max_tokens: f64,
    window: Duration,
}

impl<K: Eq + std::hash::Hash + Clone> RateLimiter<K> {
    pub fn new(max: u64, window: Duration) -> Self {
        Self {
            buckets: std::sync::Arc::new(DashMap::new()),
            max_tokens: max as f64,
            window,
        }
    }

    pub fn try_acquire(&self, key: &K) -> bool {
        let mut entry = self.buckets.entry(key.clone()).or_insert_with(|| TokenBucket {
            tokens: self.max_tokens,
            last_refill: Instant::now(),
        });
        let bucket = entry.value_mut();
        refill_and_try_consume(&mut bucket.tokens, &mut bucket.last_refill, self.max_tokens, self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_throttle() {
        let limiter = GlobalRateLimiter::new(10.0, 30.0);
        for _ in 0..30 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.rejected_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refills_over_time() {
        let limiter = GlobalRateLimiter::new(10.0, 30.0);
        for _ in 0..30 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());

        tokio::time::advance(Duration::from_millis(500)).await;
        // At 10/s, 500ms should refill ~5 tokens.
        let mut admitted = 0;
        for _ in 0..10 {
            if limiter.try_acquire() {
                admitted += 1;
            }
        }
        assert!((3..=7).contains(&admitted), "admitted = {admitted}");
    }

    #[test]
    fn keyed_buckets_are_independent() {
        let limiter: RateLimiter<&str> = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.try_acquire(&"a"));
        assert!(limiter.try_acquire(&"a"));
        assert!(!limiter.try_acquire(&"a"));
        // A different key has its own bucket.
        assert!(limiter.try_acquire(&"b"));
    }
}
