//! Fixed-window rate limiter keyed by client identifier (peer address,
//! API-key hash, etc).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const DEFAULT_STRIPES: usize = 16;

struct Window {
    start: Instant,
    count: u32,
}

/// Fixed-window limiter: at most `max_requests` admitted per `window` per
/// key. Each stripe guards its own slice of the key space with its own
/// mutex, mirroring the resource cache's striping so a burst on one client
/// key never blocks another.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    stripes: Vec<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    /// Create a limiter admitting `max_requests` per `window` per key.
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self::with_stripes(max_requests, window, DEFAULT_STRIPES)
    }

    /// Create a limiter with an explicit stripe count.
    #[must_use]
    pub fn with_stripes(max_requests: u32, window: Duration, stripe_count: usize) -> Self {
        let stripe_count = stripe_count.max(1);
        Self {
            max_requests,
            window,
            stripes: (0..stripe_count).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    /// A limiter that admits everything; used when rate limiting is
    /// disabled by configuration.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::with_stripes(u32::MAX, Duration::from_secs(1), 1)
    }

    /// Check and record one request for `key`. Returns `false` (do not
    /// invoke a handler) once `max_requests` have been admitted within the
    /// current window for this key.
    pub fn admit(&self, key: &str) -> bool {
        if self.max_requests == u32::MAX {
            return true;
        }
        let stripe = &self.stripes[stripe_index(key, self.stripes.len())];
        let mut windows = stripe.lock();
        let now = Instant::now();
        let entry = windows.entry(key.to_string()).or_insert(Window { start: now, count: 0 });
        if now.duration_since(entry.start) >= self.window {
            entry.start = now;
            entry.count = 0;
        }
        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }
}

fn stripe_index(key: &str, stripe_count: usize) -> usize {
    let mut hash: u32 = 5381;
    for b in key.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(u32::from(b));
    }
    (hash as usize) % stripe_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_max_requests_per_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.admit("a"));
        assert!(limiter.admit("a"));
        assert!(limiter.admit("a"));
        assert!(!limiter.admit("a"));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.admit("a"));
        assert!(limiter.admit("b"));
        assert!(!limiter.admit("a"));
    }

    #[test]
    fn window_resets_after_elapsed_duration() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.admit("a"));
        assert!(!limiter.admit("a"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.admit("a"));
    }

    #[test]
    fn unbounded_always_admits() {
        let limiter = RateLimiter::unbounded();
        for _ in 0..1000 {
            assert!(limiter.admit("anyone"));
        }
    }
}
