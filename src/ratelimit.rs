//! Fixed-window rate limiting keyed by client IP.
//!
//! Local to the process by design — each instance enforces its own
//! windows. The table is capped: when more distinct keys arrive than the
//! cap allows, the oldest-inserted keys are evicted first.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Floor on the distinct-key cap.
const MIN_KEY_CAP: usize = 100;
/// Default distinct-key cap.
pub const DEFAULT_KEY_CAP: usize = 20_000;
/// Cadence of the background sweep that drops expired windows.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct WindowEntry {
    count: u32,
    reset_at_ms: i64,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at_ms: i64,
}

impl RateDecision {
    /// Whole seconds until the window resets, rounded up, for
    /// `Retry-After`.
    pub fn retry_after_secs(&self) -> i64 {
        let remaining_ms = (self.reset_at_ms - Utc::now().timestamp_millis()).max(0);
        (remaining_ms + 999) / 1000
    }
}

struct LimiterState {
    entries: HashMap<String, WindowEntry>,
    insertion_order: VecDeque<String>,
}

/// One fixed window: at most `max_requests` per `window` per key.
pub struct RateLimiter {
    max_requests: u32,
    window_ms: i64,
    max_keys: usize,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, max_keys: usize) -> Self {
        RateLimiter {
            max_requests,
            window_ms: window.as_millis() as i64,
            max_keys: max_keys.max(MIN_KEY_CAP),
            state: Mutex::new(LimiterState {
                entries: HashMap::new(),
                insertion_order: VecDeque::new(),
            }),
        }
    }

    /// Count a request against `key` and report whether it is allowed.
    pub fn check(&self, key: &str) -> RateDecision {
        let now = Utc::now().timestamp_millis();
        let mut state = self.state.lock();

        if let Some(entry) = state.entries.get_mut(key) {
            if now < entry.reset_at_ms {
                entry.count += 1;
                return RateDecision {
                    allowed: entry.count <= self.max_requests,
                    remaining: self.max_requests.saturating_sub(entry.count),
                    reset_at_ms: entry.reset_at_ms,
                };
            }
            // window expired: restart it in place
            entry.count = 1;
            entry.reset_at_ms = now + self.window_ms;
            return RateDecision {
                allowed: true,
                remaining: self.max_requests.saturating_sub(1),
                reset_at_ms: entry.reset_at_ms,
            };
        }

        let reset_at_ms = now + self.window_ms;
        state.entries.insert(
            key.to_string(),
            WindowEntry {
                count: 1,
                reset_at_ms,
            },
        );
        state.insertion_order.push_back(key.to_string());
        while state.entries.len() > self.max_keys {
            match state.insertion_order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }
        RateDecision {
            allowed: true,
            remaining: self.max_requests.saturating_sub(1),
            reset_at_ms,
        }
    }

    /// Drop expired windows. Run periodically from a background task.
    pub fn sweep(&self) {
        let now = Utc::now().timestamp_millis();
        let mut state = self.state.lock();
        state.entries.retain(|_, entry| now < entry.reset_at_ms);
        let entries = &state.entries;
        let retained: VecDeque<String> = state
            .insertion_order
            .iter()
            .filter(|key| entries.contains_key(*key))
            .cloned()
            .collect();
        state.insertion_order = retained;
    }

    /// Number of live keys (for tests and health reporting).
    pub fn key_count(&self) -> usize {
        self.state.lock().entries.len()
    }
}

/// The limiter set the HTTP shell consults.
pub struct Limiters {
    /// Verify + work-proof endpoints.
    pub verify: RateLimiter,
    /// Free-tier timestamp windows.
    pub timestamp_minute: RateLimiter,
    pub timestamp_day: RateLimiter,
    /// Pro-tier timestamp windows.
    pub pro_minute: RateLimiter,
    pub pro_day: RateLimiter,
}

impl Limiters {
    pub fn new() -> Self {
        let minute = Duration::from_secs(60);
        let day = Duration::from_secs(24 * 60 * 60);
        Limiters {
            verify: RateLimiter::new(30, minute, DEFAULT_KEY_CAP),
            timestamp_minute: RateLimiter::new(5, minute, DEFAULT_KEY_CAP),
            timestamp_day: RateLimiter::new(10, day, DEFAULT_KEY_CAP),
            pro_minute: RateLimiter::new(30, minute, DEFAULT_KEY_CAP),
            pro_day: RateLimiter::new(500, day, DEFAULT_KEY_CAP),
        }
    }

    pub fn sweep_all(&self) {
        self.verify.sweep();
        self.timestamp_minute.sweep();
        self.timestamp_day.sweep();
        self.pro_minute.sweep();
        self.pro_day.sweep();
    }
}

impl Default for Limiters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit_then_denies() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60), 1000);
        for i in 0..3 {
            let decision = limiter.check("1.2.3.4");
            assert!(decision.allowed, "request {} within limit", i);
        }
        let denied = limiter.check("1.2.3.4");
        assert!(!denied.allowed, "fourth request must be denied");
        assert_eq!(denied.remaining, 0);
        assert!(denied.retry_after_secs() >= 1);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60), 1000);
        assert!(limiter.check("a").allowed);
        assert!(!limiter.check("a").allowed);
        assert!(limiter.check("b").allowed, "a separate key gets its own window");
    }

    #[test]
    fn test_expired_window_restarts() {
        let limiter = RateLimiter::new(1, Duration::from_millis(0), 1000);
        assert!(limiter.check("a").allowed);
        // zero-length window: already expired, restarts immediately
        assert!(limiter.check("a").allowed);
    }

    #[test]
    fn test_fifo_eviction_at_cap() {
        // cap floors at MIN_KEY_CAP
        let limiter = RateLimiter::new(10, Duration::from_secs(60), 1);
        for i in 0..150 {
            limiter.check(&format!("key-{}", i));
        }
        assert_eq!(limiter.key_count(), MIN_KEY_CAP);
        // the earliest keys were evicted, so key-0 gets a fresh window
        assert_eq!(limiter.check("key-0").remaining, 9);
    }

    #[test]
    fn test_sweep_drops_expired_entries() {
        let limiter = RateLimiter::new(10, Duration::from_millis(0), 1000);
        limiter.check("a");
        limiter.check("b");
        limiter.sweep();
        assert_eq!(limiter.key_count(), 0, "expired windows must be swept");
    }

    #[test]
    fn test_limiter_set_defaults() {
        let limiters = Limiters::new();
        assert!(limiters.timestamp_minute.check("ip").allowed);
        limiters.sweep_all();
    }
}
