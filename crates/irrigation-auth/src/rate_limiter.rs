use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Sliding-window counter of failed login attempts per identity. Only
/// failures are counted; a success resets the identity's window entirely.
pub struct RateLimiter {
    window_us: u64,
    max_attempts: u32,
    attempts: Mutex<HashMap<String, VecDeque<u64>>>,
}

impl RateLimiter {
    pub fn new(window_us: u64, max_attempts: u32) -> Self {
        Self {
            window_us,
            max_attempts,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn purge(window: &mut VecDeque<u64>, now_us: u64, window_us: u64) {
        while let Some(&oldest) = window.front() {
            if now_us.saturating_sub(oldest) > window_us {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn is_limited(&self, identity: &str, now_us: u64) -> bool {
        let mut attempts = self.attempts.lock().unwrap();
        match attempts.get_mut(identity) {
            Some(window) => {
                Self::purge(window, now_us, self.window_us);
                window.len() as u32 >= self.max_attempts
            }
            None => false,
        }
    }

    pub fn record_failure(&self, identity: &str, now_us: u64) {
        let mut attempts = self.attempts.lock().unwrap();
        let window = attempts.entry(identity.to_string()).or_default();
        Self::purge(window, now_us, self.window_us);
        window.push_back(now_us);
    }

    pub fn record_success(&self, identity: &str) {
        self.attempts.lock().unwrap().remove(identity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_scenario_auth_rate_limit() {
        let limiter = RateLimiter::new(5 * 60 * 1_000_000, 3);
        let mut results = Vec::new();
        for i in 0..6 {
            let now = i * 1_000_000;
            results.push(limiter.is_limited("u", now));
            limiter.record_failure("u", now);
        }
        assert_eq!(results, vec![false, false, false, true, true, true]);
    }

    #[test]
    fn success_resets_the_window() {
        let limiter = RateLimiter::new(5 * 60 * 1_000_000, 2);
        limiter.record_failure("u", 0);
        limiter.record_failure("u", 1);
        assert!(limiter.is_limited("u", 2));
        limiter.record_success("u");
        assert!(!limiter.is_limited("u", 3));
    }
}
