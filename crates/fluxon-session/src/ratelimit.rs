//! A sliding-window attempt counter, used for both the per-peer and the
//! global handshake rate limits (§4.4: 5/60s per peer, 20/60s global).
//! Deliberately not a fixed 1-second-boundary counter, which would allow a
//! 2x burst straddling the boundary.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub struct SlidingWindowLimiter {
    window: Duration,
    max_attempts: usize,
    attempts: VecDeque<Instant>,
}

impl SlidingWindowLimiter {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            window,
            max_attempts,
            attempts: VecDeque::new(),
        }
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some(&oldest) = self.attempts.front() {
            if now.duration_since(oldest) > self.window {
                self.attempts.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record an attempt at `now` if the window has room; return whether it
    /// was admitted.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.evict_expired(now);
        if self.attempts.len() >= self.max_attempts {
            return false;
        }
        self.attempts.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_up_to_max_within_window() {
        let mut limiter = SlidingWindowLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.try_acquire(now));
        assert!(limiter.try_acquire(now));
        assert!(limiter.try_acquire(now));
        assert!(!limiter.try_acquire(now));
    }

    #[test]
    fn test_expired_attempts_free_up_room() {
        let mut limiter = SlidingWindowLimiter::new(1, Duration::from_millis(10));
        let t0 = Instant::now();
        assert!(limiter.try_acquire(t0));
        assert!(!limiter.try_acquire(t0));
        let later = t0 + Duration::from_millis(11);
        assert!(limiter.try_acquire(later));
    }
}
