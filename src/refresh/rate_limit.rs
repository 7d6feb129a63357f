//! Sliding-window rate limiter keyed by request id.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    windows: HashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: HashMap::new(),
        }
    }

    // == Try Acquire ==
    /// Records a request for `id` at `now` if the window has room.
    pub fn try_acquire(&mut self, id: &str, now: Instant) -> bool {
        let window = self.window;
        let stamps = self.windows.entry(id.to_string()).or_default();
        while stamps
            .front()
            .is_some_and(|stamp| now.saturating_duration_since(*stamp) >= window)
        {
            stamps.pop_front();
        }

        if stamps.len() >= self.max_requests {
            return false;
        }
        stamps.push_back(now);
        true
    }

    /// Requests recorded for `id` inside the current window.
    pub fn recent(&self, id: &str, now: Instant) -> usize {
        self.windows.get(id).map_or(0, |stamps| {
            stamps
                .iter()
                .filter(|stamp| now.saturating_duration_since(**stamp) < self.window)
                .count()
        })
    }

    // == Prune ==
    /// Forgets ids whose whole window has aged out. Returns how many.
    pub fn prune(&mut self, now: Instant) -> usize {
        let window = self.window;
        let before = self.windows.len();
        self.windows.retain(|_, stamps| {
            stamps
                .back()
                .is_some_and(|last| now.saturating_duration_since(*last) < window)
        });
        before - self.windows.len()
    }

    pub fn tracked_ids(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_allows_up_to_cap() {
        let mut limiter = RateLimiter::new(3, MINUTE);
        let now = Instant::now();

        assert!(limiter.try_acquire("a", now));
        assert!(limiter.try_acquire("a", now));
        assert!(limiter.try_acquire("a", now));
        assert!(!limiter.try_acquire("a", now));
        // Other ids have their own budget
        assert!(limiter.try_acquire("b", now));
        assert_eq!(limiter.recent("a", now), 3);
    }

    #[test]
    fn test_window_slides() {
        let mut limiter = RateLimiter::new(2, MINUTE);
        let start = Instant::now();

        assert!(limiter.try_acquire("a", start));
        assert!(limiter.try_acquire("a", start + Duration::from_secs(30)));
        assert!(!limiter.try_acquire("a", start + Duration::from_secs(59)));
        // First stamp ages out at 60s
        assert!(limiter.try_acquire("a", start + Duration::from_secs(60)));
        assert!(!limiter.try_acquire("a", start + Duration::from_secs(61)));
    }

    #[test]
    fn test_prune_drops_idle_ids() {
        let mut limiter = RateLimiter::new(5, MINUTE);
        let start = Instant::now();
        limiter.try_acquire("old", start);
        limiter.try_acquire("new", start + Duration::from_secs(50));

        assert_eq!(limiter.prune(start + Duration::from_secs(70)), 1);
        assert_eq!(limiter.tracked_ids(), 1);
    }
}
