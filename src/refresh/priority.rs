//! Refresh priorities
//!
//! Each priority fixes a debounce interval and a retry budget. Ordering is
//! by urgency: `Critical < High < Medium < Low`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Base delay of the exponential retry backoff.
pub const BACKOFF_BASE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl RefreshPriority {
    /// Quiet period before a debounced request fires.
    pub fn debounce_interval(&self) -> Duration {
        match self {
            RefreshPriority::Critical => Duration::from_millis(100),
            RefreshPriority::High => Duration::from_millis(500),
            RefreshPriority::Medium => Duration::from_secs(2),
            RefreshPriority::Low => Duration::from_secs(5),
        }
    }

    /// Retries after the first failed attempt.
    pub fn max_retries(&self) -> u32 {
        match self {
            RefreshPriority::Critical => 3,
            RefreshPriority::High => 2,
            RefreshPriority::Medium => 1,
            RefreshPriority::Low => 0,
        }
    }
}

impl fmt::Display for RefreshPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefreshPriority::Critical => "critical",
            RefreshPriority::High => "high",
            RefreshPriority::Medium => "medium",
            RefreshPriority::Low => "low",
        };
        f.write_str(name)
    }
}

/// Delay before retry number `attempt + 1`: `0.5s * 2^attempt`.
pub fn backoff_delay(attempt: u32) -> Duration {
    BACKOFF_BASE * 2u32.saturating_pow(attempt.min(16))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert!(RefreshPriority::Critical < RefreshPriority::High);
        assert!(RefreshPriority::High < RefreshPriority::Medium);
        assert!(RefreshPriority::Medium < RefreshPriority::Low);
    }

    #[test]
    fn test_debounce_intervals() {
        assert_eq!(RefreshPriority::Critical.debounce_interval(), Duration::from_millis(100));
        assert_eq!(RefreshPriority::Low.debounce_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_budgets() {
        let retries: Vec<u32> = [
            RefreshPriority::Critical,
            RefreshPriority::High,
            RefreshPriority::Medium,
            RefreshPriority::Low,
        ]
        .iter()
        .map(RefreshPriority::max_retries)
        .collect();
        assert_eq!(retries, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_backoff_delay() {
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
    }
}
