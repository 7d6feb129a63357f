//! Configuration Module
//!
//! Handles loading cache and refresh configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Cache and refresh scheduling parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries the TTL store can hold
    pub max_entries: usize,
    /// Maximum total estimated cost (bytes) of the TTL store
    pub max_cost: usize,
    /// Feed pages younger than this are fresh
    pub feed_fresh_ttl: Duration,
    /// Feed pages younger than this (but not fresh) are stale
    pub feed_stale_ttl: Duration,
    /// How long feed pages stay in the store so they can be served offline
    pub feed_retention_ttl: Duration,
    /// Non-user-initiated requests allowed per id per minute
    pub max_requests_per_minute: usize,
    /// Maximum number of refresh operations executing at once
    pub max_concurrent_refreshes: usize,
    /// Interval between maintenance passes
    pub maintenance_interval: Duration,
    /// Total cost above which maintenance runs an aggressive cleanup
    pub cost_budget: usize,
    /// Execution window granted when the host enters the background
    pub background_window: Duration,
    /// Pause between sequential requests while draining
    pub drain_pause: Duration,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SOCIAL_CACHE_MAX_ENTRIES` - Maximum store entries (default: 1000)
    /// - `SOCIAL_CACHE_MAX_COST` - Maximum store cost in bytes (default: 10 MiB)
    /// - `SOCIAL_CACHE_FEED_FRESH_SECS` - Feed fresh TTL (default: 300)
    /// - `SOCIAL_CACHE_FEED_STALE_SECS` - Feed stale TTL (default: 1800)
    /// - `SOCIAL_CACHE_FEED_RETENTION_SECS` - Feed retention (default: 86400)
    /// - `SOCIAL_CACHE_MAX_REQUESTS_PER_MINUTE` - Rate limit per id (default: 30)
    /// - `SOCIAL_CACHE_MAX_CONCURRENT_REFRESHES` - Concurrency cap (default: 4)
    /// - `SOCIAL_CACHE_MAINTENANCE_SECS` - Maintenance interval (default: 300)
    /// - `SOCIAL_CACHE_COST_BUDGET` - Aggressive cleanup threshold (default: 8 MiB)
    /// - `SOCIAL_CACHE_BACKGROUND_WINDOW_SECS` - Background window (default: 25)
    /// - `SOCIAL_CACHE_DRAIN_PAUSE_MS` - Pause between drained requests (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env_or("SOCIAL_CACHE_MAX_ENTRIES", defaults.max_entries),
            max_cost: env_or("SOCIAL_CACHE_MAX_COST", defaults.max_cost),
            feed_fresh_ttl: env_secs_or("SOCIAL_CACHE_FEED_FRESH_SECS", defaults.feed_fresh_ttl),
            feed_stale_ttl: env_secs_or("SOCIAL_CACHE_FEED_STALE_SECS", defaults.feed_stale_ttl),
            feed_retention_ttl: env_secs_or(
                "SOCIAL_CACHE_FEED_RETENTION_SECS",
                defaults.feed_retention_ttl,
            ),
            max_requests_per_minute: env_or(
                "SOCIAL_CACHE_MAX_REQUESTS_PER_MINUTE",
                defaults.max_requests_per_minute,
            ),
            max_concurrent_refreshes: env_or(
                "SOCIAL_CACHE_MAX_CONCURRENT_REFRESHES",
                defaults.max_concurrent_refreshes,
            ),
            maintenance_interval: env_secs_or(
                "SOCIAL_CACHE_MAINTENANCE_SECS",
                defaults.maintenance_interval,
            ),
            cost_budget: env_or("SOCIAL_CACHE_COST_BUDGET", defaults.cost_budget),
            background_window: env_secs_or(
                "SOCIAL_CACHE_BACKGROUND_WINDOW_SECS",
                defaults.background_window,
            ),
            drain_pause: env::var("SOCIAL_CACHE_DRAIN_PAUSE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.drain_pause),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_cost: 10 * 1024 * 1024,
            feed_fresh_ttl: Duration::from_secs(5 * 60),
            feed_stale_ttl: Duration::from_secs(30 * 60),
            feed_retention_ttl: Duration::from_secs(24 * 60 * 60),
            max_requests_per_minute: 30,
            max_concurrent_refreshes: 4,
            maintenance_interval: Duration::from_secs(5 * 60),
            cost_budget: 8 * 1024 * 1024,
            background_window: Duration::from_secs(25),
            drain_pause: Duration::from_millis(100),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs_or(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.feed_fresh_ttl, Duration::from_secs(300));
        assert_eq!(config.feed_stale_ttl, Duration::from_secs(1800));
        assert_eq!(config.max_requests_per_minute, 30);
        assert_eq!(config.maintenance_interval, Duration::from_secs(300));
        assert!(config.cost_budget <= config.max_cost);
    }

    #[test]
    fn test_config_from_env_defaults() {
        env::remove_var("SOCIAL_CACHE_MAX_ENTRIES");
        env::remove_var("SOCIAL_CACHE_FEED_FRESH_SECS");
        env::remove_var("SOCIAL_CACHE_MAX_REQUESTS_PER_MINUTE");
        env::remove_var("SOCIAL_CACHE_DRAIN_PAUSE_MS");

        let config = CacheConfig::from_env();
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.feed_fresh_ttl, Duration::from_secs(300));
        assert_eq!(config.max_requests_per_minute, 30);
        assert_eq!(config.drain_pause, Duration::from_millis(100));
    }

    #[test]
    fn test_config_from_env_override() {
        env::set_var("SOCIAL_CACHE_COST_BUDGET", "4096");
        let config = CacheConfig::from_env();
        assert_eq!(config.cost_budget, 4096);
        env::remove_var("SOCIAL_CACHE_COST_BUDGET");
    }
}
