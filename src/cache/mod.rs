//! Cache Module
//!
//! Provides the generic TTL store: per-entry expiration, bounded entry count
//! and cost, recency-based eviction.

mod entry;
mod lru;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use lru::{least_recently_used, AccessStamp, LruClock};
pub use stats::{CacheStats, StatsRecorder};
pub use store::{CacheCost, TtlStore};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Share of tracked keys dropped by an eviction pass that is still over budget
pub const EVICTION_FRACTION: f64 = 0.5;
