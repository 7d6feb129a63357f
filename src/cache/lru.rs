//! LRU Tracking Module
//!
//! Implements recency tracking for capacity-driven eviction.
//!
//! Each stored slot carries an [`AccessStamp`] taken from a shared
//! [`LruClock`]. Stamps are atomics so reads holding only a shared lock can
//! still record recency.

use std::sync::atomic::{AtomicU64, Ordering};

// == LRU Clock ==
/// Monotonic logical clock handing out access ticks.
#[derive(Debug, Default)]
pub struct LruClock {
    tick: AtomicU64,
}

impl LruClock {
    // == Constructor ==
    /// Creates a new clock starting at tick zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Next Tick ==
    /// Returns a tick strictly greater than every tick handed out before.
    pub fn next(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }
}

// == Access Stamp ==
/// Last-access tick of one slot.
#[derive(Debug)]
pub struct AccessStamp(AtomicU64);

impl AccessStamp {
    pub fn new(tick: u64) -> Self {
        Self(AtomicU64::new(tick))
    }

    // == Touch ==
    /// Marks the slot as used at `tick`.
    pub fn touch(&self, tick: u64) {
        self.0.fetch_max(tick, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

// == Least Recently Used ==
/// Returns up to `count` keys ordered from least to most recently used.
pub fn least_recently_used<'a, I>(stamps: I, count: usize) -> Vec<String>
where
    I: IntoIterator<Item = (&'a String, u64)>,
{
    let mut ordered: Vec<(u64, &String)> = stamps.into_iter().map(|(k, t)| (t, k)).collect();
    ordered.sort_unstable_by_key(|(tick, _)| *tick);
    ordered
        .into_iter()
        .take(count)
        .map(|(_, key)| key.clone())
        .collect()
}
