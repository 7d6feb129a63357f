//! TTL Store Module
//!
//! Main cache engine combining HashMap storage with recency tracking, cost
//! accounting and TTL expiration.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::lru::{least_recently_used, AccessStamp, LruClock};
use crate::cache::{CacheEntry, CacheStats, StatsRecorder, EVICTION_FRACTION, MAX_KEY_LENGTH};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Cache Cost ==
/// Estimated memory footprint of a cached value, used for capacity accounting.
pub trait CacheCost {
    fn estimated_cost(&self) -> usize;
}

impl CacheCost for String {
    fn estimated_cost(&self) -> usize {
        self.len()
    }
}

impl CacheCost for u64 {
    fn estimated_cost(&self) -> usize {
        std::mem::size_of::<u64>()
    }
}

impl<T: CacheCost> CacheCost for Vec<T> {
    fn estimated_cost(&self) -> usize {
        self.iter().map(CacheCost::estimated_cost).sum()
    }
}

#[derive(Debug)]
struct Slot<V> {
    entry: CacheEntry<V>,
    cost: usize,
    last_access: AccessStamp,
}

#[derive(Debug)]
struct StoreInner<V> {
    slots: HashMap<String, Slot<V>>,
    total_cost: usize,
}

impl<V> StoreInner<V> {
    fn remove(&mut self, key: &str) -> bool {
        match self.slots.remove(key) {
            Some(slot) => {
                self.total_cost = self.total_cost.saturating_sub(slot.cost);
                true
            }
            None => false,
        }
    }

    fn remove_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let matching: Vec<String> = self
            .slots
            .keys()
            .filter(|key| predicate(key))
            .cloned()
            .collect();

        for key in &matching {
            self.remove(key);
        }
        matching.len()
    }

    /// Removes up to `count` least recently used keys, never touching `protect`.
    fn evict_lru(&mut self, count: usize, protect: Option<&str>) -> usize {
        let victims = least_recently_used(
            self.slots
                .iter()
                .filter(|(key, _)| Some(key.as_str()) != protect)
                .map(|(key, slot)| (key, slot.last_access.get())),
            count,
        );

        for key in &victims {
            self.remove(key);
        }
        victims.len()
    }
}

// == TTL Store ==
/// Generic key/value cache with per-entry expiration and bounded size/cost.
///
/// All operations take `&self`; the store is meant to be shared behind an
/// `Arc`. Reads run under a shared lock, mutations under an exclusive one.
#[derive(Debug)]
pub struct TtlStore<V> {
    inner: RwLock<StoreInner<V>>,
    clock: LruClock,
    stats: StatsRecorder,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// Maximum total estimated cost allowed
    max_cost: usize,
}

impl<V> TtlStore<V>
where
    V: CacheCost + Clone,
{
    // == Constructor ==
    /// Creates a new TtlStore with the specified bounds.
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of entries the store can hold
    /// * `max_cost` - Maximum total estimated cost of all entries
    pub fn new(max_entries: usize, max_cost: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                slots: HashMap::new(),
                total_cost: 0,
            }),
            clock: LruClock::new(),
            stats: StatsRecorder::new(),
            max_entries: max_entries.max(1),
            max_cost: max_cost.max(1),
        }
    }

    /// Creates a new TtlStore from configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.max_cost)
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner<V>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner<V>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // == Get ==
    /// Retrieves a live value by key.
    ///
    /// Returns `None` on a miss. An expired entry counts as a miss and is
    /// removed as a side effect.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let inner = self.read();
            match inner.slots.get(key) {
                Some(slot) if !slot.entry.is_expired_at(now) => {
                    slot.last_access.touch(self.clock.next());
                    self.stats.record_hit();
                    return Some(slot.entry.value.clone());
                }
                Some(_) => {}
                None => {
                    self.stats.record_miss();
                    return None;
                }
            }
        }

        // Expired: upgrade to an exclusive lock and re-check, a concurrent
        // set may have replaced the entry in between.
        let mut inner = self.write();
        let still_expired = inner
            .slots
            .get(key)
            .is_some_and(|slot| slot.entry.is_expired_at(now));
        if still_expired {
            inner.remove(key);
            debug!("Removed expired entry on read: {}", key);
        }
        self.stats.record_miss();
        None
    }

    // == Peek ==
    /// Returns a live value without touching statistics or recency.
    pub fn peek(&self, key: &str) -> Option<V> {
        let inner = self.read();
        inner
            .slots
            .get(key)
            .filter(|slot| !slot.entry.is_expired())
            .map(|slot| slot.entry.value.clone())
    }

    // == Set ==
    /// Stores a value under `key` for `ttl`, replacing any prior entry.
    ///
    /// If the store ends up over its entry or cost limit, an eviction pass
    /// runs before returning. A value whose cost alone exceeds the cost
    /// limit is rejected.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Lifetime of the new entry
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) -> Result<()> {
        let key = key.into();
        if key.is_empty() {
            return Err(CacheError::InvalidKey("Key must not be empty".to_string()));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidKey(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }

        let cost = value.estimated_cost() + key.len();
        if cost > self.max_cost {
            return Err(CacheError::CapacityExceeded(format!(
                "Entry {} costs {} but the store limit is {}",
                key, cost, self.max_cost
            )));
        }

        let mut inner = self.write();
        inner.remove(&key);
        let slot = Slot {
            entry: CacheEntry::new(value, ttl),
            cost,
            last_access: AccessStamp::new(self.clock.next()),
        };
        inner.slots.insert(key.clone(), slot);
        inner.total_cost += cost;

        if self.over_budget(&inner) {
            self.eviction_pass(&mut inner, Some(&key));
        }
        Ok(())
    }

    fn over_budget(&self, inner: &StoreInner<V>) -> bool {
        inner.slots.len() > self.max_entries || inner.total_cost > self.max_cost
    }

    /// Expired entries go first; if still over budget, the least recently
    /// used fraction of keys follows, then single keys until within limits.
    fn eviction_pass(&self, inner: &mut StoreInner<V>, protect: Option<&str>) {
        let mut removed = inner.remove_expired(Instant::now());

        if self.over_budget(inner) {
            let fraction = (inner.slots.len() as f64 * EVICTION_FRACTION) as usize;
            let excess = inner.slots.len().saturating_sub(self.max_entries);
            removed += inner.evict_lru(fraction.max(excess), protect);
        }

        while self.over_budget(inner) {
            if inner.evict_lru(1, protect) == 0 {
                break;
            }
            removed += 1;
        }

        self.stats.record_evictions(removed as u64);
        info!(
            "Eviction pass removed {} entries ({} remaining, cost {})",
            removed,
            inner.slots.len(),
            inner.total_cost
        );
    }

    // == Remove ==
    /// Removes an entry by key. Returns true if it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.write().remove(key)
    }

    // == Remove All ==
    /// Drops every entry. Statistics counters are kept.
    pub fn remove_all(&self) {
        let mut inner = self.write();
        inner.slots.clear();
        inner.total_cost = 0;
    }

    // == Remove Expired ==
    /// Sweeps all tracked keys and removes expired ones.
    ///
    /// Returns the number of entries removed.
    pub fn remove_expired(&self) -> usize {
        self.write().remove_expired(Instant::now())
    }

    // == Invalidate ==
    /// Removes every key containing `pattern`. Returns the number removed.
    pub fn invalidate_matching(&self, pattern: &str) -> usize {
        let removed = self.write().remove_where(|key| key.contains(pattern));
        if removed > 0 {
            debug!("Invalidated {} entries matching '{}'", removed, pattern);
        }
        removed
    }

    /// Removes every key accepted by `predicate`. Returns the number removed.
    pub fn invalidate_where<F>(&self, predicate: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        self.write().remove_where(predicate)
    }

    // == Memory Pressure ==
    /// Responds to a host low-memory signal: drops expired entries, then
    /// the least recently used fraction of what remains.
    pub fn handle_memory_pressure(&self) -> usize {
        let mut inner = self.write();
        let mut removed = inner.remove_expired(Instant::now());
        let fraction = (inner.slots.len() as f64 * EVICTION_FRACTION) as usize;
        removed += inner.evict_lru(fraction, None);
        self.stats.record_evictions(removed as u64);
        info!("Memory pressure eviction removed {} entries", removed);
        removed
    }

    // == Statistics ==
    /// Returns current store statistics.
    pub fn statistics(&self) -> CacheStats {
        let inner = self.read();
        self.stats.snapshot(inner.slots.len(), inner.total_cost)
    }

    /// Returns true if `key` holds a live entry.
    pub fn contains(&self, key: &str) -> bool {
        self.peek(key).is_some()
    }

    /// Returns every tracked key, live or not.
    pub fn keys(&self) -> Vec<String> {
        self.read().slots.keys().cloned().collect()
    }

    // == Length ==
    /// Returns the current number of tracked entries.
    pub fn len(&self) -> usize {
        self.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().slots.is_empty()
    }

    /// Returns the total estimated cost of tracked entries.
    pub fn total_cost(&self) -> usize {
        self.read().total_cost
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}
