//! Feed Cache
//!
//! Paginated activity-feed pages tagged with staleness metadata, plus the
//! serving policy that decides what to show and whether to refresh.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::TtlStore;
use crate::config::CacheConfig;
use crate::domain::keys;
use crate::domain::notify::{CacheDomain, ChangeKind, ChangeNotifier};
use crate::domain::value::CachedValue;
use crate::models::{FeedEntry, FeedPage, FeedType, PageInfo};
use crate::services::Connectivity;

// == Feed Cache Entry ==
/// A cached page and when it was fetched.
#[derive(Debug, Clone)]
pub struct FeedCacheEntry<T = Vec<FeedEntry>> {
    pub data: T,
    pub timestamp: Instant,
    pub page_info: PageInfo,
}

impl<T> FeedCacheEntry<T> {
    pub fn new(data: T, page_info: PageInfo) -> Self {
        Self {
            data,
            timestamp: Instant::now(),
            page_info,
        }
    }

    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.timestamp)
    }
}

/// Age class of a cached page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Staleness {
    /// age < fresh TTL
    Fresh,
    /// fresh TTL <= age < stale TTL
    Stale,
    /// age >= stale TTL, or no entry
    Expired,
}

/// How a read trades freshness against latency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStrategy {
    /// Stale counts as expired; the caller refreshes before showing data
    Immediate,
    /// Serve stale data and refresh asynchronously
    Background,
    /// Serve anything present; refresh only once expired
    #[default]
    StaleWhileRevalidate,
    /// Serve cache unconditionally when offline, otherwise stale-while-revalidate
    NetworkFirst,
}

/// Outcome reported alongside served feed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    Hit,
    Stale,
    Expired,
    Miss,
    Offline,
}

/// Result of the serving policy.
#[derive(Debug, Clone)]
pub struct FeedLookup {
    pub data: Option<FeedCacheEntry>,
    pub should_refresh: bool,
    pub status: FeedStatus,
}

// == Serving Policy ==
/// Decides refresh and status from staleness, strategy and connectivity.
///
/// Offline reads never ask for a refresh: present data is served flagged
/// `Offline`, whatever its age.
pub fn serving_decision(
    staleness: Option<Staleness>,
    strategy: RefreshStrategy,
    is_connected: bool,
) -> (bool, FeedStatus) {
    let Some(staleness) = staleness else {
        return if is_connected {
            (true, FeedStatus::Miss)
        } else {
            (false, FeedStatus::Offline)
        };
    };

    if !is_connected {
        return (false, FeedStatus::Offline);
    }

    match (strategy, staleness) {
        (_, Staleness::Fresh) => (false, FeedStatus::Hit),
        (RefreshStrategy::Immediate, _) => (true, FeedStatus::Expired),
        (RefreshStrategy::Background, Staleness::Stale) => (true, FeedStatus::Stale),
        (
            RefreshStrategy::StaleWhileRevalidate | RefreshStrategy::NetworkFirst,
            Staleness::Stale,
        ) => (false, FeedStatus::Hit),
        (_, Staleness::Expired) => (true, FeedStatus::Expired),
    }
}

// == Feed Cache ==
#[derive(Debug, Clone)]
pub struct FeedCache {
    store: Arc<TtlStore<CachedValue>>,
    notifier: ChangeNotifier,
    connectivity: Connectivity,
    fresh_ttl: Duration,
    stale_ttl: Duration,
    retention_ttl: Duration,
}

impl FeedCache {
    pub fn new(
        store: Arc<TtlStore<CachedValue>>,
        notifier: ChangeNotifier,
        connectivity: Connectivity,
        config: &CacheConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            connectivity,
            fresh_ttl: config.feed_fresh_ttl,
            stale_ttl: config.feed_stale_ttl,
            retention_ttl: config.feed_retention_ttl.max(config.feed_stale_ttl),
        }
    }

    // == Staleness ==
    pub fn staleness(&self, entry: &FeedCacheEntry) -> Staleness {
        let age = entry.age();
        if age < self.fresh_ttl {
            Staleness::Fresh
        } else if age < self.stale_ttl {
            Staleness::Stale
        } else {
            Staleness::Expired
        }
    }

    // == Pages ==
    pub fn get_feed_page(
        &self,
        feed_type: FeedType,
        user_id: &str,
        page: u32,
    ) -> Option<FeedCacheEntry> {
        let key = keys::feed_page(feed_type, user_id, page);
        let value = self.store.get(&key)?;
        let entry = value.into_feed();
        if entry.is_none() {
            warn!("Cached value under {} is not a feed page", key);
        }
        entry
    }

    pub fn peek_feed_page(
        &self,
        feed_type: FeedType,
        user_id: &str,
        page: u32,
    ) -> Option<FeedCacheEntry> {
        self.store
            .peek(&keys::feed_page(feed_type, user_id, page))
            .and_then(CachedValue::into_feed)
    }

    /// Caches a freshly fetched page. The store keeps it for the retention
    /// period so it stays servable offline after it expires.
    pub fn set_feed_page(&self, feed_type: FeedType, user_id: &str, page: FeedPage) {
        let key = keys::feed_page(feed_type, user_id, page.page_info.page);
        let entry = FeedCacheEntry::new(page.entries, page.page_info);
        match self
            .store
            .set(key.clone(), CachedValue::Feed(entry), self.retention_ttl)
        {
            Ok(()) => self.notifier.notify(CacheDomain::Feed, key, ChangeKind::Updated),
            Err(e) => warn!("Failed to cache feed page {}: {}", key, e),
        }
    }

    // == Get Feed Data ==
    /// Serves a page according to `strategy` and current connectivity.
    pub fn get_feed_data(
        &self,
        feed_type: FeedType,
        user_id: &str,
        page: u32,
        strategy: RefreshStrategy,
    ) -> FeedLookup {
        let entry = self.get_feed_page(feed_type, user_id, page);
        let staleness = entry.as_ref().map(|e| self.staleness(e));
        let (should_refresh, status) =
            serving_decision(staleness, strategy, self.connectivity.is_connected());

        debug!(
            "Feed {}:{}:{} served as {:?} (refresh: {})",
            feed_type, user_id, page, status, should_refresh
        );
        FeedLookup {
            data: entry,
            should_refresh,
            status,
        }
    }

    // == Invalidation ==
    /// Drops every page of every feed type owned by `user_id`.
    pub fn invalidate_user_feeds(&self, user_id: &str) -> usize {
        FeedType::ALL
            .iter()
            .map(|feed_type| self.invalidate_pattern(keys::feed_prefix(*feed_type, user_id)))
            .sum()
    }

    /// Drops every page of `feed_type` for all users.
    pub fn invalidate_feed_type(&self, feed_type: FeedType) -> usize {
        self.invalidate_pattern(keys::feed_type_prefix(feed_type))
    }

    /// Drops pages numbered `min_page` or higher, across all feeds.
    pub fn invalidate_pages_from(&self, min_page: u32) -> usize {
        let removed = self.store.invalidate_where(|key| {
            keys::feed_page_number(key).is_some_and(|page| page >= min_page)
        });
        if removed > 0 {
            self.notifier
                .notify(CacheDomain::Feed, keys::FEED_PREFIX, ChangeKind::Invalidated);
        }
        removed
    }

    fn invalidate_pattern(&self, pattern: String) -> usize {
        let removed = self.store.invalidate_matching(&pattern);
        if removed > 0 {
            self.notifier
                .notify(CacheDomain::Feed, pattern, ChangeKind::Invalidated);
        }
        removed
    }
}
