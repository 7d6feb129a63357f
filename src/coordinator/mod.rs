//! Cache Coordinator
//!
//! The only component that talks to the external services. It serves reads
//! from the domain caches, decides when and at which priority to refresh,
//! and cascades invalidation when social interactions happen.

mod events;
mod health;
mod operations;

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cache::TtlStore;
use crate::config::CacheConfig;
use crate::domain::{
    CachedValue, ChangeNotifier, DataChange, FeedCache, FeedStatus, RefreshStrategy,
    SocialDataCache,
};
use crate::error::{CacheError, Result};
use crate::models::{FeedEntry, FeedType, PageInfo, Profile, RelationshipStatus};
use crate::refresh::{
    RefreshConfig, RefreshCoordinator, RefreshOperation, RefreshPriority, RefreshRequest,
};
use crate::services::{
    Connectivity, FeedService, ProfileService, SocialGraphService, UserSearchService,
};

pub use events::{AppEvent, SocialInteraction};
pub use health::{recommendations, CacheHealthReport, MaintenanceReport};

/// Feed pages at or beyond this number are dropped first under cost pressure.
pub const FAR_PAGE_THRESHOLD: u32 = 2;

// == Services ==
/// Handles to every external collaborator.
#[derive(Clone)]
pub struct Services {
    pub profiles: Arc<dyn ProfileService>,
    pub social: Arc<dyn SocialGraphService>,
    pub feeds: Arc<dyn FeedService>,
    pub search: Arc<dyn UserSearchService>,
}

impl Services {
    /// Uses one backend for every collaborator role.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ProfileService + SocialGraphService + FeedService + UserSearchService + 'static,
    {
        Self {
            profiles: backend.clone(),
            social: backend.clone(),
            feeds: backend.clone(),
            search: backend,
        }
    }
}

/// A feed page as handed to the UI.
#[derive(Debug, Clone, Serialize)]
pub struct FeedLoad {
    pub entries: Option<Vec<FeedEntry>>,
    pub page_info: Option<PageInfo>,
    pub status: FeedStatus,
}

impl FeedLoad {
    fn from_cache(data: Option<crate::domain::FeedCacheEntry>, status: FeedStatus) -> Self {
        match data {
            Some(entry) => Self {
                entries: Some(entry.data),
                page_info: Some(entry.page_info),
                status,
            },
            None => Self {
                entries: None,
                page_info: None,
                status,
            },
        }
    }
}

// == Cache Coordinator ==
/// Cheap to clone; clones share every cache and the refresh scheduler.
#[derive(Clone)]
pub struct CacheCoordinator {
    config: CacheConfig,
    store: Arc<TtlStore<CachedValue>>,
    social: SocialDataCache,
    feed: FeedCache,
    refresh: RefreshCoordinator,
    services: Services,
    connectivity: Connectivity,
    notifier: ChangeNotifier,
    current_user: Arc<RwLock<Option<String>>>,
}

impl CacheCoordinator {
    // == Constructor ==
    /// Builds every cache layer and the refresh scheduler from `config`.
    pub fn new(config: CacheConfig, services: Services, connectivity: Connectivity) -> Self {
        let store = Arc::new(TtlStore::from_config(&config));
        let notifier = ChangeNotifier::default();
        let social = SocialDataCache::new(Arc::clone(&store), notifier.clone());
        let feed = FeedCache::new(
            Arc::clone(&store),
            notifier.clone(),
            connectivity.clone(),
            &config,
        );
        let refresh = RefreshCoordinator::new(RefreshConfig::from(&config));

        info!(
            "Cache coordinator initialized: max_entries={}, cost_budget={}",
            config.max_entries, config.cost_budget
        );
        Self {
            config,
            store,
            social,
            feed,
            refresh,
            services,
            connectivity,
            notifier,
            current_user: Arc::new(RwLock::new(None)),
        }
    }

    // == Accessors ==
    pub fn store(&self) -> &Arc<TtlStore<CachedValue>> {
        &self.store
    }

    pub fn social_cache(&self) -> &SocialDataCache {
        &self.social
    }

    pub fn feed_cache(&self) -> &FeedCache {
        &self.feed
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Subscribes to data-changed notifications from every cache domain.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<DataChange> {
        self.notifier.subscribe()
    }

    pub fn current_user(&self) -> Option<String> {
        self.current_user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_current_user(&self, user_id: Option<String>) -> Option<String> {
        let mut guard = self
            .current_user
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, user_id)
    }

    fn require_user(&self) -> Result<String> {
        self.current_user().ok_or(CacheError::NoActiveUser)
    }

    // == Peek ==
    pub fn peek_profile(&self, user_id: &str) -> Option<Profile> {
        self.social.peek_profile(user_id)
    }

    pub fn peek_feed_page(
        &self,
        feed_type: FeedType,
        user_id: &str,
        page: u32,
    ) -> Option<Vec<FeedEntry>> {
        self.feed
            .peek_feed_page(feed_type, user_id, page)
            .map(|entry| entry.data)
    }

    // == Generic Load ==
    /// Serves `cached` when present.
    ///
    /// On a miss, fetches inline at high priority within the id's rate
    /// limit, joining an execution already running for the same id.
    /// Passive failures are logged and yield whatever the cache holds. A
    /// user-initiated load always refetches and propagates failure.
    async fn load<T, F>(
        &self,
        id: String,
        cached: Option<T>,
        user_initiated: bool,
        operation: RefreshOperation,
        reread: F,
    ) -> Result<Option<T>>
    where
        F: Fn() -> Option<T>,
    {
        if user_initiated {
            if !self.connectivity.is_connected() {
                return Err(CacheError::Offline(id));
            }
            self.refresh
                .run_shared(id, RefreshPriority::Critical, operation)
                .await?;
            return Ok(reread());
        }

        if cached.is_some() {
            return Ok(cached);
        }
        if !self.connectivity.is_connected() {
            debug!("Skipping fetch of {} while offline", id);
            return Ok(None);
        }

        match self
            .refresh
            .run_limited(id.clone(), RefreshPriority::High, operation)
            .await
        {
            Ok(()) => {}
            Err(CacheError::RateLimited(_)) => debug!("Passive load of {} rate limited", id),
            Err(e) => warn!("Passive load of {} failed: {}", id, e),
        }
        Ok(reread())
    }

    // == Loads ==
    pub async fn load_profile(
        &self,
        user_id: &str,
        user_initiated: bool,
    ) -> Result<Option<Profile>> {
        let (id, op) = operations::profile(self, user_id);
        let cached = self.social.get_profile(user_id);
        self.load(id, cached, user_initiated, op, || {
            self.social.peek_profile(user_id)
        })
        .await
    }

    pub async fn load_follower_count(
        &self,
        user_id: &str,
        user_initiated: bool,
    ) -> Result<Option<u64>> {
        let (id, op) = operations::follower_count(self, user_id);
        let cached = self.social.get_follower_count(user_id);
        self.load(id, cached, user_initiated, op, || {
            self.social.get_follower_count(user_id)
        })
        .await
    }

    pub async fn load_following_count(
        &self,
        user_id: &str,
        user_initiated: bool,
    ) -> Result<Option<u64>> {
        let (id, op) = operations::following_count(self, user_id);
        let cached = self.social.get_following_count(user_id);
        self.load(id, cached, user_initiated, op, || {
            self.social.get_following_count(user_id)
        })
        .await
    }

    pub async fn load_followers(
        &self,
        user_id: &str,
        page: u32,
        user_initiated: bool,
    ) -> Result<Option<Vec<Profile>>> {
        let (id, op) = operations::followers(self, user_id, page);
        let cached = self.social.get_followers(user_id, page);
        self.load(id, cached, user_initiated, op, || {
            self.social.get_followers(user_id, page)
        })
        .await
    }

    pub async fn load_following(
        &self,
        user_id: &str,
        page: u32,
        user_initiated: bool,
    ) -> Result<Option<Vec<Profile>>> {
        let (id, op) = operations::following(self, user_id, page);
        let cached = self.social.get_following(user_id, page);
        self.load(id, cached, user_initiated, op, || {
            self.social.get_following(user_id, page)
        })
        .await
    }

    pub async fn load_relationship(
        &self,
        from_id: &str,
        to_id: &str,
        user_initiated: bool,
    ) -> Result<Option<RelationshipStatus>> {
        let (id, op) = operations::relationship(self, from_id, to_id);
        let cached = self.social.get_relationship(from_id, to_id);
        self.load(id, cached, user_initiated, op, || {
            self.social.get_relationship(from_id, to_id)
        })
        .await
    }

    /// Cached user search. Results live for five minutes.
    pub async fn search_users(
        &self,
        query: &str,
        user_initiated: bool,
    ) -> Result<Option<Vec<Profile>>> {
        let (id, op) = operations::search(self, query);
        let cached = self.social.get_search_results(query);
        self.load(id, cached, user_initiated, op, || {
            self.social.get_search_results(query)
        })
        .await
    }

    // == Load Feed ==
    /// Serves a feed page according to `strategy`.
    ///
    /// Misses and `Immediate` refreshes are fetched before returning; other
    /// refreshes are scheduled in the background. When a page is served
    /// online on an inexpensive link, the next page is prefetched at low
    /// priority.
    pub async fn load_feed(
        &self,
        feed_type: FeedType,
        user_id: &str,
        page: u32,
        strategy: RefreshStrategy,
        user_initiated: bool,
    ) -> Result<FeedLoad> {
        let (id, op) = operations::feed_page(self, feed_type, user_id, page);

        if user_initiated {
            if !self.connectivity.is_connected() {
                return Err(CacheError::Offline(id));
            }
            self.refresh
                .run_shared(id, RefreshPriority::Critical, op)
                .await?;
            let load = self.served_page(feed_type, user_id, page);
            self.prefetch_next(feed_type, user_id, &load);
            return Ok(load);
        }

        let lookup = self.feed.get_feed_data(feed_type, user_id, page, strategy);
        if !lookup.should_refresh {
            let load = FeedLoad::from_cache(lookup.data, lookup.status);
            if load.status == FeedStatus::Hit {
                self.prefetch_next(feed_type, user_id, &load);
            }
            return Ok(load);
        }

        let blocking = lookup.data.is_none() || strategy == RefreshStrategy::Immediate;
        if !blocking {
            self.refresh
                .schedule(RefreshRequest::new(id, RefreshPriority::Medium, false, op));
            return Ok(FeedLoad::from_cache(lookup.data, lookup.status));
        }

        match self
            .refresh
            .run_limited(id.clone(), RefreshPriority::High, op)
            .await
        {
            Ok(()) => {
                let load = self.served_page(feed_type, user_id, page);
                self.prefetch_next(feed_type, user_id, &load);
                Ok(load)
            }
            Err(e) => {
                warn!("Feed refresh of {} failed, serving cache: {}", id, e);
                Ok(FeedLoad::from_cache(lookup.data, lookup.status))
            }
        }
    }

    /// Freshly refreshed page, or a miss if it vanished in between.
    fn served_page(&self, feed_type: FeedType, user_id: &str, page: u32) -> FeedLoad {
        match self.feed.peek_feed_page(feed_type, user_id, page) {
            Some(entry) => FeedLoad::from_cache(Some(entry), FeedStatus::Hit),
            None => FeedLoad::from_cache(None, FeedStatus::Miss),
        }
    }

    fn prefetch_next(&self, feed_type: FeedType, user_id: &str, load: &FeedLoad) {
        let Some(info) = &load.page_info else {
            return;
        };
        let state = self.connectivity.state();
        if !info.has_next_page || !state.is_connected || state.is_expensive {
            return;
        }
        let next = info.page + 1;
        if self.feed.peek_feed_page(feed_type, user_id, next).is_some() {
            return;
        }
        let (id, op) = operations::feed_page(self, feed_type, user_id, next);
        self.refresh
            .schedule(RefreshRequest::new(id, RefreshPriority::Low, false, op));
    }

    // == Refresh Everything ==
    /// User-initiated "refresh everything": drains pending urgent requests,
    /// then refetches the current user's profile and first activity page.
    pub async fn refresh_all(&self) -> Result<()> {
        let user_id = self.require_user()?;
        if !self.connectivity.is_connected() {
            return Err(CacheError::Offline(user_id));
        }
        self.refresh.refresh_critical_data().await;
        self.load_profile(&user_id, true).await?;
        self.load_feed(FeedType::Activity, &user_id, 0, RefreshStrategy::Immediate, true)
            .await?;
        Ok(())
    }

    /// Schedules a background refresh unless offline.
    fn request_background(
        &self,
        (id, op): (String, RefreshOperation),
        priority: RefreshPriority,
    ) {
        if !self.connectivity.is_connected() {
            debug!("Skipping background refresh of {} while offline", id);
            return;
        }
        self.refresh
            .schedule(RefreshRequest::new(id, priority, false, op));
    }

    // == Memory ==
    /// Host low-memory signal.
    pub fn on_memory_warning(&self) -> usize {
        self.store.handle_memory_pressure()
    }
}
