//! Social Data Cache
//!
//! Typed façade over the TTL store for profiles, follower/following counts
//! and lists, relationship status, posts and user search results.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::TtlStore;
use crate::domain::keys;
use crate::domain::notify::{CacheDomain, ChangeKind, ChangeNotifier};
use crate::domain::value::CachedValue;
use crate::models::{FeedEntry, Profile, RelationshipStatus};

// == TTL Classes ==
pub const PROFILE_TTL: Duration = Duration::from_secs(5 * 60);
pub const COUNT_TTL: Duration = Duration::from_secs(2 * 60);
pub const LIST_TTL: Duration = Duration::from_secs(60);
pub const RELATIONSHIP_TTL: Duration = Duration::from_secs(30);
pub const SEARCH_TTL: Duration = Duration::from_secs(5 * 60);
pub const POST_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct SocialDataCache {
    store: Arc<TtlStore<CachedValue>>,
    notifier: ChangeNotifier,
}

impl SocialDataCache {
    pub fn new(store: Arc<TtlStore<CachedValue>>, notifier: ChangeNotifier) -> Self {
        Self { store, notifier }
    }

    fn read<T>(&self, key: &str, extract: fn(CachedValue) -> Option<T>) -> Option<T> {
        let value = self.store.get(key)?;
        let typed = extract(value);
        if typed.is_none() {
            warn!("Cached value under {} has an unexpected type", key);
        }
        typed
    }

    fn write(&self, domain: CacheDomain, key: String, value: CachedValue, ttl: Duration) {
        match self.store.set(key.clone(), value, ttl) {
            Ok(()) => self.notifier.notify(domain, key, ChangeKind::Updated),
            Err(e) => warn!("Failed to cache {}: {}", key, e),
        }
    }

    fn drop_key(&self, domain: CacheDomain, key: String) {
        if self.store.remove(&key) {
            self.notifier.notify(domain, key, ChangeKind::Invalidated);
        }
    }

    fn drop_matching(&self, domain: CacheDomain, pattern: String) -> usize {
        let removed = self.store.invalidate_matching(&pattern);
        if removed > 0 {
            self.notifier.notify(domain, pattern, ChangeKind::Invalidated);
        }
        removed
    }

    // == Profiles ==
    pub fn get_profile(&self, user_id: &str) -> Option<Profile> {
        self.read(&keys::profile(user_id), CachedValue::into_profile)
    }

    /// Non-counting read for immediately available data.
    pub fn peek_profile(&self, user_id: &str) -> Option<Profile> {
        self.store
            .peek(&keys::profile(user_id))
            .and_then(CachedValue::into_profile)
    }

    pub fn set_profile(&self, profile: Profile) {
        let key = keys::profile(&profile.user_id);
        self.write(CacheDomain::Profile, key, CachedValue::Profile(profile), PROFILE_TTL);
    }

    pub fn invalidate_profile(&self, user_id: &str) {
        self.drop_key(CacheDomain::Profile, keys::profile(user_id));
    }

    // == Counts ==
    pub fn get_follower_count(&self, user_id: &str) -> Option<u64> {
        self.read(&keys::follower_count(user_id), CachedValue::into_count)
    }

    pub fn set_follower_count(&self, user_id: &str, count: u64) {
        let key = keys::follower_count(user_id);
        self.write(CacheDomain::Social, key, CachedValue::Count(count), COUNT_TTL);
    }

    pub fn get_following_count(&self, user_id: &str) -> Option<u64> {
        self.read(&keys::following_count(user_id), CachedValue::into_count)
    }

    pub fn set_following_count(&self, user_id: &str, count: u64) {
        let key = keys::following_count(user_id);
        self.write(CacheDomain::Social, key, CachedValue::Count(count), COUNT_TTL);
    }

    // == Lists ==
    pub fn get_followers(&self, user_id: &str, page: u32) -> Option<Vec<Profile>> {
        self.read(&keys::followers(user_id, page), CachedValue::into_profiles)
    }

    pub fn set_followers(&self, user_id: &str, page: u32, followers: Vec<Profile>) {
        let key = keys::followers(user_id, page);
        self.write(CacheDomain::Social, key, CachedValue::Profiles(followers), LIST_TTL);
    }

    pub fn get_following(&self, user_id: &str, page: u32) -> Option<Vec<Profile>> {
        self.read(&keys::following(user_id, page), CachedValue::into_profiles)
    }

    pub fn set_following(&self, user_id: &str, page: u32, following: Vec<Profile>) {
        let key = keys::following(user_id, page);
        self.write(CacheDomain::Social, key, CachedValue::Profiles(following), LIST_TTL);
    }

    // == Relationship ==
    pub fn get_relationship(&self, from_id: &str, to_id: &str) -> Option<RelationshipStatus> {
        self.read(&keys::relationship(from_id, to_id), CachedValue::into_relationship)
    }

    pub fn set_relationship(&self, from_id: &str, to_id: &str, status: RelationshipStatus) {
        let key = keys::relationship(from_id, to_id);
        self.write(
            CacheDomain::Social,
            key,
            CachedValue::Relationship(status),
            RELATIONSHIP_TTL,
        );
    }

    // == Posts ==
    pub fn get_post(&self, post_id: &str) -> Option<FeedEntry> {
        self.read(&keys::post(post_id), CachedValue::into_post)
    }

    pub fn set_post(&self, post: FeedEntry) {
        let key = keys::post(&post.post_id);
        self.write(CacheDomain::Feed, key, CachedValue::Post(post), POST_TTL);
    }

    pub fn invalidate_post(&self, post_id: &str) {
        self.drop_key(CacheDomain::Feed, keys::post(post_id));
    }

    // == Search ==
    pub fn get_search_results(&self, query: &str) -> Option<Vec<Profile>> {
        self.read(&keys::search(query), CachedValue::into_profiles)
    }

    pub fn set_search_results(&self, query: &str, results: Vec<Profile>) {
        let key = keys::search(query);
        self.write(CacheDomain::Search, key, CachedValue::Profiles(results), SEARCH_TTL);
    }

    /// Drops every cached search. Returns the number of entries removed.
    pub fn invalidate_search_results(&self) -> usize {
        self.drop_matching(CacheDomain::Search, keys::SEARCH_PREFIX.to_string())
    }

    // == Cascades ==
    /// Invalidates both parties' lists, counts and mutual relationship
    /// entries after a follow, unfollow or block between `from_id` and `to_id`.
    pub fn invalidate_relationship_change(&self, from_id: &str, to_id: &str) {
        for user_id in [from_id, to_id] {
            self.drop_matching(CacheDomain::Social, keys::followers_prefix(user_id));
            self.drop_matching(CacheDomain::Social, keys::following_prefix(user_id));
            self.drop_key(CacheDomain::Social, keys::follower_count(user_id));
            self.drop_key(CacheDomain::Social, keys::following_count(user_id));
        }
        self.drop_key(CacheDomain::Social, keys::relationship(from_id, to_id));
        self.drop_key(CacheDomain::Social, keys::relationship(to_id, from_id));
        debug!("Invalidated social graph entries for {} -> {}", from_id, to_id);
    }

    /// Drops every non-feed entry that mentions `user_id`.
    pub fn invalidate_user(&self, user_id: &str) -> usize {
        let removed = self.store.invalidate_where(|key| {
            !key.starts_with(keys::FEED_PREFIX) && keys::mentions_user(key, user_id)
        });
        if removed > 0 {
            self.notifier
                .notify(CacheDomain::Social, user_id, ChangeKind::Invalidated);
        }
        removed
    }
}
