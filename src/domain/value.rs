//! Cached value wrapper
//!
//! One tagged union per store, so every domain type shares the same TTL store
//! without runtime downcasting. A read that finds the wrong variant is a miss.

use crate::cache::CacheCost;
use crate::domain::feed::FeedCacheEntry;
use crate::models::{FeedEntry, Profile, RelationshipStatus};

#[derive(Debug, Clone)]
pub enum CachedValue {
    Profile(Profile),
    Count(u64),
    Profiles(Vec<Profile>),
    Relationship(RelationshipStatus),
    Post(FeedEntry),
    Feed(FeedCacheEntry),
}

impl CachedValue {
    pub fn into_profile(self) -> Option<Profile> {
        match self {
            CachedValue::Profile(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn into_count(self) -> Option<u64> {
        match self {
            CachedValue::Count(count) => Some(count),
            _ => None,
        }
    }

    pub fn into_profiles(self) -> Option<Vec<Profile>> {
        match self {
            CachedValue::Profiles(profiles) => Some(profiles),
            _ => None,
        }
    }

    pub fn into_relationship(self) -> Option<RelationshipStatus> {
        match self {
            CachedValue::Relationship(status) => Some(status),
            _ => None,
        }
    }

    pub fn into_post(self) -> Option<FeedEntry> {
        match self {
            CachedValue::Post(post) => Some(post),
            _ => None,
        }
    }

    pub fn into_feed(self) -> Option<FeedCacheEntry> {
        match self {
            CachedValue::Feed(entry) => Some(entry),
            _ => None,
        }
    }
}

// == Cost Estimates ==
// Rough byte counts: string payloads plus a fixed overhead per struct.

impl CacheCost for Profile {
    fn estimated_cost(&self) -> usize {
        64 + self.user_id.len()
            + self.username.len()
            + self.display_name.len()
            + self.avatar_url.as_ref().map_or(0, String::len)
            + self.bio.as_ref().map_or(0, String::len)
    }
}

impl CacheCost for FeedEntry {
    fn estimated_cost(&self) -> usize {
        48 + self.post_id.len() + self.author_id.len() + self.summary.len()
    }
}

impl CacheCost for FeedCacheEntry {
    fn estimated_cost(&self) -> usize {
        32 + self.data.estimated_cost() + self.page_info.cursor.as_ref().map_or(0, String::len)
    }
}

impl CacheCost for CachedValue {
    fn estimated_cost(&self) -> usize {
        match self {
            CachedValue::Profile(profile) => profile.estimated_cost(),
            CachedValue::Count(count) => count.estimated_cost(),
            CachedValue::Profiles(profiles) => profiles.estimated_cost(),
            CachedValue::Relationship(_) => 3,
            CachedValue::Post(post) => post.estimated_cost(),
            CachedValue::Feed(entry) => entry.estimated_cost(),
        }
    }
}
