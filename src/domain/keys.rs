//! Store key naming
//!
//! Every domain concept maps to a deterministic `kind:part:part` key so that
//! cascade invalidation can work on prefixes and segments.

use crate::models::FeedType;

pub const PROFILE_PREFIX: &str = "profile:";
pub const SEARCH_PREFIX: &str = "search:";
pub const FEED_PREFIX: &str = "feed:";

pub fn profile(user_id: &str) -> String {
    format!("profile:{}", user_id)
}

pub fn follower_count(user_id: &str) -> String {
    format!("follower_count:{}", user_id)
}

pub fn following_count(user_id: &str) -> String {
    format!("following_count:{}", user_id)
}

pub fn followers(user_id: &str, page: u32) -> String {
    format!("followers:{}:{}", user_id, page)
}

/// Prefix shared by every follower page of `user_id`.
pub fn followers_prefix(user_id: &str) -> String {
    format!("followers:{}:", user_id)
}

pub fn following(user_id: &str, page: u32) -> String {
    format!("following:{}:{}", user_id, page)
}

pub fn following_prefix(user_id: &str) -> String {
    format!("following:{}:", user_id)
}

pub fn relationship(from_id: &str, to_id: &str) -> String {
    format!("relationship:{}:{}", from_id, to_id)
}

/// Search keys are case and whitespace insensitive.
pub fn search(query: &str) -> String {
    let normalized = query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .replace(':', " ");
    format!("{}{}", SEARCH_PREFIX, normalized)
}

pub fn post(post_id: &str) -> String {
    format!("post:{}", post_id)
}

pub fn feed_page(feed_type: FeedType, user_id: &str, page: u32) -> String {
    format!("feed:{}:{}:{}", feed_type, user_id, page)
}

/// Prefix shared by every page of one user's feed.
pub fn feed_prefix(feed_type: FeedType, user_id: &str) -> String {
    format!("feed:{}:{}:", feed_type, user_id)
}

/// Prefix shared by every page of a feed type, across users.
pub fn feed_type_prefix(feed_type: FeedType) -> String {
    format!("feed:{}:", feed_type)
}

/// Extracts the page number of a feed key.
pub fn feed_page_number(key: &str) -> Option<u32> {
    if !key.starts_with(FEED_PREFIX) {
        return None;
    }
    key.rsplit(':').next()?.parse().ok()
}

/// Returns true if any segment of `key` after the kind is `user_id`.
pub fn mentions_user(key: &str, user_id: &str) -> bool {
    key.split(':').skip(1).any(|segment| segment == user_id)
}
