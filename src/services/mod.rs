//! External collaborators
//!
//! Narrow async interfaces to the backend services the coordinator fetches
//! from, plus the connectivity signal. Implementations are injected as
//! `Arc<dyn Trait>`.

mod connectivity;
mod memory;

use async_trait::async_trait;

use crate::models::{FeedPage, FeedType, Profile, RelationshipStatus};

pub use connectivity::{ConnectionState, Connectivity, ConnectivityMonitor};
pub use memory::InMemoryBackend;

#[async_trait]
pub trait ProfileService: Send + Sync {
    async fn fetch_profile(&self, user_id: &str) -> anyhow::Result<Profile>;
    async fn fetch_current_user_profile(&self) -> anyhow::Result<Profile>;
}

#[async_trait]
pub trait SocialGraphService: Send + Sync {
    async fn get_follower_count(&self, user_id: &str) -> anyhow::Result<u64>;
    async fn get_following_count(&self, user_id: &str) -> anyhow::Result<u64>;
    async fn get_followers(&self, user_id: &str, page: u32) -> anyhow::Result<Vec<Profile>>;
    async fn get_following(&self, user_id: &str, page: u32) -> anyhow::Result<Vec<Profile>>;
    async fn get_relationship(
        &self,
        from_id: &str,
        to_id: &str,
    ) -> anyhow::Result<RelationshipStatus>;
}

#[async_trait]
pub trait FeedService: Send + Sync {
    async fn fetch_feed_page(
        &self,
        feed_type: FeedType,
        user_id: &str,
        page: u32,
    ) -> anyhow::Result<FeedPage>;
}

#[async_trait]
pub trait UserSearchService: Send + Sync {
    async fn search_users(&self, query: &str) -> anyhow::Result<Vec<Profile>>;
}
