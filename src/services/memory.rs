//! In-memory backend
//!
//! Implements every collaborator trait over plain maps. Used by the demo
//! binary and tests; supports failure injection, artificial latency and
//! per-operation call counters.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{FeedEntry, FeedPage, FeedType, Profile, RelationshipStatus};
use crate::services::{FeedService, ProfileService, SocialGraphService, UserSearchService};

#[derive(Debug, Default)]
struct BackendState {
    current_user: Option<String>,
    profiles: HashMap<String, Profile>,
    /// user -> users they follow
    following: HashMap<String, Vec<String>>,
    blocked: HashSet<(String, String)>,
    posts: Vec<FeedEntry>,
    calls: HashMap<&'static str, usize>,
}

#[derive(Debug)]
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
    page_size: usize,
    failures_remaining: AtomicUsize,
    latency: Mutex<Duration>,
}

impl InMemoryBackend {
    pub fn new(page_size: usize) -> Self {
        Self {
            state: Mutex::new(BackendState::default()),
            page_size: page_size.max(1),
            failures_remaining: AtomicUsize::new(0),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Seeding ==
    pub fn add_profile(&self, profile: Profile) {
        self.state().profiles.insert(profile.user_id.clone(), profile);
    }

    pub fn sign_in(&self, user_id: &str) {
        self.state().current_user = Some(user_id.to_string());
    }

    pub fn sign_out(&self) {
        self.state().current_user = None;
    }

    pub fn follow(&self, from_id: &str, to_id: &str) {
        let mut state = self.state();
        let list = state.following.entry(from_id.to_string()).or_default();
        if !list.iter().any(|id| id == to_id) {
            list.push(to_id.to_string());
        }
    }

    pub fn unfollow(&self, from_id: &str, to_id: &str) {
        if let Some(list) = self.state().following.get_mut(from_id) {
            list.retain(|id| id != to_id);
        }
    }

    pub fn block(&self, from_id: &str, to_id: &str) {
        self.unfollow(from_id, to_id);
        self.unfollow(to_id, from_id);
        self.state()
            .blocked
            .insert((from_id.to_string(), to_id.to_string()));
    }

    /// Publishes a post and returns its id.
    pub fn add_post(&self, author_id: &str, summary: &str) -> String {
        let mut state = self.state();
        let post_id = format!("p{}", state.posts.len() + 1);
        state.posts.push(FeedEntry {
            post_id: post_id.clone(),
            author_id: author_id.to_string(),
            summary: summary.to_string(),
            posted_at: Utc::now(),
            like_count: 0,
            comment_count: 0,
        });
        post_id
    }

    // == Test Controls ==
    /// Makes the next `count` calls fail.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Number of calls made to `operation` so far.
    pub fn calls(&self, operation: &str) -> usize {
        self.state().calls.get(operation).copied().unwrap_or(0)
    }

    async fn enter(&self, operation: &'static str) -> anyhow::Result<()> {
        *self.state().calls.entry(operation).or_insert(0) += 1;

        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            bail!("injected failure in {}", operation);
        }
        Ok(())
    }

    fn followers_of(state: &BackendState, user_id: &str) -> Vec<String> {
        let mut followers: Vec<String> = state
            .following
            .iter()
            .filter(|(_, targets)| targets.iter().any(|id| id == user_id))
            .map(|(follower, _)| follower.clone())
            .collect();
        followers.sort();
        followers
    }

    fn profile_of(state: &BackendState, user_id: &str) -> Profile {
        state
            .profiles
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| Profile::new(user_id, user_id))
    }

    fn paginate(&self, ids: &[String], page: u32, state: &BackendState) -> Vec<Profile> {
        ids.iter()
            .skip(page as usize * self.page_size)
            .take(self.page_size)
            .map(|id| Self::profile_of(state, id))
            .collect()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(20)
    }
}

#[async_trait]
impl ProfileService for InMemoryBackend {
    async fn fetch_profile(&self, user_id: &str) -> anyhow::Result<Profile> {
        self.enter("fetch_profile").await?;
        let state = self.state();
        let mut profile = state
            .profiles
            .get(user_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown user {}", user_id))?;
        profile.follower_count = Self::followers_of(&state, user_id).len() as u64;
        profile.following_count = state.following.get(user_id).map_or(0, Vec::len) as u64;
        Ok(profile)
    }

    async fn fetch_current_user_profile(&self) -> anyhow::Result<Profile> {
        let user_id = self
            .state()
            .current_user
            .clone()
            .ok_or_else(|| anyhow!("no signed-in user"))?;
        self.fetch_profile(&user_id).await
    }
}

#[async_trait]
impl SocialGraphService for InMemoryBackend {
    async fn get_follower_count(&self, user_id: &str) -> anyhow::Result<u64> {
        self.enter("get_follower_count").await?;
        Ok(Self::followers_of(&self.state(), user_id).len() as u64)
    }

    async fn get_following_count(&self, user_id: &str) -> anyhow::Result<u64> {
        self.enter("get_following_count").await?;
        Ok(self.state().following.get(user_id).map_or(0, Vec::len) as u64)
    }

    async fn get_followers(&self, user_id: &str, page: u32) -> anyhow::Result<Vec<Profile>> {
        self.enter("get_followers").await?;
        let state = self.state();
        let ids = Self::followers_of(&state, user_id);
        Ok(self.paginate(&ids, page, &state))
    }

    async fn get_following(&self, user_id: &str, page: u32) -> anyhow::Result<Vec<Profile>> {
        self.enter("get_following").await?;
        let state = self.state();
        let ids = state.following.get(user_id).cloned().unwrap_or_default();
        Ok(self.paginate(&ids, page, &state))
    }

    async fn get_relationship(
        &self,
        from_id: &str,
        to_id: &str,
    ) -> anyhow::Result<RelationshipStatus> {
        self.enter("get_relationship").await?;
        let state = self.state();
        let follows = |a: &str, b: &str| {
            state
                .following
                .get(a)
                .is_some_and(|targets| targets.iter().any(|id| id == b))
        };
        Ok(RelationshipStatus {
            is_following: follows(from_id, to_id),
            is_followed_by: follows(to_id, from_id),
            is_blocked: state
                .blocked
                .contains(&(from_id.to_string(), to_id.to_string())),
        })
    }
}

#[async_trait]
impl FeedService for InMemoryBackend {
    async fn fetch_feed_page(
        &self,
        feed_type: FeedType,
        user_id: &str,
        page: u32,
    ) -> anyhow::Result<FeedPage> {
        self.enter("fetch_feed_page").await?;
        let state = self.state();

        let authors: HashSet<String> = match feed_type {
            FeedType::Activity => state
                .following
                .get(user_id)
                .map(|ids| ids.iter().cloned().collect())
                .unwrap_or_default(),
            FeedType::Personal => HashSet::from([user_id.to_string()]),
            FeedType::Group | FeedType::Discover => state.profiles.keys().cloned().collect(),
        };

        let matching: Vec<&FeedEntry> = state
            .posts
            .iter()
            .rev()
            .filter(|post| authors.contains(&post.author_id))
            .collect();
        let total = matching.len();
        let start = page as usize * self.page_size;
        let entries: Vec<FeedEntry> = matching
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .cloned()
            .collect();
        let cursor = (start + entries.len() < total).then(|| format!("{}:{}", user_id, page + 1));

        let mut feed_page = FeedPage::new(entries, page, cursor);
        feed_page.page_info.total_count = Some(total as u64);
        Ok(feed_page)
    }
}

#[async_trait]
impl UserSearchService for InMemoryBackend {
    async fn search_users(&self, query: &str) -> anyhow::Result<Vec<Profile>> {
        self.enter("search_users").await?;
        let needle = query.trim().to_lowercase();
        let state = self.state();
        let mut results: Vec<Profile> = state
            .profiles
            .values()
            .filter(|p| {
                p.username.to_lowercase().contains(&needle)
                    || p.display_name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> InMemoryBackend {
        let backend = InMemoryBackend::new(2);
        for id in ["a", "b", "c"] {
            backend.add_profile(Profile::new(id, format!("user_{}", id)));
        }
        backend
    }

    #[tokio::test]
    async fn test_follow_graph_counts() {
        let backend = backend();
        backend.follow("a", "b");
        backend.follow("c", "b");

        assert_eq!(backend.get_follower_count("b").await.unwrap(), 2);
        assert_eq!(backend.get_following_count("a").await.unwrap(), 1);
        assert_eq!(backend.get_followers("b", 0).await.unwrap().len(), 2);

        let status = backend.get_relationship("a", "b").await.unwrap();
        assert!(status.is_following);
        assert!(!status.is_followed_by);
    }

    #[tokio::test]
    async fn test_activity_feed_pagination() {
        let backend = backend();
        backend.follow("a", "b");
        for i in 0..3 {
            backend.add_post("b", &format!("run {}", i));
        }

        let first = backend.fetch_feed_page(FeedType::Activity, "a", 0).await.unwrap();
        assert_eq!(first.entries.len(), 2);
        assert!(first.page_info.has_next_page);
        assert_eq!(first.entries[0].summary, "run 2");

        let second = backend.fetch_feed_page(FeedType::Activity, "a", 1).await.unwrap();
        assert_eq!(second.entries.len(), 1);
        assert!(!second.page_info.has_next_page);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let backend = backend();
        backend.fail_next(2);

        assert!(backend.fetch_profile("a").await.is_err());
        assert!(backend.fetch_profile("a").await.is_err());
        assert!(backend.fetch_profile("a").await.is_ok());
        assert_eq!(backend.calls("fetch_profile"), 3);
    }

    #[tokio::test]
    async fn test_current_user_profile() {
        let backend = backend();
        assert!(backend.fetch_current_user_profile().await.is_err());

        backend.sign_in("c");
        assert_eq!(backend.fetch_current_user_profile().await.unwrap().user_id, "c");
    }

    #[tokio::test]
    async fn test_block_removes_follows() {
        let backend = backend();
        backend.follow("a", "b");
        backend.follow("b", "a");
        backend.block("a", "b");

        let status = backend.get_relationship("a", "b").await.unwrap();
        assert!(status.is_blocked);
        assert!(!status.is_following);
        assert!(!status.is_followed_by);
    }

    #[tokio::test]
    async fn test_search() {
        let backend = backend();
        let results = backend.search_users("USER_B").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].user_id, "b");
    }
}
