//! App lifecycle events and social interactions
//!
//! Interactions invalidate synchronously, so a read issued right after
//! returns a miss, then schedule medium-priority refetches of whatever
//! was dropped.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::coordinator::{operations, CacheCoordinator};
use crate::domain::keys;
use crate::models::FeedType;
use crate::refresh::RefreshPriority;

/// Host lifecycle signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppEvent {
    DidLaunch,
    DidBecomeActive,
    DidEnterBackground,
    DidLogin(String),
    DidLogout,
    MemoryWarning,
}

/// A social action taken by `actor_id` on a user or post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SocialInteraction {
    Follow { actor_id: String, target_id: String },
    Unfollow { actor_id: String, target_id: String },
    Block { actor_id: String, target_id: String },
    Like { actor_id: String, post_id: String },
    Comment { actor_id: String, post_id: String },
    Share { actor_id: String, post_id: String },
}

impl CacheCoordinator {
    // == App Events ==
    pub async fn handle_app_event(&self, event: AppEvent) {
        info!("App event: {:?}", event);
        match event {
            AppEvent::DidLaunch => {
                if let Some(user_id) = self.current_user() {
                    self.prewarm(&user_id);
                }
            }
            AppEvent::DidLogin(user_id) => {
                if let Some(previous) = self.set_current_user(Some(user_id.clone())) {
                    if previous != user_id {
                        self.purge_user(&previous);
                    }
                }
                self.prewarm(&user_id);
            }
            AppEvent::DidBecomeActive => {
                if let Some(user_id) = self.current_user() {
                    self.request_background(
                        operations::feed_page(self, FeedType::Activity, &user_id, 0),
                        RefreshPriority::High,
                    );
                    self.request_background(
                        operations::profile(self, &user_id),
                        RefreshPriority::High,
                    );
                }
                self.refresh.on_foreground().await;
            }
            AppEvent::DidEnterBackground => {
                self.refresh.on_background(self.config.background_window).await;
            }
            AppEvent::DidLogout => {
                self.logout();
            }
            AppEvent::MemoryWarning => {
                self.on_memory_warning();
            }
        }
    }

    /// Warms the caches the home screen needs at medium priority.
    fn prewarm(&self, user_id: &str) {
        let priority = RefreshPriority::Medium;
        self.request_background(operations::profile(self, user_id), priority);
        self.request_background(
            operations::feed_page(self, FeedType::Activity, user_id, 0),
            priority,
        );
        self.request_background(operations::follower_count(self, user_id), priority);
        self.request_background(operations::following_count(self, user_id), priority);
    }

    /// Clears the current user, every cached entry tied to them, and their
    /// pending refreshes. Returns the number of entries removed.
    pub fn logout(&self) -> usize {
        match self.set_current_user(None) {
            Some(user_id) => self.purge_user(&user_id),
            None => 0,
        }
    }

    /// A refresh already executing is left to finish.
    fn purge_user(&self, user_id: &str) -> usize {
        let cancelled = self
            .refresh
            .cancel_where(|id| keys::mentions_user(id, user_id));
        let removed =
            self.social.invalidate_user(user_id) + self.feed.invalidate_user_feeds(user_id);
        info!(
            "Purged {} cached entries and {} pending refreshes for {}",
            removed, cancelled, user_id
        );
        removed
    }

    // == Interactions ==
    /// Applies the invalidation cascade for `interaction`, then schedules
    /// refetches of the affected data.
    pub fn handle_interaction(&self, interaction: SocialInteraction) {
        match interaction {
            SocialInteraction::Follow { actor_id, target_id }
            | SocialInteraction::Unfollow { actor_id, target_id } => {
                self.social.invalidate_relationship_change(&actor_id, &target_id);
                self.feed.invalidate_user_feeds(&actor_id);
                self.refetch_graph(&actor_id, &target_id);
            }
            SocialInteraction::Block { actor_id, target_id } => {
                self.social.invalidate_relationship_change(&actor_id, &target_id);
                self.social.invalidate_profile(&target_id);
                self.feed.invalidate_user_feeds(&actor_id);
                self.feed.invalidate_user_feeds(&target_id);
                self.refetch_graph(&actor_id, &target_id);
            }
            SocialInteraction::Like { actor_id, post_id }
            | SocialInteraction::Comment { actor_id, post_id } => {
                self.social.invalidate_post(&post_id);
                self.feed.invalidate_feed_type(FeedType::Activity);
                self.refetch_feed(&actor_id, FeedType::Activity);
            }
            SocialInteraction::Share { actor_id, post_id } => {
                self.social.invalidate_post(&post_id);
                self.feed.invalidate_feed_type(FeedType::Activity);
                self.feed.invalidate_user_feeds(&actor_id);
                self.refetch_feed(&actor_id, FeedType::Activity);
            }
        }
    }

    fn refetch_graph(&self, actor_id: &str, target_id: &str) {
        let priority = RefreshPriority::Medium;
        for user_id in [actor_id, target_id] {
            self.request_background(operations::follower_count(self, user_id), priority);
            self.request_background(operations::following_count(self, user_id), priority);
        }
        self.request_background(operations::following(self, actor_id, 0), priority);
        self.request_background(operations::followers(self, target_id, 0), priority);
        self.request_background(operations::relationship(self, actor_id, target_id), priority);
        self.refetch_feed(actor_id, FeedType::Activity);
    }

    fn refetch_feed(&self, user_id: &str, feed_type: FeedType) {
        self.request_background(
            operations::feed_page(self, feed_type, user_id, 0),
            RefreshPriority::Medium,
        );
    }

    /// The user published a post: their own feeds are out of date.
    pub fn did_create_post(&self, user_id: &str) {
        self.feed.invalidate_user_feeds(user_id);
        self.refetch_feed(user_id, FeedType::Personal);
    }
}
