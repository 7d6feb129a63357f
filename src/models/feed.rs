//! Feed models
//!
//! Activity feed entries and pagination metadata.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of feed a page belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedType {
    /// Workouts from everyone the user follows
    Activity,
    /// The user's own posts
    Personal,
    /// Group workouts the user joined
    Group,
    /// Suggested content
    Discover,
}

impl FeedType {
    pub const ALL: [FeedType; 4] = [
        FeedType::Activity,
        FeedType::Personal,
        FeedType::Group,
        FeedType::Discover,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedType::Activity => "activity",
            FeedType::Personal => "personal",
            FeedType::Group => "group",
            FeedType::Discover => "discover",
        }
    }
}

impl fmt::Display for FeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One post in a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub post_id: String,
    pub author_id: String,
    pub summary: String,
    pub posted_at: DateTime<Utc>,
    pub like_count: u64,
    pub comment_count: u64,
}

/// Pagination metadata attached to a cached feed page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub has_next_page: bool,
    pub cursor: Option<String>,
    pub total_count: Option<u64>,
}

/// A page as returned by the feed service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
    pub entries: Vec<FeedEntry>,
    pub page_info: PageInfo,
}

impl FeedPage {
    /// Builds a page, deriving `has_next_page` from whether a cursor is present.
    pub fn new(entries: Vec<FeedEntry>, page: u32, cursor: Option<String>) -> Self {
        Self {
            entries,
            page_info: PageInfo {
                page,
                has_next_page: cursor.is_some(),
                cursor,
                total_count: None,
            },
        }
    }
}
