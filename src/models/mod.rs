//! Domain models shared by the caches, the coordinator and the services
//!
//! Plain data carried between the external services and the cache layers.

pub mod feed;
pub mod profile;

// Re-export commonly used types
pub use feed::{FeedEntry, FeedPage, FeedType, PageInfo};
pub use profile::{Profile, RelationshipStatus};
