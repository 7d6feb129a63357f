//! Domain Caches
//!
//! Typed façades over the shared TTL store. They own no state beyond a
//! store handle and their key-naming policy.

pub mod feed;
pub mod keys;
pub mod notify;
pub mod social;
pub mod value;

pub use feed::{
    serving_decision, FeedCache, FeedCacheEntry, FeedLookup, FeedStatus, RefreshStrategy, Staleness,
};
pub use notify::{CacheDomain, ChangeKind, ChangeNotifier, DataChange};
pub use social::SocialDataCache;
pub use value::CachedValue;
