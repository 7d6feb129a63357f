//! Social Cache - client-side cache and refresh coordination for a social
//! fitness app
//!
//! Provides a bounded TTL store with LRU eviction, typed social and feed
//! caches, and a refresh scheduler with debounce, rate limiting and retry.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod models;
pub mod refresh;
pub mod services;
pub mod tasks;

pub use config::CacheConfig;
pub use coordinator::{
    AppEvent, CacheCoordinator, CacheHealthReport, FeedLoad, Services, SocialInteraction,
};
pub use domain::{FeedStatus, RefreshStrategy};
pub use error::{CacheError, Result};
pub use refresh::RefreshPriority;
pub use tasks::spawn_maintenance_task;
