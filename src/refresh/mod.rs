//! Refresh Module
//!
//! Priority-based, debounced, rate-limited execution of refresh operations.

mod coordinator;
mod priority;
mod rate_limit;
mod request;

pub use coordinator::{RefreshConfig, RefreshCoordinator, RefreshStats, RATE_LIMIT_WINDOW};
pub use priority::{backoff_delay, RefreshPriority, BACKOFF_BASE};
pub use rate_limit::RateLimiter;
pub use request::{operation, OperationFuture, RefreshOperation, RefreshRequest, RequestDisposition};
