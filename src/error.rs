//! Error types for the social cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the social cache.
///
/// Only user-initiated paths surface these to callers. Background refreshes
/// log them and keep serving whatever is cached.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is empty or longer than the store allows
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Entry alone exceeds the store's cost limit
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Request exceeded its per-id budget for the current window
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// An execution for the same request id is already running
    #[error("Refresh already in flight: {0}")]
    RefreshInFlight(String),

    /// Connectivity signal reports no network
    #[error("Offline: {0}")]
    Offline(String),

    /// Operation needs a logged-in user
    #[error("No active user")]
    NoActiveUser,

    /// External collaborator failed
    #[error(transparent)]
    Fetch(#[from] anyhow::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Returns true when retrying the same operation could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CacheError::Fetch(_) | CacheError::Internal(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the social cache.
pub type Result<T> = std::result::Result<T, CacheError>;
