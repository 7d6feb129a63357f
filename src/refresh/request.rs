//! Refresh requests
//!
//! A request pairs a logical id with a re-invocable async operation so the
//! coordinator can retry it.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::time::Instant;

use crate::error::Result;
use crate::refresh::RefreshPriority;

pub type OperationFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// Re-invocable refresh operation. Each call starts a new attempt.
pub type RefreshOperation = Arc<dyn Fn() -> OperationFuture + Send + Sync>;

/// Wraps an async closure as a [`RefreshOperation`].
pub fn operation<F, Fut>(f: F) -> RefreshOperation
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

#[derive(Clone)]
pub struct RefreshRequest {
    /// Logical key; at most one execution per id at a time
    pub id: String,
    pub priority: RefreshPriority,
    pub operation: RefreshOperation,
    pub timestamp: Instant,
    pub user_initiated: bool,
}

impl RefreshRequest {
    pub fn new(
        id: impl Into<String>,
        priority: RefreshPriority,
        user_initiated: bool,
        operation: RefreshOperation,
    ) -> Self {
        Self {
            id: id.into(),
            priority,
            operation,
            timestamp: Instant::now(),
            user_initiated,
        }
    }
}

impl fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRequest")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("timestamp", &self.timestamp)
            .field("user_initiated", &self.user_initiated)
            .finish_non_exhaustive()
    }
}

/// What happened to a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDisposition {
    /// Debounce timer armed; `replaced` if it superseded a pending request
    Scheduled { replaced: bool },
    /// Over the per-id budget; dropped without error
    RateLimited,
    /// Ran immediately and succeeded
    Executed,
}
