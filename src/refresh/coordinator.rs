//! Refresh Coordinator
//!
//! Deduplicates, debounces and rate-limits refresh requests per logical id,
//! then executes them with bounded concurrency and retry/backoff.
//!
//! Per-id lifecycle:
//!
//! ```text
//! idle -> debouncing -> executing -> idle
//!                           |  ^
//!                           v  |
//!                         retrying
//! ```
//!
//! Every pending debounce timer is a spawned task whose `JoinHandle` lives in
//! the pending map; a newer submission for the same id aborts it and takes
//! its place. A generation number guards the window between a timer waking
//! up and taking the lock.
//!
//! Each in-flight id carries a watch channel that publishes the outcome of
//! its execution, so callers asking for the same id can join it instead of
//! starting a second one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::refresh::priority::backoff_delay;
use crate::refresh::rate_limit::RateLimiter;
use crate::refresh::{RefreshOperation, RefreshPriority, RefreshRequest, RequestDisposition};

/// Length of the per-id rate-limit window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

// == Refresh Config ==
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub max_requests_per_minute: usize,
    pub max_concurrent: usize,
    pub drain_pause: Duration,
}

impl From<&CacheConfig> for RefreshConfig {
    fn from(config: &CacheConfig) -> Self {
        Self {
            max_requests_per_minute: config.max_requests_per_minute,
            max_concurrent: config.max_concurrent_refreshes,
            drain_pause: config.drain_pause,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

/// Counters describing what the coordinator has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStats {
    pub completed: u64,
    pub failed: u64,
    pub rate_limited: u64,
    pub superseded: u64,
    pub dropped_in_flight: u64,
}

#[derive(Debug)]
struct PendingRequest {
    request: RefreshRequest,
    generation: u64,
    timer: JoinHandle<()>,
}

/// Outcome of an execution: `None` while running, then whether it succeeded.
type Completion = watch::Sender<Option<bool>>;

#[derive(Debug)]
struct SchedulerState {
    pending: HashMap<String, PendingRequest>,
    in_flight: HashMap<String, Completion>,
    rate_limiter: RateLimiter,
    last_refresh: Option<DateTime<Utc>>,
    stats: RefreshStats,
}

#[derive(Debug)]
struct Inner {
    config: RefreshConfig,
    state: Mutex<SchedulerState>,
    permits: Semaphore,
    generation: AtomicU64,
    progress: watch::Sender<f64>,
}

/// Clears the in-flight mark for an id when execution ends, however it ends.
struct InFlightGuard<'a> {
    inner: &'a Inner,
    id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(done) = self.inner.state().in_flight.remove(&self.id) {
            // Cancelled or panicked executions count as failed
            done.send_if_modified(|outcome| {
                if outcome.is_none() {
                    *outcome = Some(false);
                    true
                } else {
                    false
                }
            });
        }
    }
}

impl SchedulerState {
    /// Marks `id` as executing. Returns false if it already is.
    fn claim(&mut self, id: &str) -> bool {
        if self.in_flight.contains_key(id) {
            return false;
        }
        let (done, _) = watch::channel(None);
        self.in_flight.insert(id.to_string(), done);
        true
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn claim(&self, id: &str) -> bool {
        self.state().claim(id)
    }

    // == Fire ==
    /// Debounce timer expiry for `id`.
    async fn fire(self: Arc<Self>, id: String, generation: u64) {
        let request = {
            let mut state = self.state();
            let pending = match state.pending.remove(&id) {
                Some(pending) if pending.generation == generation => pending,
                Some(newer) => {
                    state.pending.insert(id, newer);
                    return;
                }
                None => return,
            };

            if !state.claim(&id) {
                state.stats.dropped_in_flight += 1;
                warn!("Refresh {} dropped: an execution is already in flight", id);
                return;
            }
            pending.request
        };

        // Background failures are logged inside execute and go no further.
        let _ = self.execute(request).await;
    }

    // == Execute ==
    /// Runs a claimed request with retries. The caller must have claimed the id.
    async fn execute(&self, request: RefreshRequest) -> Result<()> {
        let _guard = InFlightGuard {
            inner: self,
            id: request.id.clone(),
        };
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| CacheError::Internal(format!("refresh permits closed: {}", e)))?;

        let max_retries = request.priority.max_retries();
        let mut attempt = 0;
        let result = loop {
            match (request.operation)().await {
                Ok(()) => break Ok(()),
                Err(e) if attempt < max_retries => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        "Refresh {} failed (attempt {}/{}): {}; retrying in {:?}",
                        request.id,
                        attempt + 1,
                        max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => break Err(e),
            }
        };

        let mut state = self.state();
        if let Some(done) = state.in_flight.get(&request.id) {
            done.send_replace(Some(result.is_ok()));
        }
        match &result {
            Ok(()) => {
                state.last_refresh = Some(Utc::now());
                state.stats.completed += 1;
                debug!("Refresh {} completed after {} attempt(s)", request.id, attempt + 1);
            }
            Err(e) => {
                state.stats.failed += 1;
                warn!(
                    "Refresh {} abandoned after {} attempt(s): {}",
                    request.id,
                    attempt + 1,
                    e
                );
            }
        }
        result
    }

    /// Claims and executes a request taken from the pending map. Returns
    /// false when the id was already executing and the request was dropped.
    async fn execute_pending(&self, request: RefreshRequest) -> bool {
        if !self.claim(&request.id) {
            self.state().stats.dropped_in_flight += 1;
            warn!("Refresh {} dropped: an execution is already in flight", request.id);
            return false;
        }
        let _ = self.execute(request).await;
        true
    }

    /// Removes matching pending requests, cancelling their timers, ordered
    /// by priority then submission time.
    fn take_pending<F>(&self, filter: F) -> Vec<RefreshRequest>
    where
        F: Fn(RefreshPriority) -> bool,
    {
        let mut state = self.state();
        let ids: Vec<String> = state
            .pending
            .iter()
            .filter(|(_, pending)| filter(pending.request.priority))
            .map(|(id, _)| id.clone())
            .collect();

        let mut requests: Vec<RefreshRequest> = ids
            .iter()
            .filter_map(|id| state.pending.remove(id))
            .map(|pending| {
                pending.timer.abort();
                pending.request
            })
            .collect();
        requests.sort_by_key(|r| (r.priority, r.timestamp));
        requests
    }

    /// Removes the single most urgent matching pending request.
    fn take_next_pending<F>(&self, filter: F) -> Option<RefreshRequest>
    where
        F: Fn(RefreshPriority) -> bool,
    {
        let mut state = self.state();
        let id = state
            .pending
            .iter()
            .filter(|(_, pending)| filter(pending.request.priority))
            .min_by_key(|(_, pending)| (pending.request.priority, pending.request.timestamp))
            .map(|(id, _)| id.clone())?;

        let pending = state.pending.remove(&id)?;
        pending.timer.abort();
        Some(pending.request)
    }
}

// == Refresh Coordinator ==
/// Cheap to clone; clones share the same scheduler.
#[derive(Debug, Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    // == Constructor ==
    pub fn new(config: RefreshConfig) -> Self {
        let (progress, _) = watch::channel(1.0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SchedulerState {
                    pending: HashMap::new(),
                    in_flight: HashMap::new(),
                    rate_limiter: RateLimiter::new(
                        config.max_requests_per_minute,
                        RATE_LIMIT_WINDOW,
                    ),
                    last_refresh: None,
                    stats: RefreshStats::default(),
                }),
                permits: Semaphore::new(config.max_concurrent.max(1)),
                generation: AtomicU64::new(0),
                progress,
                config,
            }),
        }
    }

    // == Request ==
    /// Submits a refresh.
    ///
    /// User-initiated requests bypass debounce and rate limiting, run now
    /// and propagate failure. Everything else is scheduled fire-and-forget.
    pub async fn request(
        &self,
        id: impl Into<String>,
        priority: RefreshPriority,
        user_initiated: bool,
        operation: RefreshOperation,
    ) -> Result<RequestDisposition> {
        let id = id.into();
        if user_initiated {
            self.run_now(id, priority, operation).await?;
            return Ok(RequestDisposition::Executed);
        }
        Ok(self.schedule(RefreshRequest::new(id, priority, false, operation)))
    }

    // == Schedule ==
    /// Rate-limits and debounces a background request.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, request: RefreshRequest) -> RequestDisposition {
        let mut state = self.inner.state();

        if !state.rate_limiter.try_acquire(&request.id, Instant::now()) {
            state.stats.rate_limited += 1;
            debug!("Refresh {} dropped: rate limit reached", request.id);
            return RequestDisposition::RateLimited;
        }

        let replaced = match state.pending.remove(&request.id) {
            Some(previous) => {
                previous.timer.abort();
                state.stats.superseded += 1;
                debug!("Refresh {} superseded a pending request", request.id);
                true
            }
            None => false,
        };

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let delay = request.priority.debounce_interval();
        let inner = Arc::clone(&self.inner);
        let id = request.id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire(id, generation).await;
        });

        state.pending.insert(
            request.id.clone(),
            PendingRequest {
                request,
                generation,
                timer,
            },
        );
        RequestDisposition::Scheduled { replaced }
    }

    // == Run Now ==
    /// Executes immediately with retries and returns the outcome.
    ///
    /// Cancels any debounced request for the same id. Fails with
    /// [`CacheError::RefreshInFlight`] if the id is already executing.
    pub async fn run_now(
        &self,
        id: impl Into<String>,
        priority: RefreshPriority,
        operation: RefreshOperation,
    ) -> Result<()> {
        let id = id.into();
        {
            let mut state = self.inner.state();
            if let Some(previous) = state.pending.remove(&id) {
                previous.timer.abort();
                state.stats.superseded += 1;
            }
            if !state.claim(&id) {
                return Err(CacheError::RefreshInFlight(id));
            }
        }
        self.inner
            .execute(RefreshRequest::new(id, priority, true, operation))
            .await
    }

    // == Run Shared ==
    /// Like [`run_now`](Self::run_now), but when the id is already
    /// executing waits for that execution and reports its outcome instead
    /// of failing with `RefreshInFlight`.
    pub async fn run_shared(
        &self,
        id: impl Into<String>,
        priority: RefreshPriority,
        operation: RefreshOperation,
    ) -> Result<()> {
        let id = id.into();
        loop {
            match self.run_now(id.clone(), priority, Arc::clone(&operation)).await {
                Err(CacheError::RefreshInFlight(_)) => match self.join(&id).await {
                    Some(succeeded) => return joined_outcome(&id, succeeded),
                    // Finished between the claim attempt and the join
                    None => continue,
                },
                other => return other,
            }
        }
    }

    // == Run Limited ==
    /// Immediate execution for passive reads: joins a running execution of
    /// the same id, otherwise spends a rate-limit token and runs without
    /// debounce. Fails with [`CacheError::RateLimited`] without running when
    /// the id has used its budget for the current window.
    pub async fn run_limited(
        &self,
        id: impl Into<String>,
        priority: RefreshPriority,
        operation: RefreshOperation,
    ) -> Result<()> {
        let id = id.into();
        if let Some(succeeded) = self.join(&id).await {
            return joined_outcome(&id, succeeded);
        }
        {
            let mut state = self.inner.state();
            if !state.rate_limiter.try_acquire(&id, Instant::now()) {
                state.stats.rate_limited += 1;
                debug!("Immediate refresh {} dropped: rate limit reached", id);
                return Err(CacheError::RateLimited(id));
            }
        }
        self.run_shared(id, priority, operation).await
    }

    // == Join ==
    /// Waits for the running execution of `id`, if any, and returns whether
    /// it succeeded. Returns `None` when nothing is executing for `id`.
    pub async fn join(&self, id: &str) -> Option<bool> {
        let mut done = self.inner.state().in_flight.get(id)?.subscribe();
        let finished = done.wait_for(Option::is_some).await.map(|o| *o).ok().flatten();
        let outcome = finished.or(*done.borrow());
        Some(outcome.unwrap_or(false))
    }

    // == Cancel ==
    /// Cancels a pending debounced request. Returns true if one existed.
    pub fn cancel(&self, id: &str) -> bool {
        match self.inner.state().pending.remove(id) {
            Some(pending) => {
                pending.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Cancels every pending request whose id matches `predicate`.
    /// Returns the number cancelled.
    pub fn cancel_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let mut state = self.inner.state();
        let before = state.pending.len();
        state.pending.retain(|id, pending| {
            if predicate(id) {
                pending.timer.abort();
                false
            } else {
                true
            }
        });
        let cancelled = before - state.pending.len();
        if cancelled > 0 {
            debug!("Cancelled {} pending refreshes", cancelled);
        }
        cancelled
    }

    // == Refresh Critical Data ==
    /// Drains pending `critical` and `high` requests one after another,
    /// pausing between them and publishing fractional progress.
    ///
    /// Returns the number of requests executed.
    pub async fn refresh_critical_data(&self) -> usize {
        let requests = self.inner.take_pending(|p| p <= RefreshPriority::High);
        let total = requests.len();
        self.inner.progress.send_replace(if total == 0 { 1.0 } else { 0.0 });
        info!("Refreshing {} critical requests", total);

        let mut executed = 0;
        for (index, request) in requests.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.inner.config.drain_pause).await;
            }
            if self.inner.execute_pending(request).await {
                executed += 1;
            }
            self.inner
                .progress
                .send_replace((index + 1) as f64 / total as f64);
        }
        executed
    }

    /// Receives `refresh_critical_data` progress in `[0.0, 1.0]`.
    pub fn subscribe_progress(&self) -> watch::Receiver<f64> {
        self.inner.progress.subscribe()
    }

    // == Lifecycle Hooks ==
    /// Foreground transition: runs every pending `critical`/`high` request now.
    pub async fn on_foreground(&self) -> usize {
        let requests = self.inner.take_pending(|p| p <= RefreshPriority::High);
        let mut tasks = JoinSet::new();
        for request in requests {
            let inner = Arc::clone(&self.inner);
            tasks.spawn(async move { inner.execute_pending(request).await });
        }

        let mut executed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => executed += 1,
                Ok(false) => {}
                Err(e) => warn!("Foreground refresh task failed: {}", e),
            }
        }
        info!("Foreground transition executed {} pending refreshes", executed);
        executed
    }

    /// Background transition: runs pending requests up to `medium` priority,
    /// most urgent first, starting new ones only until `window` elapses.
    /// Requests already started run to completion.
    pub async fn on_background(&self, window: Duration) -> usize {
        let deadline = Instant::now() + window;
        let mut executed = 0;
        while Instant::now() < deadline {
            let next = self.inner.take_next_pending(|p| p <= RefreshPriority::Medium);
            let Some(request) = next else {
                break;
            };
            if self.inner.execute_pending(request).await {
                executed += 1;
            }
        }
        info!("Background window executed {} pending refreshes", executed);
        executed
    }

    // == Prune ==
    /// Drops finished timer bookkeeping and idle rate-limit windows.
    pub fn prune(&self) -> usize {
        let mut state = self.inner.state();
        let before = state.pending.len();
        state.pending.retain(|_, pending| !pending.timer.is_finished());
        let timers = before - state.pending.len();
        let windows = state.rate_limiter.prune(Instant::now());
        debug!("Pruned {} timers and {} rate-limit windows", timers, windows);
        timers + windows
    }

    // == State ==
    pub fn is_refreshing(&self) -> bool {
        !self.inner.state().in_flight.is_empty()
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.inner.state().in_flight.contains_key(id)
    }

    pub fn last_refresh_time(&self) -> Option<DateTime<Utc>> {
        self.inner.state().last_refresh
    }

    pub fn pending_count(&self) -> usize {
        self.inner.state().pending.len()
    }

    pub fn stats(&self) -> RefreshStats {
        self.inner.state().stats
    }
}

fn joined_outcome(id: &str, succeeded: bool) -> Result<()> {
    if succeeded {
        Ok(())
    } else {
        Err(anyhow!("joined refresh of {} failed", id).into())
    }
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new(RefreshConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh::operation;
    use std::sync::atomic::AtomicUsize;

    fn counting_op(counter: Arc<AtomicUsize>) -> RefreshOperation {
        operation(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn failing_op(counter: Arc<AtomicUsize>) -> RefreshOperation {
        operation(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("backend down").into())
            }
        })
    }

    fn slow_op(counter: Arc<AtomicUsize>, duration: Duration) -> RefreshOperation {
        operation(move || {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(duration).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_collapses_to_last_submission() {
        let coordinator = RefreshCoordinator::default();
        let first = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            coordinator
                .request("feed", RefreshPriority::High, false, counting_op(Arc::clone(&first)))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let disposition = coordinator
            .request("feed", RefreshPriority::High, false, counting_op(Arc::clone(&last)))
            .await
            .unwrap();
        assert_eq!(disposition, RequestDisposition::Scheduled { replaced: true });

        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(last.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.pending_count(), 0);
        assert_eq!(coordinator.stats().superseded, 4);
        assert!(coordinator.last_refresh_time().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_waits_for_interval() {
        let coordinator = RefreshCoordinator::default();
        let counter = Arc::new(AtomicUsize::new(0));

        coordinator.schedule(RefreshRequest::new(
            "profile",
            RefreshPriority::Medium,
            false,
            counting_op(Arc::clone(&counter)),
        ));

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_drops_excess() {
        let coordinator = RefreshCoordinator::new(RefreshConfig {
            max_requests_per_minute: 3,
            ..RefreshConfig::default()
        });
        let counter = Arc::new(AtomicUsize::new(0));

        let mut dispositions = Vec::new();
        for _ in 0..5 {
            let d = coordinator
                .request(
                    "counts",
                    RefreshPriority::Critical,
                    false,
                    counting_op(Arc::clone(&counter)),
                )
                .await
                .unwrap();
            dispositions.push(d);
            // Let each one fire before the next
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(dispositions[3], RequestDisposition::RateLimited);
        assert_eq!(dispositions[4], RequestDisposition::RateLimited);
        assert_eq!(coordinator.stats().rate_limited, 2);

        // Window slides
        tokio::time::sleep(RATE_LIMIT_WINDOW).await;
        let d = coordinator
            .request("counts", RefreshPriority::Critical, false, counting_op(Arc::clone(&counter)))
            .await
            .unwrap();
        assert_eq!(d, RequestDisposition::Scheduled { replaced: false });
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_initiated_bypasses_rate_limit() {
        let coordinator = RefreshCoordinator::new(RefreshConfig {
            max_requests_per_minute: 1,
            ..RefreshConfig::default()
        });
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let d = coordinator
                .request("feed", RefreshPriority::Critical, true, counting_op(Arc::clone(&counter)))
                .await
                .unwrap();
            assert_eq!(d, RequestDisposition::Executed);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_attempts_and_backoff() {
        let coordinator = RefreshCoordinator::default();
        let counter = Arc::new(AtomicUsize::new(0));

        let start = Instant::now();
        let result = coordinator
            .run_now("feed", RefreshPriority::Critical, failing_op(Arc::clone(&counter)))
            .await;

        assert!(matches!(result, Err(CacheError::Fetch(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        // 0.5 + 1 + 2 seconds of backoff
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3500), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(3600), "elapsed {:?}", elapsed);
        assert_eq!(coordinator.stats().failed, 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_priority_never_retries() {
        let coordinator = RefreshCoordinator::default();
        let counter = Arc::new(AtomicUsize::new(0));

        coordinator.schedule(RefreshRequest::new(
            "search",
            RefreshPriority::Low,
            false,
            failing_op(Arc::clone(&counter)),
        ));
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.stats().failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fire_while_in_flight_is_dropped() {
        let coordinator = RefreshCoordinator::default();
        let slow = Arc::new(AtomicUsize::new(0));
        let queued = Arc::new(AtomicUsize::new(0));

        let runner = coordinator.clone();
        let slow_clone = Arc::clone(&slow);
        let handle = tokio::spawn(async move {
            runner
                .run_now("feed", RefreshPriority::High, slow_op(slow_clone, Duration::from_secs(5)))
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(coordinator.is_in_flight("feed"));

        coordinator.schedule(RefreshRequest::new(
            "feed",
            RefreshPriority::Critical,
            false,
            counting_op(Arc::clone(&queued)),
        ));
        tokio::time::sleep(Duration::from_secs(1)).await;

        handle.await.unwrap().unwrap();
        assert_eq!(slow.load(Ordering::SeqCst), 1);
        assert_eq!(queued.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.stats().dropped_in_flight, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_now_rejects_concurrent_same_id() {
        let coordinator = RefreshCoordinator::default();
        let counter = Arc::new(AtomicUsize::new(0));

        let runner = coordinator.clone();
        let op = slow_op(Arc::clone(&counter), Duration::from_secs(1));
        let handle =
            tokio::spawn(async move { runner.run_now("p", RefreshPriority::High, op).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = coordinator
            .run_now("p", RefreshPriority::High, counting_op(Arc::clone(&counter)))
            .await;
        assert!(matches!(second, Err(CacheError::RefreshInFlight(_))));

        handle.await.unwrap().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_critical_data_drains_sequentially() {
        let coordinator = RefreshCoordinator::default();
        let counter = Arc::new(AtomicUsize::new(0));
        let low = Arc::new(AtomicUsize::new(0));

        let requests = [
            ("a", RefreshPriority::High),
            ("b", RefreshPriority::Critical),
            ("c", RefreshPriority::High),
        ];
        for (id, priority) in requests {
            coordinator.schedule(RefreshRequest::new(
                id,
                priority,
                false,
                counting_op(Arc::clone(&counter)),
            ));
        }
        coordinator.schedule(RefreshRequest::new(
            "d",
            RefreshPriority::Low,
            false,
            counting_op(Arc::clone(&low)),
        ));
        let progress = coordinator.subscribe_progress();

        let executed = coordinator.refresh_critical_data().await;

        assert_eq!(executed, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(*progress.borrow(), 1.0);
        assert_eq!(low.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_foreground_runs_urgent_pending() {
        let coordinator = RefreshCoordinator::default();
        let counter = Arc::new(AtomicUsize::new(0));

        coordinator.schedule(RefreshRequest::new(
            "a",
            RefreshPriority::High,
            false,
            counting_op(Arc::clone(&counter)),
        ));
        coordinator.schedule(RefreshRequest::new(
            "b",
            RefreshPriority::Medium,
            false,
            counting_op(Arc::clone(&counter)),
        ));

        assert_eq!(coordinator.on_foreground().await, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_background_runs_up_to_medium() {
        let coordinator = RefreshCoordinator::default();
        let counter = Arc::new(AtomicUsize::new(0));
        let low = Arc::new(AtomicUsize::new(0));

        coordinator.schedule(RefreshRequest::new(
            "a",
            RefreshPriority::Medium,
            false,
            counting_op(Arc::clone(&counter)),
        ));
        coordinator.schedule(RefreshRequest::new(
            "b",
            RefreshPriority::High,
            false,
            counting_op(Arc::clone(&counter)),
        ));
        coordinator.schedule(RefreshRequest::new(
            "c",
            RefreshPriority::Low,
            false,
            counting_op(Arc::clone(&low)),
        ));

        let executed = coordinator.on_background(Duration::from_secs(25)).await;

        assert_eq!(executed, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(low.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_background_with_no_window_starts_nothing() {
        let coordinator = RefreshCoordinator::default();
        let counter = Arc::new(AtomicUsize::new(0));

        coordinator.schedule(RefreshRequest::new(
            "a",
            RefreshPriority::Critical,
            false,
            counting_op(Arc::clone(&counter)),
        ));

        assert_eq!(coordinator.on_background(Duration::ZERO).await, 0);
        assert_eq!(coordinator.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_prune() {
        let coordinator = RefreshCoordinator::default();
        let counter = Arc::new(AtomicUsize::new(0));

        coordinator.schedule(RefreshRequest::new(
            "a",
            RefreshPriority::Low,
            false,
            counting_op(Arc::clone(&counter)),
        ));
        assert!(coordinator.cancel("a"));
        assert!(!coordinator.cancel("a"));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(RATE_LIMIT_WINDOW).await;
        assert_eq!(coordinator.prune(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_shared_joins_running_execution() {
        let coordinator = RefreshCoordinator::default();
        let counter = Arc::new(AtomicUsize::new(0));

        let runner = coordinator.clone();
        let op = slow_op(Arc::clone(&counter), Duration::from_secs(1));
        let handle = tokio::spawn(async move {
            runner.run_now("p", RefreshPriority::High, op).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let joined = coordinator
            .run_shared("p", RefreshPriority::Critical, counting_op(Arc::clone(&counter)))
            .await;

        assert!(joined.is_ok());
        handle.await.unwrap().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_reports_failure() {
        let coordinator = RefreshCoordinator::default();
        let counter = Arc::new(AtomicUsize::new(0));
        assert_eq!(coordinator.join("p").await, None);

        let runner = coordinator.clone();
        let op = operation(|| async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Err(anyhow::anyhow!("backend down").into())
        });
        let handle = tokio::spawn(async move {
            runner.run_now("p", RefreshPriority::Low, op).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let joined = coordinator
            .run_shared("p", RefreshPriority::Low, counting_op(Arc::clone(&counter)))
            .await;

        assert!(handle.await.unwrap().is_err());
        assert!(matches!(joined, Err(CacheError::Fetch(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_limited_respects_rate_limit() {
        let coordinator = RefreshCoordinator::new(RefreshConfig {
            max_requests_per_minute: 2,
            ..RefreshConfig::default()
        });
        let counter = Arc::new(AtomicUsize::new(0));

        let mut outcomes = Vec::new();
        for _ in 0..4 {
            let op = counting_op(Arc::clone(&counter));
            outcomes.push(coordinator.run_limited("p", RefreshPriority::High, op).await);
        }

        assert!(outcomes[0].is_ok());
        assert!(outcomes[1].is_ok());
        assert!(matches!(outcomes[2], Err(CacheError::RateLimited(_))));
        assert!(matches!(outcomes[3], Err(CacheError::RateLimited(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(coordinator.stats().rate_limited, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_where() {
        let coordinator = RefreshCoordinator::default();
        let counter = Arc::new(AtomicUsize::new(0));
        for id in ["profile:a", "feed:activity:a:0", "profile:b"] {
            let op = counting_op(Arc::clone(&counter));
            coordinator.schedule(RefreshRequest::new(id, RefreshPriority::Medium, false, op));
        }

        let cancelled = coordinator.cancel_where(|id| id.split(':').any(|part| part == "a"));

        assert_eq!(cancelled, 2);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
