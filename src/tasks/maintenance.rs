//! Maintenance Task
//!
//! Background task that periodically runs the coordinator's maintenance pass.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::coordinator::CacheCoordinator;

/// Spawns a background task that runs [`CacheCoordinator::run_maintenance`]
/// every `interval`.
///
/// # Arguments
/// * `coordinator` - Shared coordinator handle
/// * `interval` - Time between maintenance passes
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_maintenance_task(coordinator.clone(), Duration::from_secs(300));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_maintenance_task(coordinator: CacheCoordinator, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting maintenance task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let report = coordinator.run_maintenance();
            if report.expired_removed + report.aggressive_removed > 0 {
                info!(
                    "Maintenance removed {} expired and {} over-budget entries",
                    report.expired_removed, report.aggressive_removed
                );
            } else {
                debug!("Maintenance: nothing to remove");
            }
        }
    })
}
