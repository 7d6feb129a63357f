//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the host is alive.
//!
//! # Tasks
//! - Maintenance: expired-entry sweep, scheduler pruning and cost cleanup

mod maintenance;

pub use maintenance::spawn_maintenance_task;
