//! Health reporting and maintenance
//!
//! Point-in-time snapshot of store and scheduler state with tuning
//! recommendations, plus the periodic maintenance pass.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::CacheStats;
use crate::coordinator::{CacheCoordinator, FAR_PAGE_THRESHOLD};
use crate::refresh::RefreshStats;

/// Below this many lookups the hit rate is not meaningful.
const MIN_LOOKUPS_FOR_HIT_RATE: u64 = 20;
const TARGET_HIT_RATE: f64 = 0.7;
const COST_WARNING_RATIO: f64 = 0.8;

/// Serializable snapshot for telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct CacheHealthReport {
    pub generated_at: DateTime<Utc>,
    pub entry_count: usize,
    pub total_cost: usize,
    pub cost_budget: usize,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub eviction_count: u64,
    pub is_refreshing: bool,
    pub pending_refreshes: usize,
    pub last_refresh: Option<DateTime<Utc>>,
    pub refresh: RefreshStats,
    pub recommendations: Vec<String>,
}

/// Summary of one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub expired_removed: usize,
    pub refresh_bookkeeping_pruned: usize,
    pub aggressive_removed: usize,
}

/// Tuning hints derived from cache and scheduler counters.
pub fn recommendations(
    stats: &CacheStats,
    cost_budget: usize,
    refresh: &RefreshStats,
) -> Vec<String> {
    let mut hints = Vec::new();

    let sampled = stats.hits + stats.misses >= MIN_LOOKUPS_FOR_HIT_RATE;
    if sampled && stats.hit_rate() < TARGET_HIT_RATE {
        hints.push(format!(
            "Hit rate {:.0}% is below {:.0}%: consider longer TTLs",
            stats.hit_rate() * 100.0,
            TARGET_HIT_RATE * 100.0
        ));
    }
    if stats.evictions > stats.entry_count as u64 {
        hints.push(format!(
            "{} evictions for {} live entries: consider raising the entry limit",
            stats.evictions, stats.entry_count
        ));
    }
    if cost_budget > 0 && stats.total_cost as f64 > cost_budget as f64 * COST_WARNING_RATIO {
        hints.push("Cache cost is near its budget: expect aggressive cleanup".to_string());
    }
    if refresh.failed > refresh.completed {
        hints.push("Most refreshes are failing: check backend connectivity".to_string());
    }
    if refresh.rate_limited > 0 {
        hints.push(format!(
            "{} refreshes were rate limited: callers may be refreshing too often",
            refresh.rate_limited
        ));
    }
    hints
}

impl CacheCoordinator {
    // == Health ==
    pub fn health_report(&self) -> CacheHealthReport {
        let stats = self.store.statistics();
        let refresh = self.refresh.stats();
        CacheHealthReport {
            generated_at: Utc::now(),
            entry_count: stats.entry_count,
            total_cost: stats.total_cost,
            cost_budget: self.config.cost_budget,
            hit_rate: stats.hit_rate(),
            miss_rate: stats.miss_rate(),
            eviction_count: stats.evictions,
            is_refreshing: self.refresh.is_refreshing(),
            pending_refreshes: self.refresh.pending_count(),
            last_refresh: self.refresh.last_refresh_time(),
            recommendations: recommendations(&stats, self.config.cost_budget, &refresh),
            refresh,
        }
    }

    // == Maintenance ==
    /// Drops expired entries and stale scheduler bookkeeping. When the
    /// store is still over its cost budget, also drops cached searches and
    /// far feed pages, then falls back to the memory-pressure pass.
    pub fn run_maintenance(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport {
            expired_removed: self.store.remove_expired(),
            refresh_bookkeeping_pruned: self.refresh.prune(),
            aggressive_removed: 0,
        };

        if self.store.total_cost() > self.config.cost_budget {
            warn!(
                "Cache cost {} over budget {}, cleaning up aggressively",
                self.store.total_cost(),
                self.config.cost_budget
            );
            report.aggressive_removed += self.social.invalidate_search_results();
            report.aggressive_removed += self.feed.invalidate_pages_from(FAR_PAGE_THRESHOLD);
            if self.store.total_cost() > self.config.cost_budget {
                report.aggressive_removed += self.store.handle_memory_pressure();
            }
        }

        info!(
            "Maintenance: {} expired, {} pruned, {} dropped under cost pressure",
            report.expired_removed, report.refresh_bookkeeping_pruned, report.aggressive_removed
        );
        report
    }
}
