//! Pipeline counters, mirrored to the `metrics` facade.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

pub const EVENTS_PROCESSED: &str = "lendwatch_events_processed_total";
pub const DUPLICATE_EVENTS: &str = "lendwatch_duplicate_events_total";
pub const SNAPSHOTS_WRITTEN: &str = "lendwatch_snapshots_written_total";
pub const STALE_SNAPSHOTS_DROPPED: &str = "lendwatch_stale_snapshots_dropped_total";
pub const SNAPSHOT_FAILURES: &str = "lendwatch_snapshot_failures_total";
pub const BACKFILL_COMPLETED: &str = "lendwatch_backfill_completed_total";
pub const BACKFILL_FAILED: &str = "lendwatch_backfill_failed_total";

/// Register descriptions with the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(EVENTS_PROCESSED, "Pool events consumed from the event source");
    metrics::describe_counter!(DUPLICATE_EVENTS, "Redelivered events ignored by the transaction log");
    metrics::describe_counter!(SNAPSHOTS_WRITTEN, "Position snapshots persisted");
    metrics::describe_counter!(
        STALE_SNAPSHOTS_DROPPED,
        "Snapshots discarded because a newer refresh for the user already committed"
    );
    metrics::describe_counter!(SNAPSHOT_FAILURES, "Position refreshes that failed to read or persist");
    metrics::describe_counter!(BACKFILL_COMPLETED, "Backfill addresses refreshed successfully");
    metrics::describe_counter!(BACKFILL_FAILED, "Backfill addresses that failed");
}

/// Running totals since process start.
#[derive(Debug, Default)]
pub struct PipelineStats {
    events_processed: AtomicU64,
    duplicate_events: AtomicU64,
    snapshots_written: AtomicU64,
    stale_dropped: AtomicU64,
    snapshot_failures: AtomicU64,
    backfill_completed: AtomicU64,
    backfill_failed: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub events_processed: u64,
    pub duplicate_events: u64,
    pub snapshots_written: u64,
    pub stale_dropped: u64,
    pub snapshot_failures: u64,
    pub backfill_completed: u64,
    pub backfill_failed: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&self) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
        metrics::increment_counter!(EVENTS_PROCESSED);
    }

    pub fn record_duplicate_event(&self) {
        self.duplicate_events.fetch_add(1, Ordering::Relaxed);
        metrics::increment_counter!(DUPLICATE_EVENTS);
    }

    pub fn record_snapshot_written(&self) {
        self.snapshots_written.fetch_add(1, Ordering::Relaxed);
        metrics::increment_counter!(SNAPSHOTS_WRITTEN);
    }

    pub fn record_stale_dropped(&self) {
        self.stale_dropped.fetch_add(1, Ordering::Relaxed);
        metrics::increment_counter!(STALE_SNAPSHOTS_DROPPED);
    }

    pub fn record_snapshot_failure(&self) {
        self.snapshot_failures.fetch_add(1, Ordering::Relaxed);
        metrics::increment_counter!(SNAPSHOT_FAILURES);
    }

    pub fn record_backfill(&self, succeeded: usize, failed: usize) {
        self.backfill_completed
            .fetch_add(succeeded as u64, Ordering::Relaxed);
        self.backfill_failed.fetch_add(failed as u64, Ordering::Relaxed);
        metrics::counter!(BACKFILL_COMPLETED, succeeded as u64);
        metrics::counter!(BACKFILL_FAILED, failed as u64);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_processed: self.events_processed.load(Ordering::Relaxed),
            duplicate_events: self.duplicate_events.load(Ordering::Relaxed),
            snapshots_written: self.snapshots_written.load(Ordering::Relaxed),
            stale_dropped: self.stale_dropped.load(Ordering::Relaxed),
            snapshot_failures: self.snapshot_failures.load(Ordering::Relaxed),
            backfill_completed: self.backfill_completed.load(Ordering::Relaxed),
            backfill_failed: self.backfill_failed.load(Ordering::Relaxed),
        }
    }
}
