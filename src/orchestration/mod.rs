//! Coordination of position refreshes: backfill, event pipeline, and counters.

pub mod backfill;
pub mod pipeline;
pub mod stats;
pub mod updater;

pub use backfill::{
    load_seed_file, merge_addresses, parse_seed_list, BackfillCoordinator, BackfillError,
    BackfillReport,
};
pub use pipeline::{EventOutcome, Pipeline, PipelineError, PipelineSummary};
pub use stats::{PipelineStats, StatsSnapshot};
pub use updater::{PositionUpdater, RefreshOutcome, UpdateError, UpdateTicket, DEFAULT_CONCURRENCY};
