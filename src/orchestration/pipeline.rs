//! Consumes an event source: backfill on setup, then log and refresh per event.

use crate::db::Repository;
use crate::domain::{Address, ChainEvent};
use crate::engine::EventNormalizer;
use crate::events::{EventSource, EventSourceError, SourceMessage};
use crate::orchestration::backfill::{BackfillCoordinator, BackfillReport};
use crate::orchestration::stats::PipelineStats;
use crate::orchestration::updater::{PositionUpdater, RefreshOutcome};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Ceiling on refresh tasks held by the pipeline at once. Reaching it makes
/// event handling wait for a refresh to finish.
pub const DEFAULT_MAX_PENDING_REFRESHES: usize = 1024;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] EventSourceError),
}

/// What handling one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOutcome {
    pub event_id: String,
    /// `false` when the event was a redelivery already in the log.
    pub newly_recorded: bool,
    pub refreshes_dispatched: usize,
}

/// Totals for one run over a source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub events: usize,
    pub backfills: Vec<BackfillReport>,
}

pub struct Pipeline {
    normalizer: EventNormalizer,
    repo: Arc<Repository>,
    updater: Arc<PositionUpdater>,
    backfill: BackfillCoordinator,
    seed_addresses: Vec<Address>,
    stats: Arc<PipelineStats>,
    in_flight: JoinSet<()>,
    max_pending: usize,
}

impl Pipeline {
    pub fn new(
        normalizer: EventNormalizer,
        repo: Arc<Repository>,
        updater: Arc<PositionUpdater>,
        backfill: BackfillCoordinator,
        seed_addresses: Vec<Address>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            normalizer,
            repo,
            updater,
            backfill,
            seed_addresses,
            stats,
            in_flight: JoinSet::new(),
            max_pending: DEFAULT_MAX_PENDING_REFRESHES,
        }
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending.max(1);
        self
    }

    /// Refresh tasks spawned and not yet collected.
    pub fn pending_refreshes(&self) -> usize {
        self.in_flight.len()
    }

    /// Drive the source to completion, then wait for in-flight refreshes.
    pub async fn run<S>(&mut self, source: &mut S) -> Result<PipelineSummary, PipelineError>
    where
        S: EventSource + ?Sized,
    {
        let mut summary = PipelineSummary::default();
        while let Some(message) = source.next_message().await? {
            match message {
                SourceMessage::Setup => summary.backfills.push(self.run_backfill().await),
                SourceMessage::Event(event) => {
                    self.handle_event(&event).await;
                    summary.events += 1;
                }
            }
        }
        self.drain().await;

        info!(events = summary.events, "Event source exhausted");
        Ok(summary)
    }

    /// Refresh every seed address; returns once all have resolved.
    pub async fn run_backfill(&self) -> BackfillReport {
        self.backfill.run(&self.seed_addresses).await
    }

    /// Record the event and dispatch refreshes for every touched user.
    ///
    /// Refreshes run in the background; call [`Pipeline::drain`] to await them.
    pub async fn handle_event(&mut self, event: &ChainEvent) -> EventOutcome {
        self.stats.record_event();
        let normalized = self.normalizer.normalize(event);
        let record = &normalized.record;
        debug!(
            id = %record.id,
            kind = event.kind.name(),
            user = %record.user_address,
            "Handling pool event"
        );

        let newly_recorded = match self.repo.append_transaction(record).await {
            Ok(true) => true,
            Ok(false) => {
                debug!(id = %record.id, "Event already recorded");
                self.stats.record_duplicate_event();
                false
            }
            Err(e) => {
                error!(id = %record.id, error = %e, "Failed to append transaction");
                false
            }
        };

        for user in &normalized.touched {
            if let Err(e) = self
                .repo
                .register_address(user, &record.token_symbol, &record.token_address)
                .await
            {
                error!(user = %user, error = %e, "Failed to register address");
            }
        }

        self.reap_finished();

        for user in &normalized.touched {
            while self.in_flight.len() >= self.max_pending {
                match self.in_flight.join_next().await {
                    Some(result) => log_join(result),
                    None => break,
                }
            }

            // Tickets are taken here, in event order, before any read starts.
            let ticket = self.updater.ticket(user);
            let updater = self.updater.clone();
            let repo = self.repo.clone();
            let asset = record.token_address.clone();
            let symbol = record.token_symbol.clone();
            let block_number = record.block_number;

            self.in_flight.spawn(async move {
                let user = ticket.user.clone();
                match updater.refresh(ticket).await {
                    Ok(RefreshOutcome::Written(report)) => {
                        let Some(params) = report.market_parameters(&asset, &symbol, block_number)
                        else {
                            return;
                        };
                        if let Err(e) = repo.record_market_parameters(&params).await {
                            error!(asset = %asset, error = %e, "Failed to record market parameters");
                        }
                    }
                    Ok(RefreshOutcome::Stale { .. }) => {}
                    Err(e) => warn!(user = %user, error = %e, "Position refresh failed"),
                }
            });
        }

        EventOutcome {
            event_id: record.id.clone(),
            newly_recorded,
            refreshes_dispatched: normalized.touched.len(),
        }
    }

    /// Wait for every dispatched refresh to finish.
    pub async fn drain(&mut self) {
        while let Some(result) = self.in_flight.join_next().await {
            log_join(result);
        }
    }

    /// Collect refreshes that already finished, without waiting.
    fn reap_finished(&mut self) {
        while let Some(result) = self.in_flight.try_join_next() {
            log_join(result);
        }
    }
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "Refresh task panicked or was cancelled");
    }
}
