//! Bounded, per-user ordered position refreshes.
//!
//! Every refresh takes a ticket when it is dispatched. Reads run concurrently
//! under a shared permit pool, but a snapshot only commits if no refresh for
//! the same user with a later ticket has committed first. A slow read for an
//! older event can therefore never overwrite a newer snapshot.

use crate::db::Repository;
use crate::domain::Address;
use crate::engine::{CalculationError, MetricsCalculator, PositionReport};
use crate::orchestration::stats::PipelineStats;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Concurrency ceiling for position refreshes.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// A dispatched refresh for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTicket {
    pub user: Address,
    pub seq: u64,
}

#[derive(Debug)]
pub enum RefreshOutcome {
    /// Snapshot persisted.
    Written(Box<PositionReport>),
    /// A later ticket for the same user committed first; nothing written.
    Stale { seq: u64, committed: u64 },
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Calculation(#[from] CalculationError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("refresh pool closed")]
    PoolClosed,
}

#[derive(Debug)]
pub struct PositionUpdater {
    calculator: Arc<MetricsCalculator>,
    repo: Arc<Repository>,
    permits: Semaphore,
    next_seq: AtomicU64,
    committed: Mutex<HashMap<Address, Arc<tokio::sync::Mutex<u64>>>>,
    stats: Arc<PipelineStats>,
}

impl PositionUpdater {
    pub fn new(
        calculator: Arc<MetricsCalculator>,
        repo: Arc<Repository>,
        concurrency: usize,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            calculator,
            repo,
            permits: Semaphore::new(concurrency.max(1)),
            next_seq: AtomicU64::new(1),
            committed: Mutex::new(HashMap::new()),
            stats,
        }
    }

    /// Take the next ticket for `user`. Call this in dispatch order.
    pub fn ticket(&self, user: &Address) -> UpdateTicket {
        UpdateTicket {
            user: user.clone(),
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
        }
    }

    /// Ticket and refresh in one step.
    pub async fn refresh_user(&self, user: &Address) -> Result<RefreshOutcome, UpdateError> {
        let ticket = self.ticket(user);
        self.refresh(ticket).await
    }

    /// Read the user's position and commit it unless a newer ticket already has.
    pub async fn refresh(&self, ticket: UpdateTicket) -> Result<RefreshOutcome, UpdateError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| UpdateError::PoolClosed)?;

        let report = match self.calculator.calculate(&ticket.user).await {
            Ok(report) => report,
            Err(e) => {
                self.stats.record_snapshot_failure();
                return Err(e.into());
            }
        };

        let outcome = self.commit(&ticket, report).await;
        if outcome.is_err() {
            self.stats.record_snapshot_failure();
        }
        outcome
    }

    async fn commit(
        &self,
        ticket: &UpdateTicket,
        report: PositionReport,
    ) -> Result<RefreshOutcome, UpdateError> {
        let slot = self.slot(&ticket.user);
        let mut committed = slot.lock().await;

        if ticket.seq < *committed {
            warn!(
                user = %ticket.user,
                seq = ticket.seq,
                committed = *committed,
                "Dropping stale position snapshot"
            );
            self.stats.record_stale_dropped();
            return Ok(RefreshOutcome::Stale {
                seq: ticket.seq,
                committed: *committed,
            });
        }

        self.repo.upsert_position_snapshot(&report.snapshot).await?;
        *committed = ticket.seq;
        self.stats.record_snapshot_written();
        debug!(user = %ticket.user, seq = ticket.seq, "Position snapshot written");

        Ok(RefreshOutcome::Written(Box::new(report)))
    }

    fn slot(&self, user: &Address) -> Arc<tokio::sync::Mutex<u64>> {
        let mut committed = match self.committed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        committed.entry(user.clone()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{AccountData, MockChainReader};
    use crate::db::init_db;
    use crate::domain::AssetRegistry;
    use alloy_primitives::U256;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn setup(reader: MockChainReader) -> (TempDir, Arc<Repository>, PositionUpdater) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.unwrap();
        let repo = Arc::new(Repository::new(pool));
        let calculator = Arc::new(MetricsCalculator::new(
            Arc::new(reader),
            Arc::new(AssetRegistry::default()),
            Duration::from_secs(2),
        ));
        let updater = PositionUpdater::new(
            calculator,
            repo.clone(),
            DEFAULT_CONCURRENCY,
            Arc::new(PipelineStats::new()),
        );
        (temp_dir, repo, updater)
    }

    fn collateral(base: u64) -> AccountData {
        AccountData {
            total_collateral_base: U256::from(base),
            health_factor: U256::MAX,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_tickets_increase() {
        let (_dir, _repo, updater) = setup(MockChainReader::new()).await;
        let user = Address::new("0xaaa".to_string());
        let t1 = updater.ticket(&user);
        let t2 = updater.ticket(&user);
        assert!(t2.seq > t1.seq);
    }

    #[tokio::test]
    async fn test_older_slow_read_does_not_overwrite_newer() {
        let user = Address::new("0xaaa".to_string());
        let reader = MockChainReader::new()
            .with_queued_account(user.clone(), collateral(10_000_000_000), Duration::from_millis(200))
            .with_queued_account(user.clone(), collateral(20_000_000_000), Duration::from_millis(10));
        let (_dir, repo, updater) = setup(reader).await;

        let first = updater.ticket(&user);
        let second = updater.ticket(&user);
        let (r1, r2) = tokio::join!(updater.refresh(first), updater.refresh(second));

        assert!(matches!(r1.unwrap(), RefreshOutcome::Stale { .. }));
        assert!(matches!(r2.unwrap(), RefreshOutcome::Written(_)));
        let stored = repo.get_position_snapshot(&user).await.unwrap().unwrap();
        assert_eq!(stored.total_collateral_usd, 200.0);
        assert_eq!(updater.stats.snapshot().stale_dropped, 1);
    }

    #[tokio::test]
    async fn test_in_order_reads_both_commit() {
        let user = Address::new("0xaaa".to_string());
        let reader = MockChainReader::new()
            .with_queued_account(user.clone(), collateral(10_000_000_000), Duration::ZERO)
            .with_queued_account(user.clone(), collateral(20_000_000_000), Duration::ZERO);
        let (_dir, repo, updater) = setup(reader).await;

        updater.refresh_user(&user).await.unwrap();
        updater.refresh_user(&user).await.unwrap();

        let stored = repo.get_position_snapshot(&user).await.unwrap().unwrap();
        assert_eq!(stored.total_collateral_usd, 200.0);
        assert_eq!(updater.stats.snapshot().snapshots_written, 2);
    }

    #[tokio::test]
    async fn test_failed_read_writes_nothing() {
        let user = Address::new("0xbad".to_string());
        let (_dir, repo, updater) = setup(MockChainReader::new().with_failing_user(user.clone())).await;

        assert!(updater.refresh_user(&user).await.is_err());
        assert!(repo.get_position_snapshot(&user).await.unwrap().is_none());
        assert_eq!(updater.stats.snapshot().snapshot_failures, 1);
    }
}
