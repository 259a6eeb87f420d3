//! Startup and scheduled backfill over a seed list of addresses.

use crate::db::Repository;
use crate::domain::Address;
use crate::orchestration::stats::PipelineStats;
use crate::orchestration::updater::{PositionUpdater, RefreshOutcome};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("failed to read seed file {path}: {source}")]
    SeedFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of one backfill pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Refreshes superseded by a newer event-driven refresh.
    pub stale: usize,
    pub failures: Vec<(Address, String)>,
}

/// Parse a seed list: one address per line, first whitespace-separated token.
///
/// Blank lines and tokens that are not addresses are skipped with a warning.
/// Repeated addresses are kept once, in first-seen order.
pub fn parse_seed_list(content: &str) -> Vec<Address> {
    let mut seen = HashSet::new();
    let mut addresses = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let Some(token) = line.split_whitespace().next() else {
            continue;
        };
        match token.parse::<Address>() {
            Ok(address) => {
                if seen.insert(address.clone()) {
                    addresses.push(address);
                }
            }
            Err(e) => warn!(line = line_no + 1, "Skipping seed entry: {}", e),
        }
    }

    addresses
}

/// `seeds` followed by any `extra` addresses not already present.
pub fn merge_addresses(seeds: &[Address], extra: Vec<Address>) -> Vec<Address> {
    let mut seen: HashSet<Address> = seeds.iter().cloned().collect();
    let mut merged = seeds.to_vec();
    merged.extend(extra.into_iter().filter(|a| seen.insert(a.clone())));
    merged
}

/// Read and parse the seed file. A missing or unreadable file is an error.
pub async fn load_seed_file(path: impl AsRef<Path>) -> Result<Vec<Address>, BackfillError> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| BackfillError::SeedFile {
            path: path.to_path_buf(),
            source,
        })?;
    let addresses = parse_seed_list(&content);
    info!("Loaded {} seed addresses from {}", addresses.len(), path.display());
    Ok(addresses)
}

/// Refreshes every address in a list through the shared updater.
#[derive(Debug, Clone)]
pub struct BackfillCoordinator {
    updater: Arc<PositionUpdater>,
    concurrency: usize,
    stats: Arc<PipelineStats>,
}

impl BackfillCoordinator {
    pub fn new(updater: Arc<PositionUpdater>, concurrency: usize, stats: Arc<PipelineStats>) -> Self {
        Self {
            updater,
            concurrency: concurrency.max(1),
            stats,
        }
    }

    /// Refresh each address once. Individual failures are logged and counted;
    /// returns after every refresh has resolved.
    pub async fn run(&self, addresses: &[Address]) -> BackfillReport {
        info!(total = addresses.len(), "Starting backfill");

        let results: Vec<_> = stream::iter(addresses.iter().cloned())
            .map(|user| {
                let updater = self.updater.clone();
                async move {
                    let result = updater.refresh_user(&user).await;
                    (user, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = BackfillReport {
            total: addresses.len(),
            ..Default::default()
        };
        for (user, result) in results {
            match result {
                Ok(RefreshOutcome::Written(_)) => report.succeeded += 1,
                Ok(RefreshOutcome::Stale { .. }) => {
                    report.succeeded += 1;
                    report.stale += 1;
                }
                Err(e) => {
                    warn!(user = %user, error = %e, "Backfill refresh failed");
                    report.failed += 1;
                    report.failures.push((user, e.to_string()));
                }
            }
        }
        self.stats.record_backfill(report.succeeded, report.failed);

        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            "Backfill finished"
        );
        report
    }

    /// Re-run the backfill every `period` over the seeds plus every registered
    /// user. The first pass happens one period after the call. Never returns.
    pub async fn run_every(&self, period: Duration, repo: Arc<Repository>, seeds: Vec<Address>) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let addresses = match repo.query_registered_users().await {
                Ok(users) => merge_addresses(&seeds, users),
                Err(e) => {
                    warn!(error = %e, "Failed to load registered users, using seeds only");
                    seeds.clone()
                }
            };
            self.run(&addresses).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed_list_first_token() {
        let content = "0xAAA extra columns here\n\n0xbbb\tfoo\n";
        let addresses = parse_seed_list(content);
        assert_eq!(
            addresses,
            vec![
                Address::new("0xaaa".to_string()),
                Address::new("0xbbb".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_seed_list_skips_invalid_and_duplicates() {
        let content = "not-an-address\n0xaaa\n0xAAA\n   \n0xzz\n";
        let addresses = parse_seed_list(content);
        assert_eq!(addresses, vec![Address::new("0xaaa".to_string())]);
    }

    #[test]
    fn test_merge_addresses_keeps_seed_order() {
        let a = Address::new("0xaaa".to_string());
        let b = Address::new("0xbbb".to_string());
        let c = Address::new("0xccc".to_string());
        let merged = merge_addresses(&[a.clone(), b.clone()], vec![b.clone(), c.clone(), a.clone()]);
        assert_eq!(merged, vec![a, b, c]);
    }

    #[tokio::test]
    async fn test_load_seed_file_missing_is_error() {
        let err = load_seed_file("/nonexistent/dir/addresses.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, BackfillError::SeedFile { .. }));
    }
}
