//! Computes a user's position snapshot and per-reserve exposure from contract reads.

use super::normalizer::{
    apply_index, base_to_usd, bps_to_ratio, health_factor, ray_to_f64, to_human_amount,
    to_usd_price, to_usd_value, BPS_DENOMINATOR,
};
use crate::chain::{AccountData, ChainReadError, ChainReader, ReserveInfo, UserReserve};
use crate::domain::{
    round_exposed, Address, AssetRegistry, MarketParameters, UserPositionSnapshot, DEFAULT_DECIMALS,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CalculationError {
    #[error("{operation} failed for {user}: {source}")]
    Read {
        operation: &'static str,
        user: Address,
        #[source]
        source: ChainReadError,
    },
}

/// A user's resolved balance in one reserve.
#[derive(Debug, Clone, PartialEq)]
pub struct ReserveExposure {
    pub asset: Address,
    pub symbol: String,
    pub supplied: f64,
    pub borrowed: f64,
    pub supplied_usd: f64,
    pub borrowed_usd: f64,
    pub usage_as_collateral: bool,
}

/// Everything learned about one user in a single refresh.
#[derive(Debug, Clone)]
pub struct PositionReport {
    pub snapshot: UserPositionSnapshot,
    pub exposures: Vec<ReserveExposure>,
    /// Reserves whose price or reserve data was missing; contributed zero.
    pub skipped_assets: Vec<Address>,
    /// Market-wide reserve data read during the refresh.
    pub reserves: Vec<ReserveInfo>,
}

impl PositionReport {
    pub fn reserve(&self, asset: &Address) -> Option<&ReserveInfo> {
        self.reserves.iter().find(|r| &r.underlying_asset == asset)
    }

    /// Market parameters for `asset` as observed during this refresh.
    pub fn market_parameters(
        &self,
        asset: &Address,
        symbol: &str,
        block_number: u64,
    ) -> Option<MarketParameters> {
        let info = self.reserve(asset)?;
        Some(MarketParameters {
            asset_address: asset.clone(),
            block_number,
            symbol: symbol.to_string(),
            decimals: info.decimals,
            price_usd: info.price.map(to_usd_price),
            ltv: f64::from(info.ltv_bps) / BPS_DENOMINATOR,
            liquidation_threshold: f64::from(info.liquidation_threshold_bps) / BPS_DENOMINATOR,
            liquidity_index: ray_to_f64(info.liquidity_index),
            variable_borrow_index: ray_to_f64(info.variable_borrow_index),
        })
    }
}

/// Reads on-chain state for a user and derives their snapshot.
#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    reader: Arc<dyn ChainReader>,
    assets: Arc<AssetRegistry>,
    read_timeout: Duration,
}

impl MetricsCalculator {
    pub fn new(reader: Arc<dyn ChainReader>, assets: Arc<AssetRegistry>, read_timeout: Duration) -> Self {
        Self {
            reader,
            assets,
            read_timeout,
        }
    }

    /// Read account data, reserves and user balances for `user`.
    ///
    /// Any read failure or timeout fails the whole calculation; nothing
    /// partial is returned.
    pub async fn calculate(&self, user: &Address) -> Result<PositionReport, CalculationError> {
        let account = self
            .read(user, "getUserAccountData", self.reader.get_user_account_data(user))
            .await?;
        let (reserves, user_reserves) = tokio::try_join!(
            self.read(user, "getReserves", self.reader.get_reserves()),
            self.read(user, "getUserReserves", self.reader.get_user_reserves(user)),
        )?;

        let snapshot = build_snapshot(user, &account);
        let (exposures, skipped_assets) = self.resolve_exposures(user, &reserves, &user_reserves);
        debug!(
            "Calculated position for {}: collateral={} debt={} hf={} reserves={}",
            user,
            snapshot.total_collateral_usd,
            snapshot.total_debt_usd,
            snapshot.health_factor,
            exposures.len()
        );

        Ok(PositionReport {
            snapshot,
            exposures,
            skipped_assets,
            reserves,
        })
    }

    async fn read<T>(
        &self,
        user: &Address,
        operation: &'static str,
        fut: impl Future<Output = Result<T, ChainReadError>>,
    ) -> Result<T, CalculationError> {
        let result = match tokio::time::timeout(self.read_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ChainReadError::Timeout {
                operation,
                after_ms: self.read_timeout.as_millis() as u64,
            }),
        };
        result.map_err(|source| CalculationError::Read {
            operation,
            user: user.clone(),
            source,
        })
    }

    /// Value each non-empty user reserve at its oracle price.
    ///
    /// Reserves with missing reserve data or price contribute zero and are
    /// reported in the second element; empty balances are skipped silently.
    pub fn resolve_exposures(
        &self,
        user: &Address,
        reserves: &[ReserveInfo],
        user_reserves: &[UserReserve],
    ) -> (Vec<ReserveExposure>, Vec<Address>) {
        let by_asset: HashMap<&Address, &ReserveInfo> =
            reserves.iter().map(|r| (&r.underlying_asset, r)).collect();

        let mut exposures = Vec::new();
        let mut skipped = Vec::new();
        for user_reserve in user_reserves.iter().filter(|r| !r.is_empty()) {
            let asset = &user_reserve.underlying_asset;
            let Some(info) = by_asset.get(asset) else {
                warn!("No reserve data for asset {} held by {}", asset, user);
                skipped.push(asset.clone());
                continue;
            };
            let Some(price) = info.price else {
                warn!("No oracle price for asset {} held by {}", asset, user);
                skipped.push(asset.clone());
                continue;
            };
            let decimals = info
                .decimals
                .or_else(|| self.assets.decimals_of(asset))
                .unwrap_or(DEFAULT_DECIMALS);
            let supplied_raw = apply_index(user_reserve.scaled_a_token_balance, info.liquidity_index);
            let borrowed_raw = apply_index(user_reserve.scaled_variable_debt, info.variable_borrow_index);

            exposures.push(ReserveExposure {
                asset: asset.clone(),
                symbol: self.assets.symbol_of(asset).to_string(),
                supplied: to_human_amount(supplied_raw, decimals),
                borrowed: to_human_amount(borrowed_raw, decimals),
                supplied_usd: to_usd_value(supplied_raw, decimals, price),
                borrowed_usd: to_usd_value(borrowed_raw, decimals, price),
                usage_as_collateral: user_reserve.usage_as_collateral,
            });
        }

        (exposures, skipped)
    }
}

/// Convert raw account data into an exposed snapshot.
pub fn build_snapshot(user: &Address, account: &AccountData) -> UserPositionSnapshot {
    UserPositionSnapshot {
        user_address: user.clone(),
        total_collateral_usd: round_exposed(base_to_usd(account.total_collateral_base)),
        total_debt_usd: round_exposed(base_to_usd(account.total_debt_base)),
        available_borrows_usd: round_exposed(base_to_usd(account.available_borrows_base)),
        liquidation_threshold: round_exposed(bps_to_ratio(account.current_liquidation_threshold)),
        ltv: round_exposed(bps_to_ratio(account.ltv)),
        health_factor: round_exposed(health_factor(account.total_debt_base, account.health_factor)),
    }
}
