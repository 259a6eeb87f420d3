//! Current-state position snapshot and health-factor sentinel policy.

use super::Address;
use serde::{Deserialize, Serialize};

/// Health factor stored for users with no debt.
///
/// Any finite health factor above this value is capped to it as well, so the
/// column never holds NaN, infinity, or the contract's `type(uint256).max`.
pub const HEALTH_FACTOR_SENTINEL: f64 = 1.0e12;

/// Decimal places kept on every exposed USD figure and ratio.
pub const EXPOSED_DECIMALS: i32 = 4;

/// Round a value to [`EXPOSED_DECIMALS`] places.
pub fn round_exposed(value: f64) -> f64 {
    let factor = 10f64.powi(EXPOSED_DECIMALS);
    (value * factor).round() / factor
}

/// One user's current risk position, in USD terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPositionSnapshot {
    pub user_address: Address,
    #[serde(rename = "totalCollateralUSD")]
    pub total_collateral_usd: f64,
    #[serde(rename = "totalDebtUSD")]
    pub total_debt_usd: f64,
    #[serde(rename = "availableBorrowsUSD")]
    pub available_borrows_usd: f64,
    /// Weighted liquidation threshold as a fraction (0.825 = 82.5%).
    pub liquidation_threshold: f64,
    /// Weighted loan-to-value as a fraction.
    pub ltv: f64,
    pub health_factor: f64,
}

impl UserPositionSnapshot {
    /// True when the stored health factor is the zero-debt sentinel.
    pub fn has_unbounded_health_factor(&self) -> bool {
        self.health_factor >= HEALTH_FACTOR_SENTINEL
    }
}
