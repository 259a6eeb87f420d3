//! Per-asset market parameter observations.

use super::Address;
use serde::{Deserialize, Serialize};

/// Reserve parameters observed at a block, recorded alongside pool events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketParameters {
    pub asset_address: Address,
    pub block_number: u64,
    pub symbol: String,
    pub decimals: Option<u8>,
    pub price_usd: Option<f64>,
    pub ltv: f64,
    pub liquidation_threshold: f64,
    /// Supply index as a multiplier (1.0 = no accrued interest).
    pub liquidity_index: f64,
    pub variable_borrow_index: f64,
}
