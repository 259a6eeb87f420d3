//! Contract-read abstraction for lending-pool account and reserve data.

use crate::domain::Address;
use alloy_primitives::U256;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod mock;
pub mod rpc;

pub use mock::MockChainReader;
pub use rpc::RpcChainReader;

/// Aggregated account values as returned by `Pool.getUserAccountData`.
///
/// Base amounts use the market reference currency (USD, 8 decimals); the
/// threshold and LTV are basis points; the health factor is WAD-scaled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountData {
    pub total_collateral_base: U256,
    pub total_debt_base: U256,
    pub available_borrows_base: U256,
    pub current_liquidation_threshold: U256,
    pub ltv: U256,
    pub health_factor: U256,
}

/// Market-wide data for one listed reserve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveInfo {
    pub underlying_asset: Address,
    /// `None` when the reserve configuration is unset.
    pub decimals: Option<u8>,
    /// Oracle price with 8 decimals; `None` when the oracle has no price.
    pub price: Option<U256>,
    pub ltv_bps: u16,
    pub liquidation_threshold_bps: u16,
    /// RAY-scaled (1e27) supply index.
    pub liquidity_index: U256,
    /// RAY-scaled (1e27) variable borrow index.
    pub variable_borrow_index: U256,
}

/// One user's scaled balances in a reserve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserReserve {
    pub underlying_asset: Address,
    pub scaled_a_token_balance: U256,
    pub scaled_variable_debt: U256,
    pub usage_as_collateral: bool,
}

impl UserReserve {
    pub fn is_empty(&self) -> bool {
        self.scaled_a_token_balance.is_zero() && self.scaled_variable_debt.is_zero()
    }
}

/// Fields packed into a reserve's configuration bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveConfiguration {
    pub ltv_bps: u16,
    pub liquidation_threshold_bps: u16,
    pub liquidation_bonus_bps: u16,
    pub decimals: u8,
    pub is_active: bool,
    pub is_frozen: bool,
    pub borrowing_enabled: bool,
}

impl ReserveConfiguration {
    /// Decode the low 64 bits of the bitmap (bits 0-15 LTV, 16-31 liquidation
    /// threshold, 32-47 bonus, 48-55 decimals, 56 active, 57 frozen, 58 borrowing).
    pub fn from_bitmap(data: U256) -> Self {
        let low = data.as_limbs()[0];
        Self {
            ltv_bps: (low & 0xFFFF) as u16,
            liquidation_threshold_bps: ((low >> 16) & 0xFFFF) as u16,
            liquidation_bonus_bps: ((low >> 32) & 0xFFFF) as u16,
            decimals: ((low >> 48) & 0xFF) as u8,
            is_active: (low >> 56) & 1 == 1,
            is_frozen: (low >> 57) & 1 == 1,
            borrowing_enabled: (low >> 58) & 1 == 1,
        }
    }
}

/// Read client for the lending protocol's view functions.
///
/// Implementations must surface failures as errors rather than empty data.
#[async_trait]
pub trait ChainReader: Send + Sync + fmt::Debug {
    /// Aggregated collateral, debt, borrow capacity and health factor for a user.
    async fn get_user_account_data(&self, user: &Address) -> Result<AccountData, ChainReadError>;

    /// Every listed reserve with its price, decimals and indices.
    async fn get_reserves(&self) -> Result<Vec<ReserveInfo>, ChainReadError>;

    /// The user's scaled balances across all reserves.
    async fn get_user_reserves(&self, user: &Address) -> Result<Vec<UserReserve>, ChainReadError>;
}

/// Error type for contract reads.
#[derive(Debug, Clone, Error)]
pub enum ChainReadError {
    /// Connection failure, DNS error, or transport timeout.
    #[error("Network error: {0}")]
    Network(String),
    /// Non-success HTTP status from the RPC endpoint.
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    /// JSON-RPC error object (including reverts).
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    /// Response could not be hex- or ABI-decoded.
    #[error("Decode error: {0}")]
    Decode(String),
    /// Address is not a full 20-byte address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    /// Rate limit exceeded.
    #[error("Rate limited")]
    RateLimited,
    /// The read did not complete within the configured timeout.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },
    #[error("Error: {0}")]
    Other(String),
}
