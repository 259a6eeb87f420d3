//! Canonical transaction-log record.

use super::Address;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of user action recorded in the transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Supply,
    Withdraw,
    Borrow,
    Repay,
    LiquidationCall,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Supply => "Supply",
            TransactionType::Withdraw => "Withdraw",
            TransactionType::Borrow => "Borrow",
            TransactionType::Repay => "Repay",
            TransactionType::LiquidationCall => "LiquidationCall",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Supply" => Ok(TransactionType::Supply),
            "Withdraw" => Ok(TransactionType::Withdraw),
            "Borrow" => Ok(TransactionType::Borrow),
            "Repay" => Ok(TransactionType::Repay),
            "LiquidationCall" => Ok(TransactionType::LiquidationCall),
            other => Err(format!("unknown transaction type: {}", other)),
        }
    }
}

/// One row of the append-only transaction log.
///
/// Raw token amounts stay as `U256` and are persisted as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// `transactionHash-logIndex`.
    pub id: String,
    pub user_address: Address,
    pub token_address: Address,
    pub token_symbol: String,
    pub transaction_type: TransactionType,
    pub amount: U256,
    pub interest_rate_mode: Option<u8>,
    pub use_a_tokens: Option<bool>,
    pub liquidator: Option<Address>,
    pub debt_to_cover: Option<U256>,
    pub liquidated_collateral_amount: Option<U256>,
    /// Repayer (Repay) or liquidator (LiquidationCall).
    pub related_address: Option<Address>,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_hash: String,
    pub log_index: u64,
}
