//! Domain types for the lending position indexer.
//!
//! This module provides:
//! - Address and block primitives
//! - The static asset table
//! - Typed pool events and the transaction-log record
//! - The position snapshot and its health-factor sentinel policy

pub mod asset;
pub mod event;
pub mod market;
pub mod position;
pub mod primitives;
pub mod transaction;

pub use asset::{Asset, AssetRegistry, DEFAULT_DECIMALS, UNKNOWN_SYMBOL};
pub use event::{
    BorrowArgs, ChainEvent, EventDecodeError, EventKind, LiquidationCallArgs, RawEnvelope,
    RepayArgs, SupplyArgs, WithdrawArgs,
};
pub use market::MarketParameters;
pub use position::{round_exposed, UserPositionSnapshot, HEALTH_FACTOR_SENTINEL};
pub use primitives::{u256_to_f64, Address, AddressParseError, BlockRef};
pub use transaction::{TransactionRecord, TransactionType};
