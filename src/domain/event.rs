//! Lending-pool events as a closed tagged union.
//!
//! Each variant carries its own strongly-typed argument record. Raw JSON
//! envelopes from the event source are decoded with [`ChainEvent::from_envelope`].

use super::primitives::{deserialize_u256, Address, BlockRef};
use alloy_primitives::U256;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyArgs {
    pub reserve: Address,
    pub user: Address,
    #[serde(default)]
    pub on_behalf_of: Option<Address>,
    #[serde(deserialize_with = "deserialize_u256")]
    pub amount: U256,
    #[serde(default)]
    pub referral_code: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawArgs {
    pub reserve: Address,
    pub user: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(deserialize_with = "deserialize_u256")]
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowArgs {
    pub reserve: Address,
    pub user: Address,
    #[serde(default)]
    pub on_behalf_of: Option<Address>,
    #[serde(deserialize_with = "deserialize_u256")]
    pub amount: U256,
    pub interest_rate_mode: u8,
    #[serde(default)]
    pub referral_code: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepayArgs {
    pub reserve: Address,
    pub user: Address,
    pub repayer: Address,
    #[serde(deserialize_with = "deserialize_u256")]
    pub amount: U256,
    #[serde(rename = "useATokens")]
    pub use_a_tokens: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationCallArgs {
    pub collateral_asset: Address,
    pub debt_asset: Address,
    pub user: Address,
    #[serde(deserialize_with = "deserialize_u256")]
    pub debt_to_cover: U256,
    #[serde(deserialize_with = "deserialize_u256")]
    pub liquidated_collateral_amount: U256,
    pub liquidator: Address,
    #[serde(default, rename = "receiveAToken")]
    pub receive_a_token: bool,
}

/// Event payload, one variant per pool event kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Supply(SupplyArgs),
    Withdraw(WithdrawArgs),
    Borrow(BorrowArgs),
    Repay(RepayArgs),
    LiquidationCall(LiquidationCallArgs),
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Supply(_) => "Supply",
            EventKind::Withdraw(_) => "Withdraw",
            EventKind::Borrow(_) => "Borrow",
            EventKind::Repay(_) => "Repay",
            EventKind::LiquidationCall(_) => "LiquidationCall",
        }
    }
}

/// A decoded pool event together with its position on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEvent {
    pub kind: EventKind,
    pub block: BlockRef,
}

#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("unknown event kind: {0}")]
    UnknownKind(String),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid {kind} args: {source}")]
    InvalidArgs {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(#[from] serde_json::Error),
}

/// Raw message shape delivered by the event source.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEnvelope {
    pub event_kind: String,
    #[serde(default)]
    pub args: Option<serde_json::Value>,
    #[serde(default)]
    pub block: Option<RawBlock>,
    #[serde(default)]
    pub transaction: Option<RawTransaction>,
    #[serde(default)]
    pub log: Option<RawLog>,
}

#[derive(Debug, Deserialize)]
pub struct RawBlock {
    pub number: u64,
    pub timestamp: u64,
}

#[derive(Debug, Deserialize)]
pub struct RawTransaction {
    pub hash: String,
}

#[derive(Debug, Deserialize)]
pub struct RawLog {
    #[serde(alias = "logIndex")]
    pub index: u64,
}

/// The one-time signal delivered before any events.
pub const SETUP_KIND: &str = "setup";

impl RawEnvelope {
    pub fn is_setup(&self) -> bool {
        self.event_kind.eq_ignore_ascii_case(SETUP_KIND)
    }
}

impl ChainEvent {
    /// Decode a raw envelope into a typed event.
    pub fn from_envelope(envelope: RawEnvelope) -> Result<Self, EventDecodeError> {
        let block = envelope.block.ok_or(EventDecodeError::MissingField("block"))?;
        let transaction = envelope
            .transaction
            .ok_or(EventDecodeError::MissingField("transaction"))?;
        let log = envelope.log.ok_or(EventDecodeError::MissingField("log"))?;
        let args = envelope.args.ok_or(EventDecodeError::MissingField("args"))?;

        let kind_name = envelope.event_kind;
        let invalid = |source: serde_json::Error| EventDecodeError::InvalidArgs {
            kind: kind_name.clone(),
            source,
        };

        let kind = match kind_name.as_str() {
            "Supply" => EventKind::Supply(serde_json::from_value(args).map_err(invalid)?),
            "Withdraw" => EventKind::Withdraw(serde_json::from_value(args).map_err(invalid)?),
            "Borrow" => EventKind::Borrow(serde_json::from_value(args).map_err(invalid)?),
            "Repay" => EventKind::Repay(serde_json::from_value(args).map_err(invalid)?),
            "LiquidationCall" => {
                EventKind::LiquidationCall(serde_json::from_value(args).map_err(invalid)?)
            }
            other => return Err(EventDecodeError::UnknownKind(other.to_string())),
        };

        Ok(ChainEvent {
            kind,
            block: BlockRef {
                block_number: block.number,
                block_timestamp: block.timestamp,
                transaction_hash: transaction.hash.trim().to_lowercase(),
                log_index: log.index,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: serde_json::Value) -> RawEnvelope {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_decode_supply() {
        let env = envelope(serde_json::json!({
            "eventKind": "Supply",
            "args": {
                "reserve": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
                "user": "0xAAA",
                "onBehalfOf": "0xAAA",
                "amount": "1000000",
                "referralCode": 0
            },
            "block": {"number": 100, "timestamp": 1700000000},
            "transaction": {"hash": "0xABCD"},
            "log": {"index": 3}
        }));

        let event = ChainEvent::from_envelope(env).unwrap();
        match &event.kind {
            EventKind::Supply(args) => {
                assert_eq!(args.user.as_str(), "0xaaa");
                assert_eq!(args.amount, U256::from(1_000_000u64));
            }
            other => panic!("expected Supply, got {:?}", other),
        }
        assert_eq!(event.block.event_id(), "0xabcd-3");
    }

    #[test]
    fn test_decode_liquidation() {
        let env = envelope(serde_json::json!({
            "eventKind": "LiquidationCall",
            "args": {
                "collateralAsset": "0x01",
                "debtAsset": "0x02",
                "user": "0x03",
                "debtToCover": "500",
                "liquidatedCollateralAmount": "0x10",
                "liquidator": "0x04",
                "receiveAToken": false
            },
            "block": {"number": 5, "timestamp": 6},
            "transaction": {"hash": "0x99"},
            "log": {"logIndex": 0}
        }));

        let event = ChainEvent::from_envelope(env).unwrap();
        assert_eq!(event.kind.name(), "LiquidationCall");
        match event.kind {
            EventKind::LiquidationCall(args) => {
                assert_eq!(args.liquidated_collateral_amount, U256::from(16u64));
                assert_eq!(args.liquidator.as_str(), "0x04");
            }
            other => panic!("expected LiquidationCall, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let env = envelope(serde_json::json!({
            "eventKind": "FlashLoan",
            "args": {},
            "block": {"number": 1, "timestamp": 1},
            "transaction": {"hash": "0x1"},
            "log": {"index": 0}
        }));
        assert!(matches!(
            ChainEvent::from_envelope(env),
            Err(EventDecodeError::UnknownKind(k)) if k == "FlashLoan"
        ));
    }

    #[test]
    fn test_missing_block_rejected() {
        let env = envelope(serde_json::json!({
            "eventKind": "Withdraw",
            "args": {"reserve": "0x01", "user": "0x02", "amount": "1"}
        }));
        assert!(matches!(
            ChainEvent::from_envelope(env),
            Err(EventDecodeError::MissingField("block"))
        ));
    }

    #[test]
    fn test_bad_args_reported_with_kind() {
        let env = envelope(serde_json::json!({
            "eventKind": "Borrow",
            "args": {"reserve": "0x01", "user": "0x02", "amount": "1"},
            "block": {"number": 1, "timestamp": 1},
            "transaction": {"hash": "0x1"},
            "log": {"index": 0}
        }));
        let err = ChainEvent::from_envelope(env).unwrap_err();
        assert!(err.to_string().starts_with("invalid Borrow args"));
    }

    #[test]
    fn test_setup_envelope() {
        let env = envelope(serde_json::json!({"eventKind": "setup"}));
        assert!(env.is_setup());
    }
}
