//! Domain primitives: Address, BlockRef, and lenient U256 parsing.

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// EVM account or contract address, stored lower-cased with a `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid address: {0}")]
pub struct AddressParseError(pub String);

impl Address {
    /// Create an Address without validation (input is still lower-cased).
    pub fn new(addr: String) -> Self {
        Address(addr.trim().to_lowercase())
    }

    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert a contract-returned address into the canonical form.
    pub fn from_alloy(addr: alloy_primitives::Address) -> Self {
        Address(format!("0x{}", hex::encode(addr.as_slice())))
    }

    /// Parse into a full 20-byte address for ABI encoding.
    pub fn to_alloy(&self) -> Result<alloy_primitives::Address, AddressParseError> {
        alloy_primitives::Address::from_str(&self.0)
            .map_err(|_| AddressParseError(self.0.clone()))
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| AddressParseError(s.to_string()))?;
        if hex_part.is_empty()
            || hex_part.len() > 40
            || !hex_part.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(AddressParseError(s.to_string()));
        }
        Ok(Address(format!("0x{}", hex_part.to_lowercase())))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::from_str(&value)
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a log within the chain: block, timestamp, transaction and log index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_hash: String,
    pub log_index: u64,
}

impl BlockRef {
    /// Deterministic identity of the log: `transactionHash-logIndex`.
    pub fn event_id(&self) -> String {
        format!("{}-{}", self.transaction_hash, self.log_index)
    }
}

/// Deserialize a U256 from a decimal string, a `0x` hex string, or a JSON integer.
pub fn deserialize_u256<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    parse_u256_value(&value).map_err(serde::de::Error::custom)
}

fn parse_u256_value(value: &serde_json::Value) -> Result<U256, String> {
    match value {
        serde_json::Value::String(s) => {
            U256::from_str(s.trim()).map_err(|e| format!("invalid uint256 {:?}: {}", s, e))
        }
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| format!("uint256 must be a non-negative integer, got {}", n)),
        other => Err(format!("expected uint256, got {}", other)),
    }
}

/// Lossy conversion of a raw on-chain integer to `f64`.
pub fn u256_to_f64(value: U256) -> f64 {
    if let Ok(small) = u128::try_from(value) {
        return small as f64;
    }
    value.to_string().parse::<f64>().unwrap_or(f64::MAX)
}
