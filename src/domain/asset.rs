//! Static asset table: address → (symbol, decimals).

use super::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Decimal count assumed for assets missing from the table.
pub const DEFAULT_DECIMALS: u8 = 18;

/// Symbol recorded for assets missing from the table.
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// One listed reserve token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// Immutable lookup table of listed assets, keyed by address.
///
/// Symbols are not unique; lookups always go through the address.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    by_address: HashMap<Address, Asset>,
}

impl AssetRegistry {
    /// Build a registry; later duplicates of an address are ignored.
    pub fn new(assets: Vec<Asset>) -> Self {
        let mut by_address = HashMap::with_capacity(assets.len());
        for asset in assets {
            if by_address.contains_key(&asset.address) {
                warn!(address = %asset.address, symbol = %asset.symbol, "Duplicate asset address in config, keeping first entry");
                continue;
            }
            by_address.insert(asset.address.clone(), asset);
        }
        Self { by_address }
    }

    /// Assets listed on the Base market by default.
    pub fn base_default() -> Self {
        const BASE_ASSETS: &[(&str, &str, u8)] = &[
            ("0x4200000000000000000000000000000000000006", "WETH", 18),
            ("0x2Ae3F1Ec7F1F5012CFEab0185bfc7aa3cf0DEc22", "cbETH", 18),
            ("0xd9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA", "USDbC", 6),
            ("0xc1CBa3fCea344f92D9239c08C0568f6F2F0ee452", "wstETH", 18),
            ("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", "USDC", 6),
            ("0x04C0599Ae5A44757c0a6fF9eC3b93da8976c150A", "weETH", 18),
            ("0xcbB7C0000aB888473b1f5aFd9ef808440eed33Bf", "cbBTC", 8),
            ("0x2416092f143378750bb29b79eD961ab195cCeea5", "ezETH", 18),
            ("0x6Bb7a212910682DCfDbd5BCBb3e28FB4E8da10Ee", "GHO", 18),
            ("0xEDfa23602D0EC14714057867A78d01e94176BEA0", "wrsETH", 18),
            ("0xecAc9C5F704e954931349Da37F60E39f515c11c1", "LBTC", 8),
        ];

        Self::new(
            BASE_ASSETS
                .iter()
                .map(|(address, symbol, decimals)| Asset {
                    address: Address::new(address.to_string()),
                    symbol: symbol.to_string(),
                    decimals: *decimals,
                })
                .collect(),
        )
    }

    pub fn get(&self, address: &Address) -> Option<&Asset> {
        self.by_address.get(address)
    }

    /// Symbol for an address, or `UNKNOWN` when unlisted.
    pub fn symbol_of(&self, address: &Address) -> &str {
        self.get(address)
            .map(|a| a.symbol.as_str())
            .unwrap_or(UNKNOWN_SYMBOL)
    }

    /// Decimals for an address, if listed.
    pub fn decimals_of(&self, address: &Address) -> Option<u8> {
        self.get(address).map(|a| a.decimals)
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}
