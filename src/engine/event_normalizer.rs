//! Maps typed pool events onto transaction-log records.

use crate::domain::{
    Address, AssetRegistry, ChainEvent, EventKind, TransactionRecord, TransactionType,
};
use alloy_primitives::U256;
use std::sync::Arc;

/// A transaction record plus every user whose position it may have changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEvent {
    pub record: TransactionRecord,
    /// Primary user first, then the related address if distinct.
    pub touched: Vec<Address>,
}

#[derive(Debug, Clone)]
pub struct EventNormalizer {
    assets: Arc<AssetRegistry>,
}

impl EventNormalizer {
    pub fn new(assets: Arc<AssetRegistry>) -> Self {
        Self { assets }
    }

    pub fn normalize(&self, event: &ChainEvent) -> NormalizedEvent {
        let base = |transaction_type: TransactionType, user: &Address, token: &Address, amount: U256| {
            TransactionRecord {
                id: event.block.event_id(),
                user_address: user.clone(),
                token_address: token.clone(),
                token_symbol: self.assets.symbol_of(token).to_string(),
                transaction_type,
                amount,
                interest_rate_mode: None,
                use_a_tokens: None,
                liquidator: None,
                debt_to_cover: None,
                liquidated_collateral_amount: None,
                related_address: None,
                block_number: event.block.block_number,
                block_timestamp: event.block.block_timestamp,
                transaction_hash: event.block.transaction_hash.clone(),
                log_index: event.block.log_index,
            }
        };

        let record = match &event.kind {
            EventKind::Supply(args) => {
                base(TransactionType::Supply, &args.user, &args.reserve, args.amount)
            }
            EventKind::Withdraw(args) => {
                base(TransactionType::Withdraw, &args.user, &args.reserve, args.amount)
            }
            EventKind::Borrow(args) => TransactionRecord {
                interest_rate_mode: Some(args.interest_rate_mode),
                ..base(TransactionType::Borrow, &args.user, &args.reserve, args.amount)
            },
            EventKind::Repay(args) => TransactionRecord {
                use_a_tokens: Some(args.use_a_tokens),
                related_address: Some(args.repayer.clone()),
                ..base(TransactionType::Repay, &args.user, &args.reserve, args.amount)
            },
            EventKind::LiquidationCall(args) => TransactionRecord {
                liquidator: Some(args.liquidator.clone()),
                debt_to_cover: Some(args.debt_to_cover),
                liquidated_collateral_amount: Some(args.liquidated_collateral_amount),
                related_address: Some(args.liquidator.clone()),
                ..base(
                    TransactionType::LiquidationCall,
                    &args.user,
                    &args.debt_asset,
                    args.debt_to_cover,
                )
            },
        };

        let mut touched = vec![record.user_address.clone()];
        if let Some(related) = &record.related_address {
            if related != &record.user_address {
                touched.push(related.clone());
            }
        }

        NormalizedEvent { record, touched }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Asset, BlockRef, BorrowArgs, LiquidationCallArgs, RepayArgs, SupplyArgs, UNKNOWN_SYMBOL,
    };

    fn addr(s: &str) -> Address {
        Address::new(s.to_string())
    }

    fn block(log_index: u64) -> BlockRef {
        BlockRef {
            block_number: 100,
            block_timestamp: 1_700_000_000,
            transaction_hash: "0xabc".to_string(),
            log_index,
        }
    }

    fn normalizer() -> EventNormalizer {
        EventNormalizer::new(Arc::new(AssetRegistry::new(vec![
            Asset {
                address: addr("0xusdc"),
                symbol: "USDC".to_string(),
                decimals: 6,
            },
            Asset {
                address: addr("0xweth"),
                symbol: "WETH".to_string(),
                decimals: 18,
            },
        ])))
    }

    #[test]
    fn test_supply_maps_to_record() {
        let event = ChainEvent {
            kind: EventKind::Supply(SupplyArgs {
                reserve: addr("0xusdc"),
                user: addr("0xaaa"),
                on_behalf_of: Some(addr("0xaaa")),
                amount: U256::from(500_000_000u64),
                referral_code: Some(0),
            }),
            block: block(3),
        };
        let normalized = normalizer().normalize(&event);
        assert_eq!(normalized.record.id, "0xabc-3");
        assert_eq!(normalized.record.transaction_type, TransactionType::Supply);
        assert_eq!(normalized.record.token_symbol, "USDC");
        assert_eq!(normalized.record.amount, U256::from(500_000_000u64));
        assert_eq!(normalized.touched, vec![addr("0xaaa")]);
    }

    #[test]
    fn test_borrow_keeps_rate_mode_and_unknown_symbol() {
        let event = ChainEvent {
            kind: EventKind::Borrow(BorrowArgs {
                reserve: addr("0xnotlisted"),
                user: addr("0xaaa"),
                on_behalf_of: None,
                amount: U256::from(1u64),
                interest_rate_mode: 2,
                referral_code: None,
            }),
            block: block(0),
        };
        let record = normalizer().normalize(&event).record;
        assert_eq!(record.interest_rate_mode, Some(2));
        assert_eq!(record.token_symbol, UNKNOWN_SYMBOL);
    }

    #[test]
    fn test_repay_touches_repayer() {
        let event = ChainEvent {
            kind: EventKind::Repay(RepayArgs {
                reserve: addr("0xusdc"),
                user: addr("0xaaa"),
                repayer: addr("0xbbb"),
                amount: U256::from(10u64),
                use_a_tokens: true,
            }),
            block: block(1),
        };
        let normalized = normalizer().normalize(&event);
        assert_eq!(normalized.record.use_a_tokens, Some(true));
        assert_eq!(normalized.record.related_address, Some(addr("0xbbb")));
        assert_eq!(normalized.touched, vec![addr("0xaaa"), addr("0xbbb")]);
    }

    #[test]
    fn test_self_repay_touches_once() {
        let event = ChainEvent {
            kind: EventKind::Repay(RepayArgs {
                reserve: addr("0xusdc"),
                user: addr("0xaaa"),
                repayer: addr("0xaaa"),
                amount: U256::from(10u64),
                use_a_tokens: false,
            }),
            block: block(1),
        };
        assert_eq!(normalizer().normalize(&event).touched, vec![addr("0xaaa")]);
    }

    #[test]
    fn test_liquidation_uses_debt_asset_and_debt_to_cover() {
        let event = ChainEvent {
            kind: EventKind::LiquidationCall(LiquidationCallArgs {
                collateral_asset: addr("0xweth"),
                debt_asset: addr("0xusdc"),
                user: addr("0xaaa"),
                debt_to_cover: U256::from(1_000u64),
                liquidated_collateral_amount: U256::from(7u64),
                liquidator: addr("0xccc"),
                receive_a_token: false,
            }),
            block: block(9),
        };
        let normalized = normalizer().normalize(&event);
        let record = &normalized.record;
        assert_eq!(record.token_address, addr("0xusdc"));
        assert_eq!(record.token_symbol, "USDC");
        assert_eq!(record.amount, U256::from(1_000u64));
        assert_eq!(record.debt_to_cover, Some(U256::from(1_000u64)));
        assert_eq!(record.liquidated_collateral_amount, Some(U256::from(7u64)));
        assert_eq!(record.liquidator, Some(addr("0xccc")));
        assert_eq!(normalized.touched, vec![addr("0xaaa"), addr("0xccc")]);
    }
}
