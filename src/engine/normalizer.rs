//! Unit conversions from on-chain integers to human-readable values.
//!
//! All conversions use `f64`. Rounding to the exposed precision happens only
//! when a snapshot is assembled, never on intermediates.

use crate::domain::{u256_to_f64, HEALTH_FACTOR_SENTINEL};
use alloy_primitives::U256;

/// Decimals of oracle prices and of the market base currency.
pub const PRICE_DECIMALS: i32 = 8;

/// Decimals of WAD-scaled values (health factor).
pub const WAD_DECIMALS: i32 = 18;

/// Denominator of basis-point values.
pub const BPS_DENOMINATOR: f64 = 10_000.0;

/// 1e27, the fixed-point unit of reserve indices.
pub const RAY: U256 = U256::from_limbs([0x9fd0803ce8000000, 0x33b2e3c, 0, 0]);

/// `raw / 10^decimals`.
pub fn to_human_amount(raw: U256, decimals: u8) -> f64 {
    u256_to_f64(raw) / 10f64.powi(i32::from(decimals))
}

/// Oracle price (8 decimals) in USD.
pub fn to_usd_price(raw_price: U256) -> f64 {
    u256_to_f64(raw_price) / 10f64.powi(PRICE_DECIMALS)
}

/// USD value of a raw token amount at a raw oracle price.
pub fn to_usd_value(raw_amount: U256, decimals: u8, raw_price: U256) -> f64 {
    to_human_amount(raw_amount, decimals) * to_usd_price(raw_price)
}

/// Base-currency amount (USD, 8 decimals) in USD.
pub fn base_to_usd(raw: U256) -> f64 {
    to_usd_price(raw)
}

/// Basis points as a fraction (8250 -> 0.825).
pub fn bps_to_ratio(bps: U256) -> f64 {
    u256_to_f64(bps) / BPS_DENOMINATOR
}

/// RAY-scaled index as a multiplier.
pub fn ray_to_f64(raw: U256) -> f64 {
    u256_to_f64(raw) / 1.0e27
}

/// Actual balance from a scaled balance and a RAY index.
///
/// A zero index means the reserve has not been initialized and is treated as 1.0.
pub fn apply_index(scaled: U256, index: U256) -> U256 {
    if index.is_zero() {
        return scaled;
    }
    scaled.saturating_mul(index) / RAY
}

/// Health factor as a finite number.
///
/// Zero debt, the `uint256` max marker, and anything above
/// [`HEALTH_FACTOR_SENTINEL`] all map to the sentinel.
pub fn health_factor(total_debt_base: U256, raw_health_factor: U256) -> f64 {
    if total_debt_base.is_zero() || raw_health_factor == U256::MAX {
        return HEALTH_FACTOR_SENTINEL;
    }
    let hf = u256_to_f64(raw_health_factor) / 10f64.powi(WAD_DECIMALS);
    if !hf.is_finite() || hf > HEALTH_FACTOR_SENTINEL {
        HEALTH_FACTOR_SENTINEL
    } else {
        hf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_ray_constant() {
        assert_eq!(RAY, U256::from_str("1000000000000000000000000000").unwrap());
    }

    #[test]
    fn test_to_human_amount_by_decimals() {
        assert_eq!(to_human_amount(U256::from(1_500_000u64), 6), 1.5);
        assert_eq!(to_human_amount(U256::from(250_000_000u64), 8), 2.5);
        assert_eq!(
            to_human_amount(U256::from(3_000_000_000_000_000_000u64), 18),
            3.0
        );
    }

    #[test]
    fn test_to_usd_value() {
        assert_eq!(
            to_usd_value(U256::from(1_000_000u64), 6, U256::from(100_000_000u64)),
            1.0
        );

        // 2 WETH at $3000.12345678
        let amount = U256::from(2_000_000_000_000_000_000u64);
        let price = U256::from(300_012_345_678u64);
        let value = to_usd_value(amount, 18, price);
        assert!((value - 6000.24691356).abs() < 1e-6);
    }

    #[test]
    fn test_base_and_bps() {
        assert_eq!(base_to_usd(U256::from(50_000_000_000u64)), 500.0);
        assert_eq!(bps_to_ratio(U256::from(8250u64)), 0.825);
    }

    #[test]
    fn test_apply_index() {
        let scaled = U256::from(1_000_000u64);
        // 1.05 RAY
        let index = RAY + RAY / U256::from(20u64);
        assert_eq!(apply_index(scaled, index), U256::from(1_050_000u64));
        assert_eq!(apply_index(scaled, U256::ZERO), scaled);
        assert_eq!(apply_index(scaled, RAY), scaled);
    }

    #[test]
    fn test_health_factor_sentinel_cases() {
        let wad = U256::from(1_000_000_000_000_000_000u64);
        assert_eq!(health_factor(U256::ZERO, wad), HEALTH_FACTOR_SENTINEL);
        assert_eq!(health_factor(U256::from(1u64), U256::MAX), HEALTH_FACTOR_SENTINEL);
        let huge = wad * U256::from(10u64).pow(U256::from(20u64));
        assert_eq!(health_factor(U256::from(1u64), huge), HEALTH_FACTOR_SENTINEL);
    }

    #[test]
    fn test_health_factor_regular() {
        let raw = U256::from(1_250_000_000_000_000_000u64);
        assert_eq!(health_factor(U256::from(100u64), raw), 1.25);
    }
}
