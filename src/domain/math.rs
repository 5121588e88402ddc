//! Share-to-asset conversion and valuation math.
//!
//! All share/asset/balance arithmetic stays in big integers through the
//! conversion step; floating point enters only at the final USD multiply.

use alloy_primitives::ruint::UintTryTo;
use alloy_primitives::{utils, U256, U512};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Underlying assets redeemable for `shares`, as
/// `floor(shares * total_assets / total_supply)`.
///
/// Uses a 512-bit intermediate product, so the multiply cannot overflow.
/// Truncating division matches on-chain redemption rounding.
///
/// Callers must ensure `total_supply > 0`; zero-supply vaults have no
/// valid conversion and their positions are skipped upstream.
pub fn convert_shares_to_assets(shares: U256, total_assets: U256, total_supply: U256) -> U256 {
    debug_assert!(!total_supply.is_zero(), "zero total_supply");
    let numerator: U512 = shares.widening_mul(total_assets);
    let quotient = numerator / U512::from(total_supply);
    // Exceeds 256 bits only if shares > total_supply, which a holder
    // balance cannot; saturate rather than panic on malformed input.
    quotient.uint_try_to().unwrap_or(U256::MAX)
}

/// Format a raw integer amount as a human-readable decimal string using
/// the asset's decimals, trimming trailing fractional zeros.
///
/// Pure string arithmetic; never routes through floating point.
pub fn format_units(value: U256, decimals: u8) -> String {
    match utils::format_units(value, decimals) {
        Ok(s) => {
            if s.contains('.') {
                let trimmed = s.trim_end_matches('0').trim_end_matches('.');
                trimmed.to_string()
            } else {
                s
            }
        }
        Err(_) => value.to_string(),
    }
}

/// USD value of a decimal balance string at the given unit price.
///
/// Computed in `rust_decimal` where the operands fit, falling back to
/// `f64` for balances beyond decimal precision. The result is display
/// precision only.
pub fn usd_value(balance: &str, price: f64) -> f64 {
    if let (Ok(b), Some(p)) = (Decimal::from_str(balance), Decimal::from_f64_retain(price)) {
        if let Some(v) = (b * p).to_f64() {
            return v;
        }
    }
    balance.parse::<f64>().map(|b| b * price).unwrap_or(0.0)
}
