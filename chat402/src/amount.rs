//! Human-readable rendering of atomic token amounts.

use alloy_primitives::U256;
use rust_decimal::Decimal;

/// Renders `amount` atomic units of a token with `decimals` decimal places.
///
/// Trailing zeros are dropped. Amounts too large for a [`Decimal`] fall back
/// to the raw atomic value with an `atomic` suffix.
///
/// ```
/// use alloy_primitives::U256;
/// use chat402::amount::format_units;
///
/// assert_eq!(format_units(U256::from(507u64), 6), "0.000507");
/// assert_eq!(format_units(U256::from(2_500_000u64), 6), "2.5");
/// ```
#[must_use]
pub fn format_units(amount: U256, decimals: u32) -> String {
    u128::try_from(amount)
        .ok()
        .and_then(|v| i128::try_from(v).ok())
        .and_then(|v| Decimal::try_from_i128_with_scale(v, decimals).ok())
        .map_or_else(|| format!("{amount} atomic"), |d| d.normalize().to_string())
}
