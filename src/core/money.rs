//! Monetary helpers.
//!
//! All amounts are BRL expressed as [`Decimal`]. Computed amounts are
//! rounded to centavos before they touch the ledger.

use crate::core::error::{EngineError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;

/// Number of decimal places kept for posted amounts.
pub const CURRENCY_DP: u32 = 2;

/// Maximum drift tolerated when reconciling balance totals.
pub const RECONCILIATION_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Largest unit price (cost or selling) the catalog accepts.
///
/// Keeps `price * quantity` for any `u32` quantity, and sums over
/// realistic orders, far inside `Decimal`'s range.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Fails with `InvalidAmount` when `price` exceeds [`MAX_UNIT_PRICE`].
pub fn ensure_unit_price(label: impl fmt::Display, price: Decimal) -> Result<()> {
    if price > MAX_UNIT_PRICE {
        return Err(EngineError::InvalidAmount(format!(
            "{} of {} exceeds the maximum of {}",
            label, price, MAX_UNIT_PRICE
        )));
    }
    Ok(())
}

/// Unwrap a `checked_*` result, reporting overflow as `InvalidAmount`.
pub(crate) fn checked(value: Option<Decimal>, what: &str) -> Result<Decimal> {
    value.ok_or_else(|| EngineError::InvalidAmount(format!("{} overflows", what)))
}

/// Round an amount to centavos, midpoint away from zero.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// True when two amounts agree within [`RECONCILIATION_TOLERANCE`].
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < RECONCILIATION_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tolerance_constant() {
        assert_eq!(RECONCILIATION_TOLERANCE, dec!(0.01));
    }

    #[test]
    fn test_round_currency() {
        assert_eq!(round_currency(dec!(10.005)), dec!(10.01));
        assert_eq!(round_currency(dec!(10.004)), dec!(10.00));
        assert_eq!(round_currency(dec!(-2.345)), dec!(-2.35));
    }

    #[test]
    fn test_unit_price_cap() {
        assert!(ensure_unit_price("price", MAX_UNIT_PRICE).is_ok());
        assert!(matches!(
            ensure_unit_price("price", MAX_UNIT_PRICE + dec!(0.01)),
            Err(EngineError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_checked_reports_overflow() {
        assert_eq!(checked(Some(dec!(1)), "total").unwrap(), dec!(1));
        assert_eq!(
            checked(Decimal::MAX.checked_add(Decimal::ONE), "total").unwrap_err(),
            EngineError::InvalidAmount("total overflows".to_string())
        );
    }

    #[test]
    fn test_within_tolerance() {
        assert!(within_tolerance(dec!(100.00), dec!(100.009)));
        assert!(!within_tolerance(dec!(100.00), dec!(100.01)));
    }
}
