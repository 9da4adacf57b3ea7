//! Currency arithmetic helpers.
//!
//! Amounts are `Decimal` currency units. Anything below half a cent is
//! treated as zero by the settler and consolidator.

use rust_decimal::{Decimal, RoundingStrategy};

/// 0.01
pub const CENT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// 0.005, remainders below this are considered settled
pub const SETTLE_EPSILON: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// 0.01, buy-in/cash-out totals may differ by this much without a discrepancy
pub const DISCREPANCY_TOLERANCE: Decimal = CENT;

/// Round to whole cents, half away from zero
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// True when the amount rounds to zero cents
pub fn is_negligible(amount: Decimal) -> bool {
    amount.abs() < SETTLE_EPSILON
}

/// True when the amount is expressible in whole cents
pub fn is_whole_cents(amount: Decimal) -> bool {
    amount.round_dp(2) == amount
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(CENT, Decimal::new(1, 2));
        assert_eq!(SETTLE_EPSILON, Decimal::new(5, 3));
    }

    #[test]
    fn test_round_cents_half_away_from_zero() {
        assert_eq!(round_cents(Decimal::new(1005, 3)), Decimal::new(101, 2));
        assert_eq!(round_cents(Decimal::new(-1005, 3)), Decimal::new(-101, 2));
        assert_eq!(round_cents(Decimal::new(1004, 3)), Decimal::new(100, 2));
    }

    #[test]
    fn test_negligible_threshold() {
        assert!(is_negligible(Decimal::new(4, 3)));
        assert!(is_negligible(Decimal::new(-4, 3)));
        assert!(!is_negligible(Decimal::new(5, 3)));
    }

    #[test]
    fn test_whole_cents() {
        assert!(is_whole_cents(Decimal::new(1250, 2)));
        assert!(is_whole_cents(Decimal::new(12500, 3)));
        assert!(!is_whole_cents(Decimal::new(12501, 3)));
    }
}
