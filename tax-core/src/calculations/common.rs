//! Rounding and clamping shared by the engine and its presentation.
//!
//! The engine itself never rounds a bracket walk; only reported totals and
//! per-period figures go through [`round_half_up`].

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a money amount to two decimal places, midpoints away from zero.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use tax_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(7166.915)), dec!(7166.92));
/// assert_eq!(round_half_up(dec!(2615.3846)), dec!(2615.38));
/// assert_eq!(round_half_up(dec!(-0.005)), dec!(-0.01));
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Clamps a negative amount to zero.
///
/// Used wherever a difference must not go below zero: a bracket slice, an
/// excess over a threshold, a taxable amount after deductions, a tax total
/// after credits.
///
/// ```
/// use rust_decimal_macros::dec;
/// use tax_core::calculations::common::non_negative;
///
/// assert_eq!(non_negative(dec!(18200) - dec!(20000)), dec!(0));
/// assert_eq!(non_negative(dec!(45000) - dec!(18200)), dec!(26800));
/// ```
pub fn non_negative(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    // =========================================================================
    // round_half_up
    // =========================================================================

    #[test]
    fn round_half_up_rounds_down_below_midpoint() {
        assert_eq!(round_half_up(dec!(1135.604)), dec!(1135.60));
    }

    #[test]
    fn round_half_up_rounds_up_at_midpoint() {
        assert_eq!(round_half_up(dec!(1135.605)), dec!(1135.61));
    }

    #[test]
    fn round_half_up_negative_midpoint_goes_away_from_zero() {
        assert_eq!(round_half_up(dec!(-123.455)), dec!(-123.46));
    }

    #[test]
    fn round_half_up_carries_into_whole_units() {
        assert_eq!(round_half_up(dec!(999999.999)), dec!(1000000.00));
    }

    #[test]
    fn round_half_up_leaves_whole_amounts_alone() {
        assert_eq!(round_half_up(dec!(22967)), dec!(22967));
        assert_eq!(round_half_up(dec!(0)), dec!(0));
    }

    // =========================================================================
    // non_negative
    // =========================================================================

    #[test]
    fn non_negative_keeps_positive_values() {
        assert_eq!(non_negative(dec!(0.01)), dec!(0.01));
    }

    #[test]
    fn non_negative_clamps_negative_values() {
        assert_eq!(non_negative(dec!(-520)), dec!(0));
    }

    #[test]
    fn non_negative_keeps_zero() {
        assert_eq!(non_negative(Decimal::ZERO), Decimal::ZERO);
    }
}
