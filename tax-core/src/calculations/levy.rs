//! Flat-rate levies with an optional income ceiling.
//!
//! Social Security, ACC earners' levy and similar charges tax the base at a
//! single rate up to a maximum. Stacking levies (Social Security plus
//! Medicare) are independent calls; the caller sums the results.

use rust_decimal::Decimal;

/// Returns `min(base, cap) * rate`.
///
/// ```
/// use rust_decimal_macros::dec;
/// use tax_core::calculations::apply_capped_levy;
///
/// // Social Security above the 2026 wage base.
/// let levy = apply_capped_levy(dec!(200000), dec!(0.062), dec!(184500));
/// assert_eq!(levy, dec!(11439.000));
/// ```
///
/// # Panics
///
/// Panics if `base` or `cap` is negative, or `rate` is outside `[0, 1]`.
pub fn apply_capped_levy(
    base: Decimal,
    rate: Decimal,
    cap: Decimal,
) -> Decimal {
    assert!(base >= Decimal::ZERO, "levy base must be non-negative, got {base}");
    assert!(cap >= Decimal::ZERO, "levy cap must be non-negative, got {cap}");
    assert!(
        (Decimal::ZERO..=Decimal::ONE).contains(&rate),
        "levy rate must be between 0 and 1, got {rate}"
    );

    base.min(cap) * rate
}

/// Same as [`apply_capped_levy`] with no ceiling.
pub fn apply_uncapped_levy(
    base: Decimal,
    rate: Decimal,
) -> Decimal {
    apply_capped_levy(base, rate, base)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn base_above_cap_is_capped() {
        let levy = apply_capped_levy(dec!(200000), dec!(0.02), dec!(184500));

        assert_eq!(levy, dec!(3690.00));
    }

    #[test]
    fn base_below_cap_is_taxed_in_full() {
        let levy = apply_capped_levy(dec!(50000), dec!(0.0167), dec!(152790));

        assert_eq!(levy, dec!(835.0000));
    }

    #[test]
    fn base_equal_to_cap() {
        let levy = apply_capped_levy(dec!(184500), dec!(0.062), dec!(184500));

        assert_eq!(levy, dec!(11439.000));
    }

    #[test]
    fn zero_base_is_zero() {
        assert_eq!(
            apply_capped_levy(Decimal::ZERO, dec!(0.062), dec!(184500)),
            Decimal::ZERO
        );
    }

    #[test]
    fn stacked_levies_sum_independently() {
        let wages = dec!(200000);

        let total = apply_capped_levy(wages, dec!(0.062), dec!(184500))
            + apply_uncapped_levy(wages, dec!(0.0145));

        assert_eq!(total, dec!(14339.0000));
    }

    #[test]
    #[should_panic(expected = "levy rate")]
    fn rate_above_one_panics() {
        apply_capped_levy(dec!(100), dec!(1.5), dec!(1000));
    }

    #[test]
    #[should_panic(expected = "levy base")]
    fn negative_base_panics() {
        apply_capped_levy(dec!(-100), dec!(0.1), dec!(1000));
    }
}
