//! Part-year adjustment of the tax-free threshold.
//!
//! A person resident for only part of the year gets a reduced lowest
//! bracket. Which formula applies is configured per tax year.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{BracketTable, BracketTableError};

/// Formula for the pro-rated lowest bracket bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum ThresholdProration {
    /// `base + per_year * months / 12`.
    ///
    /// Australia from 2012-13: 13,464 plus 4,736 for each full year.
    Intercept { base: Decimal, per_year: Decimal },
    /// `full_threshold * months / 12`.
    Linear,
}

impl ThresholdProration {
    /// Pro-rated threshold, floored to a whole unit.
    ///
    /// # Panics
    ///
    /// Panics if `months_present` is not in `1..=12`.
    pub fn prorate(
        &self,
        full_threshold: Decimal,
        months_present: u8,
    ) -> Decimal {
        assert!(
            (1..=12).contains(&months_present),
            "months present must be between 1 and 12, got {months_present}"
        );
        let months = Decimal::from(months_present);
        let twelve = Decimal::from(12);

        let threshold = match self {
            Self::Intercept { base, per_year } => *base + *per_year * months / twelve,
            Self::Linear => full_threshold * months / twelve,
        };
        threshold.floor()
    }

    /// Returns `table` with its lowest bracket bound pro-rated.
    ///
    /// Only a tax-free lowest bracket is a threshold. A flat table, or one
    /// whose lowest bracket is taxed, is returned unchanged.
    ///
    /// # Errors
    ///
    /// Fails if the pro-rated bound would break the table's ordering.
    pub fn apply(
        &self,
        table: &BracketTable,
        months_present: u8,
    ) -> Result<BracketTable, BracketTableError> {
        let Some(full_threshold) = table.first_upper_bound() else {
            return Ok(table.clone());
        };
        if !table.bottom_rate().is_zero() {
            return Ok(table.clone());
        }

        let threshold = self.prorate(full_threshold, months_present);
        debug!(%full_threshold, %threshold, months_present, "pro-rating tax-free threshold");
        table.with_first_upper_bound(threshold)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::Bracket;

    fn modern_au() -> ThresholdProration {
        ThresholdProration::Intercept {
            base: dec!(13464),
            per_year: dec!(4736),
        }
    }

    #[test]
    fn intercept_half_year() {
        assert_eq!(modern_au().prorate(dec!(18200), 6), dec!(15832));
    }

    #[test]
    fn intercept_full_year_restores_threshold() {
        assert_eq!(modern_au().prorate(dec!(18200), 12), dec!(18200));
    }

    #[test]
    fn intercept_floors_fractional_result() {
        // 13464 + 4736 / 12 = 13858.67
        assert_eq!(modern_au().prorate(dec!(18200), 1), dec!(13858));
    }

    #[test]
    fn linear_scales_full_threshold() {
        assert_eq!(ThresholdProration::Linear.prorate(dec!(6000), 6), dec!(3000));
        assert_eq!(ThresholdProration::Linear.prorate(dec!(6000), 5), dec!(2500));
        assert_eq!(ThresholdProration::Linear.prorate(dec!(6000), 7), dec!(3500));
        assert_eq!(ThresholdProration::Linear.prorate(dec!(6000), 1), dec!(500));
        assert_eq!(ThresholdProration::Linear.prorate(dec!(6000), 11), dec!(5500));
    }

    #[test]
    fn intercept_is_exact_for_odd_months() {
        // 13464 + 4736 * 3 / 12 = 14648
        assert_eq!(modern_au().prorate(dec!(18200), 3), dec!(14648));
    }

    #[test]
    #[should_panic(expected = "months present")]
    fn zero_months_panics() {
        ThresholdProration::Linear.prorate(dec!(6000), 0);
    }

    #[test]
    fn apply_replaces_lowest_bound() {
        let table = BracketTable::new(vec![
            Bracket::bounded(dec!(18200), dec!(0)),
            Bracket::bounded(dec!(45000), dec!(0.19)),
            Bracket::unbounded(dec!(0.325)),
        ]);

        let prorated = modern_au().apply(&table, 6).unwrap();

        assert_eq!(prorated.first_upper_bound(), Some(dec!(15832)));
        assert_eq!(prorated.brackets()[1], table.brackets()[1]);
    }

    #[test]
    fn apply_leaves_taxed_lowest_bracket_alone() {
        let table = BracketTable::new(vec![
            Bracket::bounded(dec!(14000), dec!(0.105)),
            Bracket::unbounded(dec!(0.175)),
        ]);

        assert_eq!(ThresholdProration::Linear.apply(&table, 6).unwrap(), table);
    }

    #[test]
    fn apply_leaves_flat_table_alone() {
        let table = BracketTable::flat(dec!(0.1));

        assert_eq!(ThresholdProration::Linear.apply(&table, 3).unwrap(), table);
    }

    #[test]
    fn deserializes_tagged_method() {
        let rule: ThresholdProration =
            serde_json::from_str(r#"{"method":"intercept","base":"13464","per_year":"4736"}"#)
                .unwrap();

        assert_eq!(rule, modern_au());
    }
}
