use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tax charged on the portion of the amount that fell inside one bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketContribution {
    /// Position of the bracket in its table (0 = lowest).
    pub bracket_index: usize,
    pub lower_bound: Decimal,
    /// `None` for the unbounded top bracket.
    pub upper_bound: Option<Decimal>,
    pub rate: Decimal,
    /// Portion of the amount taxed inside this bracket.
    pub taxable_slice: Decimal,
    /// `taxable_slice * rate`.
    pub amount: Decimal,
}

/// Output of one bracket walk.
///
/// Values are unrounded; presentation code decides on display precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub tax_due: Decimal,
    /// Rate of the bracket that contains the amount.
    pub marginal_rate: Decimal,
    /// Non-zero slices, lowest bracket first.
    pub contributions: Vec<BracketContribution>,
}

impl CalculationResult {
    /// `tax_due / amount`, or zero for a zero amount.
    pub fn effective_rate(
        &self,
        amount: Decimal,
    ) -> Decimal {
        if amount.is_zero() {
            Decimal::ZERO
        } else {
            self.tax_due / amount
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn effective_rate_divides_by_amount() {
        let result = CalculationResult {
            tax_due: dec!(2000),
            marginal_rate: dec!(0.20),
            contributions: vec![],
        };

        assert_eq!(result.effective_rate(dec!(15000)).round_dp(4), dec!(0.1333));
    }

    #[test]
    fn effective_rate_is_zero_for_zero_amount() {
        let result = CalculationResult {
            tax_due: Decimal::ZERO,
            marginal_rate: dec!(0.10),
            contributions: vec![],
        };

        assert_eq!(result.effective_rate(Decimal::ZERO), Decimal::ZERO);
    }
}
