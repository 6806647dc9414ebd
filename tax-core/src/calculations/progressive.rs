//! Marginal-rate bracket walk.
//!
//! Every progressive schedule in the bundled data (income tax, National
//! Insurance, stamp duty, transfer taxes) runs through
//! [`compute_bracket_tax`]. Jurisdiction differences live in the tables,
//! not in code.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use tax_core::calculations::compute_bracket_tax;
//! use tax_core::{Bracket, BracketTable};
//!
//! let table = BracketTable::new(vec![
//!     Bracket::bounded(dec!(10000), dec!(0.10)),
//!     Bracket::unbounded(dec!(0.20)),
//! ]);
//!
//! let result = compute_bracket_tax(dec!(15000), &table);
//!
//! assert_eq!(result.tax_due, dec!(2000.00));
//! assert_eq!(result.marginal_rate, dec!(0.20));
//! assert_eq!(result.contributions.len(), 2);
//! ```

use rust_decimal::Decimal;
use tracing::trace;

use crate::calculations::common::non_negative;
use crate::{BracketContribution, BracketTable, CalculationResult};

/// Computes the tax due on `amount` under `table`.
///
/// Each bracket taxes the slice of the amount between the previous upper
/// bound and its own. The walk stops at the bracket containing the amount,
/// and that bracket's rate is the marginal rate. An amount sitting exactly
/// on an upper bound belongs to the lower bracket.
///
/// # Panics
///
/// Panics if `amount` is negative. Input validation belongs to the caller.
pub fn compute_bracket_tax(
    amount: Decimal,
    table: &BracketTable,
) -> CalculationResult {
    assert!(
        amount >= Decimal::ZERO,
        "taxable amount must be non-negative, got {amount}"
    );

    let mut previous_upper_bound = Decimal::ZERO;
    let mut tax_due = Decimal::ZERO;
    let mut marginal_rate = table.bottom_rate();
    let mut contributions = Vec::new();

    for (bracket_index, bracket) in table.brackets().iter().enumerate() {
        let ceiling = bracket.upper_bound.map_or(amount, |upper| upper.min(amount));
        let taxable_slice = non_negative(ceiling - previous_upper_bound);

        if taxable_slice > Decimal::ZERO {
            let contribution = taxable_slice * bracket.rate;
            tax_due += contribution;
            contributions.push(BracketContribution {
                bracket_index,
                lower_bound: previous_upper_bound,
                upper_bound: bracket.upper_bound,
                rate: bracket.rate,
                taxable_slice,
                amount: contribution,
            });
        }

        marginal_rate = bracket.rate;

        match bracket.upper_bound {
            Some(upper) if amount > upper => previous_upper_bound = upper,
            _ => break,
        }
    }

    trace!(%amount, %tax_due, %marginal_rate, "bracket walk complete");

    CalculationResult {
        tax_due,
        marginal_rate,
        contributions,
    }
}
