//! Credits that are paid in full across a band and then abate.
//!
//! The shape is a plateau with a linear ramp down:
//!
//! | Base                              | Credit |
//! |-----------------------------------|--------|
//! | below `floor`                     | 0 |
//! | `floor` to `full_credit_ceiling`  | `amount` |
//! | `full_credit_ceiling` to `phase_out_end` | `amount - (base - ceiling) * phase_out_rate`, never below 0 |
//! | `phase_out_end` and above         | 0 |
//!
//! New Zealand's independent earner tax credit is the bundled example.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calculations::common::non_negative;

/// Reasons a [`PhaseOutCredit`] configuration is unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhaseOutCreditError {
    #[error("credit floor {floor} exceeds full-credit ceiling {ceiling}")]
    FloorAboveCeiling { floor: Decimal, ceiling: Decimal },

    #[error("full-credit ceiling {ceiling} exceeds phase-out end {end}")]
    CeilingAboveEnd { ceiling: Decimal, end: Decimal },

    #[error("phase-out rate must be between 0 and 1, got {0}")]
    InvalidRate(Decimal),

    #[error("credit thresholds and amount must be non-negative")]
    NegativeValue,
}

/// Parameters of a phase-out credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseOutCredit {
    /// Lowest base that earns any credit.
    pub floor: Decimal,
    /// Highest base that still earns the full amount.
    pub full_credit_ceiling: Decimal,
    /// Base at which the credit is gone.
    pub phase_out_end: Decimal,
    pub amount: Decimal,
    /// Credit lost per unit of base above the ceiling.
    pub phase_out_rate: Decimal,
}

impl PhaseOutCredit {
    /// Checks the thresholds are ordered and the values in range.
    ///
    /// A ramp that has not reached zero by `phase_out_end` is allowed; the
    /// credit drops to zero there. See [`PhaseOutCredit::remaining_at_end`].
    ///
    /// # Errors
    ///
    /// Returns the first problem found as a [`PhaseOutCreditError`].
    pub fn validate(&self) -> Result<(), PhaseOutCreditError> {
        if [self.floor, self.full_credit_ceiling, self.phase_out_end, self.amount]
            .iter()
            .any(|value| *value < Decimal::ZERO)
        {
            return Err(PhaseOutCreditError::NegativeValue);
        }
        if self.floor > self.full_credit_ceiling {
            return Err(PhaseOutCreditError::FloorAboveCeiling {
                floor: self.floor,
                ceiling: self.full_credit_ceiling,
            });
        }
        if self.full_credit_ceiling > self.phase_out_end {
            return Err(PhaseOutCreditError::CeilingAboveEnd {
                ceiling: self.full_credit_ceiling,
                end: self.phase_out_end,
            });
        }
        if self.phase_out_rate < Decimal::ZERO || self.phase_out_rate > Decimal::ONE {
            return Err(PhaseOutCreditError::InvalidRate(self.phase_out_rate));
        }

        Ok(())
    }

    /// Credit the ramp would still give at `phase_out_end`, which is cut to
    /// zero there. Zero when the ramp reaches zero first.
    pub fn remaining_at_end(&self) -> Decimal {
        non_negative(
            self.amount - (self.phase_out_end - self.full_credit_ceiling) * self.phase_out_rate,
        )
    }

    /// Credit earned at `base`.
    ///
    /// # Panics
    ///
    /// Panics if the configuration fails [`PhaseOutCredit::validate`].
    pub fn credit_for(
        &self,
        base: Decimal,
    ) -> Decimal {
        apply_phase_out_credit(
            base,
            self.floor,
            self.full_credit_ceiling,
            self.phase_out_end,
            self.amount,
            self.phase_out_rate,
        )
    }
}

/// Computes a plateau-then-ramp credit.
///
/// ```
/// use rust_decimal_macros::dec;
/// use tax_core::calculations::apply_phase_out_credit;
///
/// // NZ IETC 2024: 520 from 24,000 to 44,000, losing 13c per dollar after.
/// let credit = apply_phase_out_credit(
///     dec!(46000),
///     dec!(24000),
///     dec!(44000),
///     dec!(48000),
///     dec!(520),
///     dec!(0.13),
/// );
/// assert_eq!(credit, dec!(260));
/// ```
///
/// # Panics
///
/// Panics on a misconfigured credit (see [`PhaseOutCredit::validate`]) or a
/// negative base.
pub fn apply_phase_out_credit(
    base: Decimal,
    floor: Decimal,
    full_credit_ceiling: Decimal,
    phase_out_end: Decimal,
    full_credit_amount: Decimal,
    phase_out_rate: Decimal,
) -> Decimal {
    let config = PhaseOutCredit {
        floor,
        full_credit_ceiling,
        phase_out_end,
        amount: full_credit_amount,
        phase_out_rate,
    };
    if let Err(err) = config.validate() {
        panic!("misconfigured phase-out credit: {err}");
    }
    assert!(base >= Decimal::ZERO, "credit base must be non-negative, got {base}");

    if base < floor || base >= phase_out_end {
        Decimal::ZERO
    } else if base <= full_credit_ceiling {
        full_credit_amount
    } else {
        non_negative(full_credit_amount - (base - full_credit_ceiling) * phase_out_rate)
    }
}
