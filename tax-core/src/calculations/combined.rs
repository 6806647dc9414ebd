//! Several jurisdictions assessed together on one income.
//!
//! The primary request runs the normal [`assess`] pipeline. Each layer
//! (a state on top of a federal assessment, say) is then assessed on the
//! same gross with the primary's deduction, so every layer walks its
//! brackets over the same taxable amount. Toggles and contribution
//! overrides apply to the primary only.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Jurisdiction;
use crate::calculations::assessment::{
    Assessment, AssessmentError, AssessmentRequest, Deduction, PayFrequency, PeriodBreakdown,
    assess,
};
use crate::calculations::common::round_half_up;
use crate::registry::ScheduleRegistry;

/// Result of [`assess_combined`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedAssessment {
    pub primary: Assessment,
    pub layers: Vec<Assessment>,
    /// Sum of every part's total tax.
    pub total_tax: Decimal,
    pub contributions: Decimal,
    pub net: Decimal,
    pub effective_rate: Decimal,
}

impl CombinedAssessment {
    /// The primary assessment followed by each layer.
    pub fn parts(&self) -> impl Iterator<Item = &Assessment> {
        std::iter::once(&self.primary).chain(self.layers.iter())
    }

    /// Splits the combined annual figures evenly across pay periods.
    pub fn per_period(
        &self,
        frequency: PayFrequency,
    ) -> PeriodBreakdown {
        let periods = Decimal::from(frequency.periods_per_year());
        PeriodBreakdown {
            frequency,
            gross: round_half_up(self.primary.gross / periods),
            total_tax: round_half_up(self.total_tax / periods),
            contributions: round_half_up(self.contributions / periods),
            net: round_half_up(self.net / periods),
        }
    }
}

/// Assesses `request`, then each of `layers` on the primary's taxable
/// amount, and totals the parts.
///
/// # Errors
///
/// Returns the first [`AssessmentError`] from any part, or
/// [`AssessmentError::RepeatedLayer`] when a jurisdiction appears twice.
pub fn assess_combined(
    registry: &ScheduleRegistry,
    request: &AssessmentRequest,
    layers: &[Jurisdiction],
) -> Result<CombinedAssessment, AssessmentError> {
    for (index, layer) in layers.iter().enumerate() {
        if *layer == request.jurisdiction || layers[..index].contains(layer) {
            return Err(AssessmentError::RepeatedLayer(layer.clone()));
        }
    }

    let primary = assess(registry, request)?;

    let layers = layers
        .iter()
        .map(|jurisdiction| {
            let layer_request = AssessmentRequest {
                jurisdiction: jurisdiction.clone(),
                deduction: Deduction::Amount(primary.deduction),
                toggles: Default::default(),
                contribution_rates: Default::default(),
                ..request.clone()
            };
            assess(registry, &layer_request)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut combined = CombinedAssessment {
        total_tax: Decimal::ZERO,
        contributions: Decimal::ZERO,
        net: Decimal::ZERO,
        effective_rate: Decimal::ZERO,
        primary,
        layers,
    };
    combined.total_tax = combined.parts().map(|part| part.total_tax).sum();
    combined.contributions = combined.parts().map(|part| part.contributions).sum();

    let gross = request.gross;
    combined.net = round_half_up(gross - combined.total_tax - combined.contributions);
    if !gross.is_zero() {
        combined.effective_rate = combined.total_tax / gross;
    }

    debug!(
        jurisdiction = %request.jurisdiction,
        layers = combined.layers.len(),
        total_tax = %combined.total_tax,
        net = %combined.net,
        "combined assessment complete"
    );

    Ok(combined)
}
