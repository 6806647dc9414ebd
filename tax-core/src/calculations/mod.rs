//! Calculations over bracket tables and year schedules.
//!
//! [`compute_bracket_tax`] is the core marginal-rate walk. The other
//! modules build on it: levies and credits, part-year proration, modifier
//! rules, and the [`assess`] pipeline that ties a request to a registry.

pub mod assessment;
pub mod combined;
pub mod common;
pub mod credit;
pub mod levy;
pub mod modifiers;
pub mod progressive;
pub mod proration;

pub use assessment::{
    Assessment, AssessmentError, AssessmentRequest, Deduction, PayFrequency, PeriodBreakdown,
    assess,
};
pub use combined::{CombinedAssessment, assess_combined};
pub use credit::{PhaseOutCredit, PhaseOutCreditError, apply_phase_out_credit};
pub use levy::{apply_capped_levy, apply_uncapped_levy};
pub use modifiers::{
    AppliedModifier, LevyBase, ModifierContext, ModifierEffect, ModifierError, ModifierKind,
    ModifierRule, RateSlab,
};
pub use progressive::compute_bracket_tax;
pub use proration::ThresholdProration;
