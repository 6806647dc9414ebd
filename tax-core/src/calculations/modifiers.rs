//! Levies, surtaxes, credits, surcharges and contributions that adjust a
//! bracket result.
//!
//! A modifier is plain data: a [`ModifierRule`] names a [`ModifierKind`]
//! and the conditions under which it applies. Rules are evaluated in the
//! order a schedule declares them.
//!
//! | Kind | Effect | Example |
//! |------|--------|---------|
//! | `capped_levy` | charge | Medicare levy, ACC earners' levy, Social Security |
//! | `threshold_surtax` | charge | US Additional Medicare tax, UK personal allowance taper |
//! | `phase_out_credit` | credit | NZ independent earner tax credit |
//! | `surcharge` | charge | UK SDLT additional-property surcharge, US county transfer tax |
//! | `slab_rate` | charge | New York mansion tax |
//! | `contribution` | contribution | KiwiSaver |

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calculations::common::non_negative;
use crate::calculations::credit::{PhaseOutCredit, PhaseOutCreditError};
use crate::calculations::levy::apply_capped_levy;
use crate::{FilerCategory, Residency};

/// Reasons a modifier rule is rejected at load time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModifierError {
    #[error("modifier name must not be empty")]
    EmptyName,

    #[error("modifier '{name}' rate must be between 0 and 1, got {rate}")]
    InvalidRate { name: String, rate: Decimal },

    #[error("modifier '{name}' has a negative amount {value}")]
    NegativeAmount { name: String, value: Decimal },

    #[error("modifier '{name}' has no slabs")]
    NoSlabs { name: String },

    #[error("modifier '{name}' slabs must start at strictly increasing amounts")]
    SlabsOutOfOrder { name: String },

    #[error("modifier '{name}' credit is misconfigured: {source}")]
    Credit {
        name: String,
        #[source]
        source: PhaseOutCreditError,
    },
}

/// One step of a [`ModifierKind::SlabRate`] schedule: `rate` applies to the
/// whole base once it reaches `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSlab {
    pub from: Decimal,
    pub rate: Decimal,
}

/// Amount a levy or surtax is charged on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevyBase {
    /// Gross amount before deductions.
    #[default]
    Gross,
    /// Amount after deductions.
    Taxable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ModifierKind {
    /// `min(base, cap) * rate`; `cap = None` is uncapped.
    ///
    /// With `per_earner`, the base is split evenly across earners and each
    /// share is capped separately.
    CappedLevy {
        rate: Decimal,
        #[serde(default)]
        cap: Option<Decimal>,
        #[serde(default)]
        base: LevyBase,
        #[serde(default)]
        per_earner: bool,
    },
    /// `min(max(0, base - threshold), max_excess) * rate`, where the
    /// threshold may be overridden per filer category.
    ///
    /// A capped excess models allowance tapers: the UK personal allowance
    /// is withdrawn at half the income above 100,000 until it is gone.
    ThresholdSurtax {
        rate: Decimal,
        threshold: Decimal,
        #[serde(default)]
        max_excess: Option<Decimal>,
        #[serde(default)]
        base: LevyBase,
        #[serde(default)]
        category_thresholds: BTreeMap<FilerCategory, Decimal>,
    },
    /// Credit against tax, evaluated on the taxable amount.
    PhaseOutCredit(PhaseOutCredit),
    /// Flat percentage of the gross amount.
    Surcharge { rate: Decimal },
    /// `base * rate` of the highest slab the base reaches; zero below the
    /// first slab.
    ///
    /// Unlike a bracket walk, the whole base is charged at one rate.
    SlabRate {
        slabs: Vec<RateSlab>,
        #[serde(default)]
        base: LevyBase,
    },
    /// Deducted from net pay but not counted as tax.
    Contribution { rate: Decimal },
}

/// How an applied modifier moves the totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierEffect {
    /// Adds to tax.
    Charge,
    /// Reduces tax, never below zero.
    Credit,
    /// Reduces net pay only.
    Contribution,
}

impl ModifierKind {
    pub fn effect(&self) -> ModifierEffect {
        match self {
            Self::CappedLevy { .. }
            | Self::ThresholdSurtax { .. }
            | Self::Surcharge { .. }
            | Self::SlabRate { .. } => ModifierEffect::Charge,
            Self::PhaseOutCredit(_) => ModifierEffect::Credit,
            Self::Contribution { .. } => ModifierEffect::Contribution,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// A named modifier together with its applicability flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierRule {
    pub name: String,
    /// Whether the rule applies when the request does not toggle it.
    #[serde(default = "default_enabled")]
    pub enabled_by_default: bool,
    /// Skip for non-residents.
    #[serde(default)]
    pub residents_only: bool,
    /// Scale by the share of the year a part-year resident was present.
    #[serde(default)]
    pub prorate_part_year: bool,
    #[serde(flatten)]
    pub kind: ModifierKind,
}

/// The figures a modifier is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct ModifierContext<'a> {
    pub gross: Decimal,
    pub taxable: Decimal,
    pub category: &'a FilerCategory,
    pub residency: Residency,
    /// Number of earners sharing the gross amount; at least 1.
    pub earners: u32,
    /// Replaces a contribution rule's configured rate.
    pub contribution_rate: Option<Decimal>,
}

impl ModifierContext<'_> {
    fn base(
        &self,
        base: LevyBase,
    ) -> Decimal {
        match base {
            LevyBase::Gross => self.gross,
            LevyBase::Taxable => self.taxable,
        }
    }
}

/// One modifier's contribution to an assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedModifier {
    pub name: String,
    pub effect: ModifierEffect,
    pub amount: Decimal,
}

impl ModifierRule {
    /// Checks rates, amounts and credit shape.
    ///
    /// # Errors
    ///
    /// Returns the first problem found as a [`ModifierError`].
    pub fn validate(&self) -> Result<(), ModifierError> {
        if self.name.trim().is_empty() {
            return Err(ModifierError::EmptyName);
        }

        let check_rate = |rate: Decimal| {
            if (Decimal::ZERO..=Decimal::ONE).contains(&rate) {
                Ok(())
            } else {
                Err(ModifierError::InvalidRate {
                    name: self.name.clone(),
                    rate,
                })
            }
        };
        let check_amount = |value: Decimal| {
            if value >= Decimal::ZERO {
                Ok(())
            } else {
                Err(ModifierError::NegativeAmount {
                    name: self.name.clone(),
                    value,
                })
            }
        };

        match &self.kind {
            ModifierKind::CappedLevy { rate, cap, .. } => {
                check_rate(*rate)?;
                if let Some(cap) = cap {
                    check_amount(*cap)?;
                }
            }
            ModifierKind::ThresholdSurtax {
                rate,
                threshold,
                max_excess,
                category_thresholds,
                ..
            } => {
                check_rate(*rate)?;
                check_amount(*threshold)?;
                if let Some(max_excess) = max_excess {
                    check_amount(*max_excess)?;
                }
                for value in category_thresholds.values() {
                    check_amount(*value)?;
                }
            }
            ModifierKind::PhaseOutCredit(credit) => {
                credit.validate().map_err(|source| ModifierError::Credit {
                    name: self.name.clone(),
                    source,
                })?;
            }
            ModifierKind::Surcharge { rate } | ModifierKind::Contribution { rate } => {
                check_rate(*rate)?;
            }
            ModifierKind::SlabRate { slabs, .. } => {
                if slabs.is_empty() {
                    return Err(ModifierError::NoSlabs {
                        name: self.name.clone(),
                    });
                }
                for slab in slabs {
                    check_amount(slab.from)?;
                    check_rate(slab.rate)?;
                }
                if slabs.windows(2).any(|pair| pair[0].from >= pair[1].from) {
                    return Err(ModifierError::SlabsOutOfOrder {
                        name: self.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Whether the rule runs, given an optional request toggle.
    pub fn is_enabled(
        &self,
        toggle: Option<bool>,
    ) -> bool {
        toggle.unwrap_or(self.enabled_by_default)
    }

    /// Evaluates the rule, or returns `None` when it does not apply to the
    /// person's residency.
    ///
    /// Amounts are unrounded.
    ///
    /// # Panics
    ///
    /// Panics if the rule fails [`ModifierRule::validate`] or the context
    /// has zero earners.
    pub fn apply(
        &self,
        ctx: &ModifierContext<'_>,
    ) -> Option<AppliedModifier> {
        if self.residents_only && !ctx.residency.is_resident() {
            return None;
        }
        assert!(ctx.earners >= 1, "at least one earner is required");

        let mut amount = match &self.kind {
            ModifierKind::CappedLevy {
                rate,
                cap,
                base,
                per_earner,
            } => {
                let base = ctx.base(*base);
                if *per_earner && ctx.earners > 1 {
                    let earners = Decimal::from(ctx.earners);
                    let share = base / earners;
                    apply_capped_levy(share, *rate, cap.unwrap_or(share)) * earners
                } else {
                    apply_capped_levy(base, *rate, cap.unwrap_or(base))
                }
            }
            ModifierKind::ThresholdSurtax {
                rate,
                threshold,
                max_excess,
                base,
                category_thresholds,
            } => {
                let threshold = category_thresholds
                    .get(ctx.category)
                    .copied()
                    .unwrap_or(*threshold);
                let excess = non_negative(ctx.base(*base) - threshold);
                max_excess.map_or(excess, |cap| excess.min(cap)) * *rate
            }
            ModifierKind::PhaseOutCredit(credit) => credit.credit_for(ctx.taxable),
            ModifierKind::Surcharge { rate } => ctx.gross * *rate,
            ModifierKind::SlabRate { slabs, base } => {
                let base = ctx.base(*base);
                slabs
                    .iter()
                    .rev()
                    .find(|slab| slab.from <= base)
                    .map_or(Decimal::ZERO, |slab| base * slab.rate)
            }
            ModifierKind::Contribution { rate } => ctx.gross * ctx.contribution_rate.unwrap_or(*rate),
        };

        if self.prorate_part_year {
            amount = ctx.residency.prorate(amount);
        }

        Some(AppliedModifier {
            name: self.name.clone(),
            effect: self.kind.effect(),
            amount,
        })
    }
}
