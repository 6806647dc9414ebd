//! End-to-end assessment: year resolution, deductions, table selection,
//! bracket tax, modifiers and net amount.
//!
//! # Pipeline
//!
//! | Step | Description |
//! |------|-------------|
//! | 1 | Resolve the tax year under the request's [`FallbackPolicy`] |
//! | 2 | Apply category limits (e.g. first-time-buyer relief cap) |
//! | 3 | Taxable = gross - deduction, minimum 0 |
//! | 4 | Select the bracket table (part-year proration included) |
//! | 5 | Bracket tax on the taxable amount |
//! | 6 | Enabled modifiers, in schedule order |
//! | 7 | Total tax = bracket tax + charges - credits, minimum 0 |
//! | 8 | Net = gross - total tax - contributions |
//!
//! Monetary outputs are rounded half-up to cents; the per-bracket
//! breakdown keeps full precision.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use tax_core::calculations::{AssessmentRequest, assess};
//! use tax_core::{Bracket, BracketTable, ResidencyClass, ScheduleRegistry, TableKey, YearSchedule};
//!
//! let mut schedule = YearSchedule::new("XX".parse().unwrap(), "2026".parse().unwrap());
//! schedule
//!     .insert_table(
//!         TableKey::new("any".parse().unwrap(), ResidencyClass::Any),
//!         BracketTable::new(vec![
//!             Bracket::bounded(dec!(10000), dec!(0.10)),
//!             Bracket::unbounded(dec!(0.20)),
//!         ]),
//!     )
//!     .unwrap();
//! let mut registry = ScheduleRegistry::new();
//! registry.insert(schedule).unwrap();
//!
//! let request = AssessmentRequest::new(
//!     "XX".parse().unwrap(),
//!     "2026".parse().unwrap(),
//!     "single".parse().unwrap(),
//!     dec!(15000),
//! );
//! let assessment = assess(&registry, &request).unwrap();
//!
//! assert_eq!(assessment.total_tax, dec!(2000.00));
//! assert_eq!(assessment.net, dec!(13000.00));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::calculations::common::{non_negative, round_half_up};
use crate::calculations::modifiers::{
    AppliedModifier, ModifierContext, ModifierEffect, ModifierKind,
};
use crate::calculations::progressive::compute_bracket_tax;
use crate::registry::{FallbackPolicy, ScheduleRegistry, SelectionError, YearResolution};
use crate::{CalculationResult, FilerCategory, Jurisdiction, Residency, TaxYear};

/// Errors that can occur while assessing a request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssessmentError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("{field} must be non-negative, got {value}")]
    NegativeAmount { field: &'static str, value: Decimal },

    #[error("number of earners must be at least 1")]
    NoEarners,

    #[error("{jurisdiction} {tax_year} has no standard deduction for category '{category}'")]
    StandardDeductionNotConfigured {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
        category: FilerCategory,
    },

    #[error("{jurisdiction} {tax_year} has no modifier named '{name}'")]
    UnknownModifier {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
        name: String,
    },

    #[error("modifier '{0}' is not a contribution; its rate cannot be overridden")]
    NotAContribution(String),

    #[error("contribution rate for '{name}' must be between 0 and 1, got {rate}")]
    InvalidContributionRate { name: String, rate: Decimal },

    #[error("{0} is assessed more than once")]
    RepeatedLayer(Jurisdiction),
}

/// Amount subtracted from gross before the bracket walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deduction {
    #[default]
    None,
    /// The schedule's standard deduction for the filer category.
    Standard,
    Amount(Decimal),
}

/// How often pay is received, for per-period breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayFrequency {
    #[default]
    Annual,
    Monthly,
    Fortnightly,
    Weekly,
}

impl PayFrequency {
    pub fn periods_per_year(&self) -> u32 {
        match self {
            Self::Annual => 1,
            Self::Monthly => 12,
            Self::Fortnightly => 26,
            Self::Weekly => 52,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Monthly => "monthly",
            Self::Fortnightly => "fortnightly",
            Self::Weekly => "weekly",
        }
    }
}

impl FromStr for PayFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annual" | "annually" | "yearly" => Ok(Self::Annual),
            "monthly" => Ok(Self::Monthly),
            "fortnightly" | "biweekly" => Ok(Self::Fortnightly),
            "weekly" => Ok(Self::Weekly),
            other => Err(format!(
                "unknown pay frequency '{other}' (expected annual, monthly, fortnightly or weekly)"
            )),
        }
    }
}

impl fmt::Display for PayFrequency {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to assess one person for one year.
///
/// Built once by the caller and never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub jurisdiction: Jurisdiction,
    pub tax_year: TaxYear,
    pub category: FilerCategory,
    pub residency: Residency,
    pub gross: Decimal,
    pub deduction: Deduction,
    /// Earners sharing the gross amount, for per-earner levy caps.
    pub earners: u32,
    /// Explicit on/off switches by modifier name.
    pub toggles: BTreeMap<String, bool>,
    /// Contribution rate overrides by modifier name.
    pub contribution_rates: BTreeMap<String, Decimal>,
    pub fallback: FallbackPolicy,
}

impl AssessmentRequest {
    pub fn new(
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
        category: FilerCategory,
        gross: Decimal,
    ) -> Self {
        Self {
            jurisdiction,
            tax_year,
            category,
            residency: Residency::default(),
            gross,
            deduction: Deduction::None,
            earners: 1,
            toggles: BTreeMap::new(),
            contribution_rates: BTreeMap::new(),
            fallback: FallbackPolicy::Strict,
        }
    }

    pub fn with_residency(
        mut self,
        residency: Residency,
    ) -> Self {
        self.residency = residency;
        self
    }

    pub fn with_deduction(
        mut self,
        deduction: Deduction,
    ) -> Self {
        self.deduction = deduction;
        self
    }

    pub fn with_earners(
        mut self,
        earners: u32,
    ) -> Self {
        self.earners = earners;
        self
    }

    pub fn with_toggle(
        mut self,
        name: impl Into<String>,
        enabled: bool,
    ) -> Self {
        self.toggles.insert(name.into(), enabled);
        self
    }

    pub fn with_contribution_rate(
        mut self,
        name: impl Into<String>,
        rate: Decimal,
    ) -> Self {
        self.contribution_rates.insert(name.into(), rate);
        self
    }

    pub fn with_fallback(
        mut self,
        fallback: FallbackPolicy,
    ) -> Self {
        self.fallback = fallback;
        self
    }
}

/// Gross, tax and net figures for one pay period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodBreakdown {
    pub frequency: PayFrequency,
    pub gross: Decimal,
    pub total_tax: Decimal,
    pub contributions: Decimal,
    pub net: Decimal,
}

/// Result of [`assess`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub jurisdiction: Jurisdiction,
    pub year: YearResolution,
    pub requested_category: FilerCategory,
    /// Category whose table was used, after category limits.
    pub applied_category: FilerCategory,
    pub residency: Residency,
    pub gross: Decimal,
    pub deduction: Decimal,
    pub taxable: Decimal,
    /// Unrounded bracket walk.
    pub bracket: CalculationResult,
    pub bracket_tax: Decimal,
    pub modifiers: Vec<AppliedModifier>,
    pub total_charges: Decimal,
    pub total_credits: Decimal,
    pub total_tax: Decimal,
    pub contributions: Decimal,
    pub net: Decimal,
    /// `total_tax / gross`, unrounded; zero for a zero gross.
    pub effective_rate: Decimal,
    pub marginal_rate: Decimal,
}

impl Assessment {
    /// Splits the annual figures evenly across pay periods.
    pub fn per_period(
        &self,
        frequency: PayFrequency,
    ) -> PeriodBreakdown {
        let periods = Decimal::from(frequency.periods_per_year());
        PeriodBreakdown {
            frequency,
            gross: round_half_up(self.gross / periods),
            total_tax: round_half_up(self.total_tax / periods),
            contributions: round_half_up(self.contributions / periods),
            net: round_half_up(self.net / periods),
        }
    }
}

/// Runs the full assessment pipeline for `request`.
///
/// # Errors
///
/// Returns [`AssessmentError`] for invalid request values, unknown modifier
/// names, unconfigured deductions, or any table-selection failure.
pub fn assess(
    registry: &ScheduleRegistry,
    request: &AssessmentRequest,
) -> Result<Assessment, AssessmentError> {
    validate_request(request)?;

    let year = registry.resolve_year(&request.jurisdiction, &request.tax_year, request.fallback)?;
    let schedule = registry.schedule(&request.jurisdiction, &year.resolved)?;

    for name in request.toggles.keys() {
        if schedule.modifier(name).is_none() {
            return Err(AssessmentError::UnknownModifier {
                jurisdiction: request.jurisdiction.clone(),
                tax_year: year.resolved.clone(),
                name: name.clone(),
            });
        }
    }
    for (name, rate) in &request.contribution_rates {
        match schedule.modifier(name) {
            None => {
                return Err(AssessmentError::UnknownModifier {
                    jurisdiction: request.jurisdiction.clone(),
                    tax_year: year.resolved.clone(),
                    name: name.clone(),
                });
            }
            Some(rule) if !matches!(rule.kind, ModifierKind::Contribution { .. }) => {
                return Err(AssessmentError::NotAContribution(name.clone()));
            }
            Some(_) if *rate < Decimal::ZERO || *rate > Decimal::ONE => {
                return Err(AssessmentError::InvalidContributionRate {
                    name: name.clone(),
                    rate: *rate,
                });
            }
            Some(_) => {}
        }
    }

    let applied_category = schedule
        .effective_category(&request.category, request.gross)
        .clone();

    let deduction = match request.deduction {
        Deduction::None => Decimal::ZERO,
        Deduction::Amount(amount) => amount,
        Deduction::Standard => schedule
            .standard_deductions
            .get(&applied_category)
            .copied()
            .ok_or_else(|| AssessmentError::StandardDeductionNotConfigured {
                jurisdiction: request.jurisdiction.clone(),
                tax_year: year.resolved.clone(),
                category: applied_category.clone(),
            })?,
    };
    let taxable = non_negative(request.gross - deduction);

    let table = registry.select_bracket_table(
        &request.jurisdiction,
        &year.resolved,
        &applied_category,
        request.residency,
    )?;
    let bracket = compute_bracket_tax(taxable, &table);
    let bracket_tax = round_half_up(bracket.tax_due);

    let mut modifiers = Vec::new();
    for rule in &schedule.modifiers {
        if !rule.is_enabled(request.toggles.get(&rule.name).copied()) {
            continue;
        }
        let ctx = ModifierContext {
            gross: request.gross,
            taxable,
            category: &applied_category,
            residency: request.residency,
            earners: request.earners,
            contribution_rate: request.contribution_rates.get(&rule.name).copied(),
        };
        if let Some(mut applied) = rule.apply(&ctx) {
            applied.amount = round_half_up(applied.amount);
            modifiers.push(applied);
        }
    }

    let sum_of = |effect: ModifierEffect| -> Decimal {
        modifiers
            .iter()
            .filter(|m| m.effect == effect)
            .map(|m| m.amount)
            .sum()
    };
    let total_charges = sum_of(ModifierEffect::Charge);
    let total_credits = sum_of(ModifierEffect::Credit);
    let contributions = sum_of(ModifierEffect::Contribution);

    let total_tax = non_negative(bracket_tax + total_charges - total_credits);
    let net = request.gross - total_tax - contributions;
    let effective_rate = if request.gross.is_zero() {
        Decimal::ZERO
    } else {
        total_tax / request.gross
    };

    debug!(
        jurisdiction = %request.jurisdiction,
        tax_year = %year.resolved,
        category = %applied_category,
        gross = %request.gross,
        %taxable,
        %total_tax,
        %net,
        "assessment complete"
    );

    Ok(Assessment {
        jurisdiction: request.jurisdiction.clone(),
        year,
        requested_category: request.category.clone(),
        applied_category,
        residency: request.residency,
        gross: round_half_up(request.gross),
        deduction: round_half_up(deduction),
        taxable: round_half_up(taxable),
        marginal_rate: bracket.marginal_rate,
        bracket,
        bracket_tax,
        modifiers,
        total_charges,
        total_credits,
        total_tax,
        contributions,
        net: round_half_up(net),
        effective_rate,
    })
}

fn validate_request(request: &AssessmentRequest) -> Result<(), AssessmentError> {
    if request.gross < Decimal::ZERO {
        return Err(AssessmentError::NegativeAmount {
            field: "gross amount",
            value: request.gross,
        });
    }
    if let Deduction::Amount(amount) = request.deduction {
        if amount < Decimal::ZERO {
            return Err(AssessmentError::NegativeAmount {
                field: "deduction",
                value: amount,
            });
        }
    }
    if request.earners == 0 {
        return Err(AssessmentError::NoEarners);
    }
    Ok(())
}
