//! Reference-data registry and bracket-table selection.
//!
//! A [`ScheduleRegistry`] holds one [`YearSchedule`] per jurisdiction and
//! tax year. Each schedule carries the bracket tables for that year keyed by
//! filer category and residency, plus the year's modifiers, standard
//! deductions, category limits and part-year proration rule.
//!
//! Lookups never guess. A missing year is an error listing the years that
//! do exist; falling back to another year happens only when the caller asks
//! for it with [`FallbackPolicy::LatestAvailable`].

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::calculations::modifiers::ModifierRule;
use crate::calculations::proration::ThresholdProration;
use crate::{
    BracketTable, BracketTableError, FilerCategory, Jurisdiction, Residency, ResidencyClass,
    TaxYear,
};

/// Errors raised while building a registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("schedule for {jurisdiction} {tax_year} is defined more than once")]
    DuplicateSchedule {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
    },

    #[error("{jurisdiction} {tax_year} already has a table for {key}")]
    DuplicateTable {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
        key: TableKey,
    },
}

/// Errors raised while selecting a schedule or table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no reference data for jurisdiction {0}")]
    UnknownJurisdiction(Jurisdiction),

    #[error(
        "no schedule for {jurisdiction} tax year {requested} (available: {})",
        join_years(.available)
    )]
    YearNotFound {
        jurisdiction: Jurisdiction,
        requested: TaxYear,
        available: Vec<TaxYear>,
    },

    #[error("{jurisdiction} {tax_year} has no table for category '{category}' and residency '{residency}'")]
    TableNotFound {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
        category: FilerCategory,
        residency: ResidencyClass,
    },

    #[error("{jurisdiction} {tax_year} has no part-year proration rule")]
    ProrationNotConfigured {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
    },

    #[error("part-year proration produced an invalid table: {0}")]
    InvalidProration(#[from] BracketTableError),
}

fn join_years(years: &[TaxYear]) -> String {
    if years.is_empty() {
        return "none".to_string();
    }
    years
        .iter()
        .map(TaxYear::label)
        .collect::<Vec<_>>()
        .join(", ")
}

/// What to do when the requested tax year has no schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Fail with [`SelectionError::YearNotFound`].
    #[default]
    Strict,
    /// Use the latest year ending on or before the requested one.
    LatestAvailable,
}

/// Outcome of resolving a requested tax year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearResolution {
    pub requested: TaxYear,
    pub resolved: TaxYear,
    pub fell_back: bool,
}

/// Key of a bracket table within a year schedule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableKey {
    pub category: FilerCategory,
    pub residency: ResidencyClass,
}

impl TableKey {
    pub fn new(
        category: FilerCategory,
        residency: ResidencyClass,
    ) -> Self {
        Self { category, residency }
    }
}

impl fmt::Display for TableKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.residency)
    }
}

/// Restricts a category to amounts up to `max_amount`; above it the
/// `otherwise` category applies.
///
/// UK first-time-buyer relief is lost entirely on purchases over 500,000.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLimit {
    pub category: FilerCategory,
    pub max_amount: Decimal,
    pub otherwise: FilerCategory,
}

/// Everything configured for one jurisdiction and tax year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearSchedule {
    jurisdiction: Jurisdiction,
    tax_year: TaxYear,
    tables: BTreeMap<TableKey, BracketTable>,
    pub proration: Option<ThresholdProration>,
    pub standard_deductions: BTreeMap<FilerCategory, Decimal>,
    pub category_limits: Vec<CategoryLimit>,
    /// Evaluated in order.
    pub modifiers: Vec<ModifierRule>,
}

impl YearSchedule {
    pub fn new(
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
    ) -> Self {
        Self {
            jurisdiction,
            tax_year,
            tables: BTreeMap::new(),
            proration: None,
            standard_deductions: BTreeMap::new(),
            category_limits: Vec::new(),
            modifiers: Vec::new(),
        }
    }

    pub fn jurisdiction(&self) -> &Jurisdiction {
        &self.jurisdiction
    }

    pub fn tax_year(&self) -> &TaxYear {
        &self.tax_year
    }

    /// Adds a table.
    ///
    /// # Errors
    ///
    /// Rejects a second table under the same key.
    pub fn insert_table(
        &mut self,
        key: TableKey,
        table: BracketTable,
    ) -> Result<(), RegistryError> {
        if self.tables.contains_key(&key) {
            return Err(RegistryError::DuplicateTable {
                jurisdiction: self.jurisdiction.clone(),
                tax_year: self.tax_year.clone(),
                key,
            });
        }
        self.tables.insert(key, table);
        Ok(())
    }

    pub fn tables(&self) -> impl Iterator<Item = (&TableKey, &BracketTable)> {
        self.tables.iter()
    }

    pub fn table(
        &self,
        key: &TableKey,
    ) -> Option<&BracketTable> {
        self.tables.get(key)
    }

    pub fn modifier(
        &self,
        name: &str,
    ) -> Option<&ModifierRule> {
        self.modifiers.iter().find(|rule| rule.name == name)
    }

    /// Finds the table for a category and residency class.
    ///
    /// Tables stored under the `any` category or the `Any` residency class
    /// serve every category or class; an exact match wins over a wildcard.
    pub fn find_table(
        &self,
        category: &FilerCategory,
        residency: ResidencyClass,
    ) -> Option<&BracketTable> {
        let any = FilerCategory::any();
        [
            (category, residency),
            (category, ResidencyClass::Any),
            (&any, residency),
            (&any, ResidencyClass::Any),
        ]
        .into_iter()
        .find_map(|(category, residency)| self.tables.get(&TableKey::new(category.clone(), residency)))
    }

    /// Category that actually applies to `amount`, after category limits.
    pub fn effective_category<'a>(
        &'a self,
        category: &'a FilerCategory,
        amount: Decimal,
    ) -> &'a FilerCategory {
        match self
            .category_limits
            .iter()
            .find(|limit| &limit.category == category && amount > limit.max_amount)
        {
            Some(limit) => {
                warn!(
                    jurisdiction = %self.jurisdiction,
                    tax_year = %self.tax_year,
                    requested = %category,
                    applied = %limit.otherwise,
                    max_amount = %limit.max_amount,
                    %amount,
                    "amount exceeds category limit, using fallback category"
                );
                &limit.otherwise
            }
            None => category,
        }
    }
}

/// All loaded year schedules, keyed by jurisdiction and tax year.
///
/// Immutable once built; share it freely across threads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleRegistry {
    schedules: BTreeMap<Jurisdiction, BTreeMap<TaxYear, YearSchedule>>,
}

impl ScheduleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a year schedule.
    ///
    /// # Errors
    ///
    /// Rejects a second schedule for the same jurisdiction and year.
    pub fn insert(
        &mut self,
        schedule: YearSchedule,
    ) -> Result<(), RegistryError> {
        let years = self.schedules.entry(schedule.jurisdiction.clone()).or_default();
        if years.contains_key(&schedule.tax_year) {
            return Err(RegistryError::DuplicateSchedule {
                jurisdiction: schedule.jurisdiction,
                tax_year: schedule.tax_year,
            });
        }
        years.insert(schedule.tax_year.clone(), schedule);
        Ok(())
    }

    pub fn jurisdictions(&self) -> impl Iterator<Item = &Jurisdiction> {
        self.schedules.keys()
    }

    /// Available years for a jurisdiction, oldest first.
    pub fn years(
        &self,
        jurisdiction: &Jurisdiction,
    ) -> Vec<TaxYear> {
        self.schedules
            .get(jurisdiction)
            .map(|years| years.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn schedules(&self) -> impl Iterator<Item = &YearSchedule> {
        self.schedules.values().flat_map(BTreeMap::values)
    }

    /// Looks up the schedule for an exact year.
    ///
    /// # Errors
    ///
    /// [`SelectionError::UnknownJurisdiction`] or
    /// [`SelectionError::YearNotFound`].
    pub fn schedule(
        &self,
        jurisdiction: &Jurisdiction,
        tax_year: &TaxYear,
    ) -> Result<&YearSchedule, SelectionError> {
        let years = self
            .schedules
            .get(jurisdiction)
            .ok_or_else(|| SelectionError::UnknownJurisdiction(jurisdiction.clone()))?;

        years.get(tax_year).ok_or_else(|| SelectionError::YearNotFound {
            jurisdiction: jurisdiction.clone(),
            requested: tax_year.clone(),
            available: years.keys().cloned().collect(),
        })
    }

    /// Resolves the year a calculation should use.
    ///
    /// # Errors
    ///
    /// Under [`FallbackPolicy::Strict`] a missing year is
    /// [`SelectionError::YearNotFound`]. Under
    /// [`FallbackPolicy::LatestAvailable`] the same error is returned only
    /// when no year ends on or before the requested one.
    pub fn resolve_year(
        &self,
        jurisdiction: &Jurisdiction,
        tax_year: &TaxYear,
        policy: FallbackPolicy,
    ) -> Result<YearResolution, SelectionError> {
        let available = match self.schedule(jurisdiction, tax_year) {
            Ok(_) => {
                return Ok(YearResolution {
                    requested: tax_year.clone(),
                    resolved: tax_year.clone(),
                    fell_back: false,
                });
            }
            Err(SelectionError::YearNotFound { available, .. })
                if policy == FallbackPolicy::LatestAvailable =>
            {
                available
            }
            Err(err) => return Err(err),
        };

        let Some(resolved) = available
            .iter()
            .filter(|year| year.end_year() <= tax_year.end_year())
            .max()
            .cloned()
        else {
            return Err(SelectionError::YearNotFound {
                jurisdiction: jurisdiction.clone(),
                requested: tax_year.clone(),
                available,
            });
        };

        warn!(
            %jurisdiction,
            requested = %tax_year,
            resolved = %resolved,
            "tax year not available, falling back to latest earlier year"
        );

        Ok(YearResolution {
            requested: tax_year.clone(),
            resolved,
            fell_back: true,
        })
    }

    /// Selects the bracket table for a person.
    ///
    /// Part-year residents get the resident table with its lowest bracket
    /// pro-rated by the year's proration rule.
    ///
    /// # Errors
    ///
    /// See [`SelectionError`]; nothing is defaulted silently.
    pub fn select_bracket_table(
        &self,
        jurisdiction: &Jurisdiction,
        tax_year: &TaxYear,
        category: &FilerCategory,
        residency: Residency,
    ) -> Result<BracketTable, SelectionError> {
        let schedule = self.schedule(jurisdiction, tax_year)?;
        let class = residency.class();

        let table = schedule
            .find_table(category, class)
            .ok_or_else(|| SelectionError::TableNotFound {
                jurisdiction: jurisdiction.clone(),
                tax_year: tax_year.clone(),
                category: category.clone(),
                residency: class,
            })?;

        debug!(%jurisdiction, %tax_year, %category, residency = %class, brackets = table.len(), "selected bracket table");

        match residency {
            Residency::PartYear { months_present } => {
                let rule = schedule
                    .proration
                    .ok_or_else(|| SelectionError::ProrationNotConfigured {
                        jurisdiction: jurisdiction.clone(),
                        tax_year: tax_year.clone(),
                    })?;
                Ok(rule.apply(table, months_present)?)
            }
            Residency::Resident | Residency::NonResident => Ok(table.clone()),
        }
    }
}
