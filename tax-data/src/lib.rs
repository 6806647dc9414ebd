//! Reference data for the tax engine.
//!
//! Bracket rows are read from CSV ([`loader`]) and everything else a tax
//! year needs from TOML ([`config`]). [`load_registry`] joins the two into
//! an immutable [`ScheduleRegistry`]. The data shipped with the crate is
//! available through [`bundled_registry`].
//!
//! Loading is all-or-nothing: any malformed table, duplicate schedule or
//! invalid modifier fails the whole load.

pub mod config;
pub mod loader;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use tax_core::calculations::{ModifierError, ModifierKind};
use tax_core::{Jurisdiction, RegistryError, ScheduleRegistry, TableKey, TaxYear, YearSchedule};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use config::{DerivedTable, ScheduleEntry, SchedulesFile};
pub use loader::{BracketLoader, BracketLoaderError, BracketRecord, TableGroup};

/// Bracket rows shipped with the crate.
pub const BUNDLED_BRACKETS: &str = include_str!("../data/brackets.csv");

/// Schedule configuration shipped with the crate.
pub const BUNDLED_SCHEDULES: &str = include_str!("../data/schedules.toml");

/// File names looked up by [`load_registry_from_dir`].
pub const BRACKETS_FILE: &str = "brackets.csv";
pub const SCHEDULES_FILE: &str = "schedules.toml";

#[derive(Debug, Error)]
pub enum TaxDataError {
    #[error(transparent)]
    Brackets(#[from] BracketLoaderError),

    #[error("Schedule configuration error: {0}")]
    Schedules(#[from] toml::de::Error),

    #[error("Schedule entry for {0} names no tax year")]
    NoYear(Jurisdiction),

    #[error("Schedule for {jurisdiction} {tax_year} is configured more than once")]
    DuplicateSchedule {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
    },

    #[error("Schedule for {jurisdiction} {tax_year} has no bracket tables")]
    NoTables {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Derived table {jurisdiction} {tax_year} {target}: source table {source_key} not found")]
    DerivedSourceMissing {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
        target: TableKey,
        source_key: TableKey,
    },

    #[error("Derived table {jurisdiction} {tax_year} {target}: scale must be positive, got {scale}")]
    InvalidScale {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
        target: TableKey,
        scale: Decimal,
    },

    #[error("Invalid modifier in {jurisdiction} {tax_year}: {source}")]
    Modifier {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
        #[source]
        source: ModifierError,
    },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A schedule under construction plus the tables it still has to derive.
struct PendingSchedule {
    schedule: YearSchedule,
    derived: Vec<DerivedTable>,
}

/// Builds a registry from bracket CSV and schedule TOML.
///
/// Every CSV table is attached to the schedule for its jurisdiction and
/// year. Years with CSV tables but no TOML entry become bare schedules with
/// brackets only. Derived tables are built after all CSV tables are in.
///
/// # Errors
///
/// See [`TaxDataError`].
pub fn load_registry(
    brackets_csv: &str,
    schedules_toml: &str,
) -> Result<ScheduleRegistry, TaxDataError> {
    let groups = BracketLoader::load(brackets_csv.as_bytes())?;
    let file = SchedulesFile::parse(schedules_toml)?;

    let mut pending: BTreeMap<(Jurisdiction, TaxYear), PendingSchedule> = BTreeMap::new();

    for entry in file.schedules {
        let years = entry.years();
        if years.is_empty() {
            return Err(TaxDataError::NoYear(entry.jurisdiction));
        }

        for tax_year in years {
            let id = (entry.jurisdiction.clone(), tax_year.clone());
            if pending.contains_key(&id) {
                return Err(TaxDataError::DuplicateSchedule {
                    jurisdiction: entry.jurisdiction.clone(),
                    tax_year,
                });
            }

            for rule in &entry.modifiers {
                rule.validate().map_err(|source| TaxDataError::Modifier {
                    jurisdiction: entry.jurisdiction.clone(),
                    tax_year: tax_year.clone(),
                    source,
                })?;
                if let ModifierKind::PhaseOutCredit(credit) = &rule.kind {
                    let remaining = credit.remaining_at_end();
                    if !remaining.is_zero() {
                        warn!(
                            jurisdiction = %entry.jurisdiction,
                            tax_year = %tax_year,
                            modifier = %rule.name,
                            %remaining,
                            "phase-out credit drops to zero at its end threshold"
                        );
                    }
                }
            }

            let mut schedule = YearSchedule::new(entry.jurisdiction.clone(), tax_year);
            schedule.proration = entry.proration;
            schedule.standard_deductions = entry.standard_deductions.clone();
            schedule.category_limits = entry.category_limits.clone();
            schedule.modifiers = entry.modifiers.clone();

            pending.insert(
                id,
                PendingSchedule {
                    schedule,
                    derived: entry.derived_tables.clone(),
                },
            );
        }
    }

    for group in groups {
        let slot = pending
            .entry((group.jurisdiction.clone(), group.tax_year.clone()))
            .or_insert_with(|| {
                debug!(
                    jurisdiction = %group.jurisdiction,
                    tax_year = %group.tax_year,
                    "no schedule configuration, using brackets only"
                );
                PendingSchedule {
                    schedule: YearSchedule::new(group.jurisdiction.clone(), group.tax_year.clone()),
                    derived: Vec::new(),
                }
            });
        slot.schedule.insert_table(group.key, group.table)?;
    }

    let mut registry = ScheduleRegistry::new();
    for (_, PendingSchedule { mut schedule, derived }) in pending {
        for derivation in derived {
            derive_table(&mut schedule, &derivation)?;
        }

        if schedule.tables().next().is_none() {
            return Err(TaxDataError::NoTables {
                jurisdiction: schedule.jurisdiction().clone(),
                tax_year: schedule.tax_year().clone(),
            });
        }

        registry.insert(schedule)?;
    }

    info!(
        jurisdictions = registry.jurisdictions().count(),
        schedules = registry.schedules().count(),
        "loaded schedule registry"
    );

    Ok(registry)
}

fn derive_table(
    schedule: &mut YearSchedule,
    derivation: &DerivedTable,
) -> Result<(), TaxDataError> {
    let target = TableKey::new(derivation.category.clone(), derivation.residency);
    let source_key = TableKey::new(derivation.from.clone(), derivation.residency);

    if derivation.scale <= Decimal::ZERO {
        return Err(TaxDataError::InvalidScale {
            jurisdiction: schedule.jurisdiction().clone(),
            tax_year: schedule.tax_year().clone(),
            target,
            scale: derivation.scale,
        });
    }

    let Some(source) = schedule.table(&source_key) else {
        return Err(TaxDataError::DerivedSourceMissing {
            jurisdiction: schedule.jurisdiction().clone(),
            tax_year: schedule.tax_year().clone(),
            target,
            source_key,
        });
    };

    let table = source.scaled(derivation.scale);
    schedule.insert_table(target, table)?;
    Ok(())
}

/// Loads `brackets.csv` and `schedules.toml` from a directory.
pub fn load_registry_from_dir(dir: &Path) -> Result<ScheduleRegistry, TaxDataError> {
    let brackets = read(&dir.join(BRACKETS_FILE))?;
    let schedules = read(&dir.join(SCHEDULES_FILE))?;
    load_registry(&brackets, &schedules)
}

fn read(path: &Path) -> Result<String, TaxDataError> {
    fs::read_to_string(path).map_err(|source| TaxDataError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// The registry built from the data shipped with the crate.
pub fn bundled_registry() -> Result<ScheduleRegistry, TaxDataError> {
    load_registry(BUNDLED_BRACKETS, BUNDLED_SCHEDULES)
}
