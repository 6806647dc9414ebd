//! Per-year schedule configuration read from TOML.
//!
//! Bracket rows live in CSV; everything else a year needs lives here:
//!
//! ```toml
//! [[schedule]]
//! jurisdiction = "US-FED"
//! tax_year = "2026"
//! standard_deductions = { single = "16100", married = "32200" }
//!
//! [[schedule.modifier]]
//! name = "social_security"
//! type = "capped_levy"
//! rate = "0.062"
//! cap = "184500"
//! per_earner = true
//! ```
//!
//! One entry may cover several years with `tax_years = [...]` when their
//! configuration is identical.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use tax_core::calculations::{ModifierRule, ThresholdProration};
use tax_core::{CategoryLimit, FilerCategory, Jurisdiction, ResidencyClass, TaxYear};

/// Top level of a schedules file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulesFile {
    #[serde(default, rename = "schedule")]
    pub schedules: Vec<ScheduleEntry>,
}

impl SchedulesFile {
    pub fn parse(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }
}

/// Configuration shared by one or more years of a jurisdiction.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleEntry {
    pub jurisdiction: Jurisdiction,
    #[serde(default)]
    pub tax_year: Option<TaxYear>,
    #[serde(default)]
    pub tax_years: Vec<TaxYear>,
    #[serde(default)]
    pub proration: Option<ThresholdProration>,
    #[serde(default)]
    pub standard_deductions: BTreeMap<FilerCategory, Decimal>,
    #[serde(default, rename = "derived")]
    pub derived_tables: Vec<DerivedTable>,
    #[serde(default, rename = "category_limit")]
    pub category_limits: Vec<CategoryLimit>,
    #[serde(default, rename = "modifier")]
    pub modifiers: Vec<ModifierRule>,
}

impl ScheduleEntry {
    /// Every year the entry names, `tax_year` first.
    pub fn years(&self) -> Vec<TaxYear> {
        self.tax_year
            .iter()
            .chain(self.tax_years.iter())
            .cloned()
            .collect()
    }
}

/// A table built from another table of the same year by scaling its bounds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DerivedTable {
    pub category: FilerCategory,
    pub from: FilerCategory,
    pub scale: Decimal,
    #[serde(default = "any_residency")]
    pub residency: ResidencyClass,
}

fn any_residency() -> ResidencyClass {
    ResidencyClass::Any
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use tax_core::calculations::{LevyBase, ModifierKind, RateSlab};

    use super::*;

    #[test]
    fn test_parse_full_entry() {
        let source = r#"
[[schedule]]
jurisdiction = "US-FED"
tax_year = "2026"
standard_deductions = { single = "16100", married = "32200" }

[[schedule.modifier]]
name = "social_security"
type = "capped_levy"
rate = "0.062"
cap = "184500"
per_earner = true

[[schedule.modifier]]
name = "additional_medicare"
type = "threshold_surtax"
rate = "0.009"
threshold = "200000"
category_thresholds = { married = "250000" }
"#;

        let file = SchedulesFile::parse(source).unwrap();

        assert_eq!(file.schedules.len(), 1);
        let entry = &file.schedules[0];
        assert_eq!(entry.jurisdiction.as_str(), "US-FED");
        assert_eq!(entry.years(), vec!["2026".parse::<TaxYear>().unwrap()]);
        assert_eq!(
            entry.standard_deductions.get(&"married".parse().unwrap()),
            Some(&dec!(32200))
        );
        assert_eq!(
            entry.modifiers[0].kind,
            ModifierKind::CappedLevy {
                rate: dec!(0.062),
                cap: Some(dec!(184500)),
                base: LevyBase::Gross,
                per_earner: true,
            }
        );
        assert!(entry.modifiers[1].enabled_by_default);
        assert!(matches!(
            entry.modifiers[1].kind,
            ModifierKind::ThresholdSurtax { threshold, .. } if threshold == dec!(200000)
        ));
    }

    #[test]
    fn test_parse_year_list_and_proration() {
        let source = r#"
[[schedule]]
jurisdiction = "AU"
tax_years = ["2022-2023", "2023-2024"]
proration = { method = "intercept", base = "13464", per_year = "4736" }
"#;

        let file = SchedulesFile::parse(source).unwrap();
        let entry = &file.schedules[0];

        assert_eq!(entry.years().len(), 2);
        assert_eq!(
            entry.proration,
            Some(ThresholdProration::Intercept {
                base: dec!(13464),
                per_year: dec!(4736),
            })
        );
    }

    #[test]
    fn test_parse_slab_rate_modifier() {
        let source = r#"
[[schedule]]
jurisdiction = "US-NY-TRANSFER"
tax_year = "2026"

[[schedule.modifier]]
name = "mansion_tax"
type = "slab_rate"
slabs = [
    { from = "1000000", rate = "0.01" },
    { from = "2000000", rate = "0.0125" },
]
"#;

        let file = SchedulesFile::parse(source).unwrap();
        let rule = &file.schedules[0].modifiers[0];

        assert_eq!(
            rule.kind,
            ModifierKind::SlabRate {
                slabs: vec![
                    RateSlab {
                        from: dec!(1000000),
                        rate: dec!(0.01),
                    },
                    RateSlab {
                        from: dec!(2000000),
                        rate: dec!(0.0125),
                    },
                ],
                base: LevyBase::Gross,
            }
        );
        assert_eq!(rule.validate(), Ok(()));
    }

    #[test]
    fn test_parse_derived_and_limits() {
        let source = r#"
[[schedule]]
jurisdiction = "UK-SDLT"
tax_year = "2025-2026"

[[schedule.derived]]
category = "married"
from = "single"
scale = "2"

[[schedule.category_limit]]
category = "first_time_buyer"
max_amount = "500000"
otherwise = "standard"
"#;

        let file = SchedulesFile::parse(source).unwrap();
        let entry = &file.schedules[0];

        assert_eq!(
            entry.derived_tables,
            vec![DerivedTable {
                category: "married".parse().unwrap(),
                from: "single".parse().unwrap(),
                scale: dec!(2),
                residency: ResidencyClass::Any,
            }]
        );
        assert_eq!(entry.category_limits[0].otherwise.as_str(), "standard");
    }

    #[test]
    fn test_parse_rejects_unknown_field() {
        let source = r#"
[[schedule]]
jurisdiction = "NZ"
tax_year = "2026"
currency = "NZD"
"#;

        assert!(SchedulesFile::parse(source).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_modifier_type() {
        let source = r#"
[[schedule]]
jurisdiction = "NZ"
tax_year = "2026"

[[schedule.modifier]]
name = "mystery"
type = "lottery"
rate = "0.5"
"#;

        assert!(SchedulesFile::parse(source).is_err());
    }

    #[test]
    fn test_empty_file_has_no_schedules() {
        let file = SchedulesFile::parse("").unwrap();

        assert!(file.schedules.is_empty());
    }
}
