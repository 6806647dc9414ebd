use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when parsing reference-data identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("jurisdiction code must not be empty")]
    EmptyJurisdiction,

    #[error("filer category must not be empty")]
    EmptyCategory,

    #[error("invalid tax year '{0}' (expected e.g. 2026, 2026-27 or 2023-2024)")]
    InvalidTaxYear(String),
}

/// Normalized jurisdiction code such as `AU`, `US-FED` or `UK-SDLT`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jurisdiction(String);

impl Jurisdiction {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Jurisdiction {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        if code.is_empty() {
            return Err(IdentifierError::EmptyJurisdiction);
        }
        Ok(Self(code.to_ascii_uppercase().replace('_', "-")))
    }
}

impl TryFrom<String> for Jurisdiction {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Jurisdiction> for String {
    fn from(value: Jurisdiction) -> Self {
        value.0
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Filer category used to pick a table within a tax year.
///
/// Categories are lower-case labels (`single`, `married`, `resident`,
/// NI letters, `first_time_buyer`, ...). [`FilerCategory::ANY`] marks a
/// table that serves every category.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FilerCategory(String);

impl FilerCategory {
    pub const ANY: &'static str = "any";

    pub fn any() -> Self {
        Self(Self::ANY.to_string())
    }

    pub fn is_any(&self) -> bool {
        self.0 == Self::ANY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for FilerCategory {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        if label.is_empty() {
            return Err(IdentifierError::EmptyCategory);
        }
        Ok(Self(label.to_ascii_lowercase().replace('-', "_")))
    }
}

impl TryFrom<String> for FilerCategory {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FilerCategory> for String {
    fn from(value: FilerCategory) -> Self {
        value.0
    }
}

impl fmt::Display for FilerCategory {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static TAX_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})(?:[-/](\d{2}|\d{4}))?$").expect("tax year pattern is valid")
});

/// A tax-year label as published by the jurisdiction.
///
/// Accepts a single year (`2026`, NZ style), a short span (`2026-27`, UK
/// style) or a full span (`2023-2024`, Australian style). Years order by
/// the calendar year in which they end; the original label is preserved.
///
/// ```
/// use tax_core::TaxYear;
///
/// let year: TaxYear = "2023-2024".parse().unwrap();
/// assert_eq!(year.end_year(), 2024);
/// assert_eq!(year.label(), "2023-2024");
///
/// let uk: TaxYear = "2026-27".parse().unwrap();
/// assert_eq!(uk.end_year(), 2027);
/// assert!(uk > year);
/// ```
#[derive(Debug, Clone, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaxYear {
    label: String,
    end_year: i32,
}

impl TaxYear {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn end_year(&self) -> i32 {
        self.end_year
    }
}

impl FromStr for TaxYear {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        let invalid = || IdentifierError::InvalidTaxYear(label.to_string());
        let caps = TAX_YEAR_RE.captures(label).ok_or_else(invalid)?;

        let start: i32 = caps[1].parse().map_err(|_| invalid())?;
        let end_year = match caps.get(2) {
            None => start,
            Some(end) if end.as_str().len() == 2 => {
                let short: i32 = end.as_str().parse().map_err(|_| invalid())?;
                let candidate = start - start % 100 + short;
                if candidate > start {
                    candidate
                } else {
                    candidate + 100
                }
            }
            Some(end) => end.as_str().parse().map_err(|_| invalid())?,
        };

        if caps.get(2).is_some() && end_year != start + 1 {
            return Err(invalid());
        }

        Ok(Self {
            label: label.to_string(),
            end_year,
        })
    }
}

impl TryFrom<String> for TaxYear {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaxYear> for String {
    fn from(value: TaxYear) -> Self {
        value.label
    }
}

impl PartialEq for TaxYear {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.label == other.label
    }
}

impl Eq for TaxYear {}

impl PartialOrd for TaxYear {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TaxYear {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        self.end_year
            .cmp(&other.end_year)
            .then_with(|| self.label.cmp(&other.label))
    }
}

impl fmt::Display for TaxYear {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.label)
    }
}
