use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResidencyError {
    #[error("unknown residency '{0}' (expected resident, non_resident or any)")]
    UnknownClass(String),

    #[error("months present must be between 1 and 12, got {0}")]
    MonthsOutOfRange(u8),
}

/// Residency status of the person a calculation is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Residency {
    #[default]
    Resident,
    NonResident,
    /// Resident for part of the tax year.
    PartYear { months_present: u8 },
}

impl Residency {
    /// Builds a part-year status, checking the month count.
    pub fn part_year(months_present: u8) -> Result<Self, ResidencyError> {
        if (1..=12).contains(&months_present) {
            Ok(Self::PartYear { months_present })
        } else {
            Err(ResidencyError::MonthsOutOfRange(months_present))
        }
    }

    /// The table class this status draws its brackets from.
    pub fn class(&self) -> ResidencyClass {
        match self {
            Self::Resident | Self::PartYear { .. } => ResidencyClass::Resident,
            Self::NonResident => ResidencyClass::NonResident,
        }
    }

    pub fn is_resident(&self) -> bool {
        !matches!(self, Self::NonResident)
    }

    /// Scales an annual amount to the part of the year spent resident.
    ///
    /// Full residents and non-residents keep the whole amount. The amount is
    /// multiplied by the months before dividing, so whole-month shares of
    /// whole amounts stay exact.
    pub fn prorate(
        &self,
        amount: Decimal,
    ) -> Decimal {
        match self {
            Self::PartYear { months_present } => {
                amount * Decimal::from(*months_present) / Decimal::from(12)
            }
            _ => amount,
        }
    }
}

/// Residency key of a stored bracket table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidencyClass {
    /// Table applies regardless of residency.
    Any,
    Resident,
    NonResident,
}

impl ResidencyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Resident => "resident",
            Self::NonResident => "non_resident",
        }
    }
}

impl FromStr for ResidencyClass {
    type Err = ResidencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "" | "any" => Ok(Self::Any),
            "resident" => Ok(Self::Resident),
            "non_resident" | "nonresident" => Ok(Self::NonResident),
            other => Err(ResidencyError::UnknownClass(other.to_string())),
        }
    }
}

impl fmt::Display for ResidencyClass {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
