//! Parsing of user-supplied command-line values.

use rust_decimal::Decimal;
use tax_core::{Bracket, BracketTable, BracketTableError};
use thiserror::Error;

/// Error returned when a command-line value cannot be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("{field}: '{input}' is not a number")]
    NotANumber { field: String, input: String },

    #[error("{field}: value is required")]
    Empty { field: String },

    #[error("{field}: must not be negative, got {value}")]
    Negative { field: String, value: Decimal },

    #[error("{field}: expected NAME=VALUE, got '{input}'")]
    MissingSeparator { field: String, input: String },

    #[error("--rate-table: expected BOUND:RATE pairs such as 10000:0.10,inf:0.20, got '{0}'")]
    MalformedBracket(String),

    #[error("--rate-table: {0}")]
    InvalidTable(#[from] BracketTableError),
}

/// Normalizes input for decimal parsing: trims whitespace and removes commas (thousands separator).
fn normalize_decimal_input(s: &str) -> String {
    s.trim().replace(',', "")
}

/// Parses a non-negative amount such as `"1,234.56"`.
///
/// `field` names the option in error messages.
pub fn parse_amount(
    field: &str,
    s: &str,
) -> Result<Decimal, InputError> {
    let normalized = normalize_decimal_input(s);
    if normalized.is_empty() {
        return Err(InputError::Empty {
            field: field.to_string(),
        });
    }

    let value: Decimal = normalized.parse().map_err(|e| {
        tracing::debug!(input = %s, "invalid decimal: {}", e);
        InputError::NotANumber {
            field: field.to_string(),
            input: s.trim().to_string(),
        }
    })?;

    if value < Decimal::ZERO {
        return Err(InputError::Negative {
            field: field.to_string(),
            value,
        });
    }
    Ok(value)
}

/// Parses `NAME=VALUE` into its parts.
pub fn parse_named_amount(
    field: &str,
    s: &str,
) -> Result<(String, Decimal), InputError> {
    let Some((name, value)) = s.split_once('=') else {
        return Err(InputError::MissingSeparator {
            field: field.to_string(),
            input: s.to_string(),
        });
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(InputError::Empty {
            field: field.to_string(),
        });
    }
    Ok((name.to_string(), parse_amount(field, value)?))
}

/// Parses an ad-hoc rate table such as `"10000:0.10,50000:0.20,inf:0.30"`.
///
/// Bounds accept `_` as a thousands separator; `inf` (or an empty bound)
/// marks the unbounded top bracket.
pub fn parse_rate_table(s: &str) -> Result<BracketTable, InputError> {
    let mut brackets = Vec::new();

    for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((bound, rate)) = pair.split_once(':') else {
            return Err(InputError::MalformedBracket(pair.to_string()));
        };

        let bound = bound.trim().replace('_', "");
        let upper_bound = match bound.to_ascii_lowercase().as_str() {
            "" | "inf" | "infinity" => None,
            _ => Some(
                bound
                    .parse::<Decimal>()
                    .map_err(|_| InputError::MalformedBracket(pair.to_string()))?,
            ),
        };
        let rate = rate
            .trim()
            .parse::<Decimal>()
            .map_err(|_| InputError::MalformedBracket(pair.to_string()))?;

        brackets.push(Bracket { upper_bound, rate });
    }

    Ok(BracketTable::try_new(brackets)?)
}
