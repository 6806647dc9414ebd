use std::collections::BTreeSet;
use std::io::Read;

use rust_decimal::Decimal;
use serde::Deserialize;
use tax_core::{
    Bracket, BracketTable, BracketTableError, FilerCategory, Jurisdiction, ResidencyClass,
    TableKey, TaxYear,
};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when loading bracket data.
#[derive(Debug, Error)]
pub enum BracketLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Invalid bracket table {jurisdiction} {tax_year} {key}: {source}")]
    InvalidTable {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
        key: TableKey,
        #[source]
        source: BracketTableError,
    },

    #[error("Bracket table {jurisdiction} {tax_year} {key} appears more than once")]
    DuplicateTable {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
        key: TableKey,
    },
}

impl From<csv::Error> for BracketLoaderError {
    fn from(err: csv::Error) -> Self {
        BracketLoaderError::CsvParse(err.to_string())
    }
}

/// A single record from the brackets CSV file.
///
/// One row per bracket, lowest bracket first:
/// - `jurisdiction`: jurisdiction code (e.g., AU, US-FED, UK-NI)
/// - `tax_year`: tax-year label (e.g., 2024-2025, 2026, 2026-27)
/// - `category`: filer category (`any` when the table serves everyone)
/// - `residency`: resident, non_resident, or empty for any
/// - `upper_bound`: the bracket's upper bound (empty for the top bracket)
/// - `rate`: the marginal rate as a decimal (e.g., 0.19 for 19%)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BracketRecord {
    pub jurisdiction: Jurisdiction,
    pub tax_year: TaxYear,
    pub category: FilerCategory,
    #[serde(default = "any_residency", deserialize_with = "deserialize_residency")]
    pub residency: ResidencyClass,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub upper_bound: Option<Decimal>,
    pub rate: Decimal,
}

impl BracketRecord {
    fn bracket(&self) -> Bracket {
        Bracket {
            upper_bound: self.upper_bound,
            rate: self.rate,
        }
    }

    fn key(&self) -> TableKey {
        TableKey::new(self.category.clone(), self.residency)
    }
}

fn any_residency() -> ResidencyClass {
    ResidencyClass::Any
}

fn deserialize_residency<'de, D>(deserializer: D) -> Result<ResidencyClass, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) => s.parse().map_err(serde::de::Error::custom),
        None => Ok(ResidencyClass::Any),
    }
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// A validated table together with where it belongs.
#[derive(Debug, Clone, PartialEq)]
pub struct TableGroup {
    pub jurisdiction: Jurisdiction,
    pub tax_year: TaxYear,
    pub key: TableKey,
    pub table: BracketTable,
}

/// Loader for bracket tables from CSV files.
///
/// Consecutive rows sharing jurisdiction, tax year, category and residency
/// form one table. A table ends at its unbounded bracket; rows for the same
/// key after that, or anywhere later in the file, are a duplicate table.
pub struct BracketLoader;

impl BracketLoader {
    /// Parse bracket records from a CSV reader.
    ///
    /// Returns a vector of parsed records. The reader can be any type that
    /// implements `Read`, such as a file or a string slice.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<BracketRecord>, BracketLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: BracketRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Group parsed records into validated tables, in file order.
    pub fn group(records: &[BracketRecord]) -> Result<Vec<TableGroup>, BracketLoaderError> {
        let mut groups = Vec::new();
        let mut seen = BTreeSet::new();
        let mut current: Option<(&BracketRecord, Vec<Bracket>)> = None;

        for record in records {
            let continues = match &current {
                Some((first, brackets)) => {
                    same_table(first, record)
                        && brackets.last().is_some_and(|b| b.upper_bound.is_some())
                }
                None => false,
            };

            if continues {
                if let Some((_, brackets)) = current.as_mut() {
                    brackets.push(record.bracket());
                }
                continue;
            }

            if let Some((first, brackets)) = current.take() {
                groups.push(finish(first, brackets, &mut seen)?);
            }
            current = Some((record, vec![record.bracket()]));
        }

        if let Some((first, brackets)) = current {
            groups.push(finish(first, brackets, &mut seen)?);
        }

        Ok(groups)
    }

    /// Parse and group in one step.
    pub fn load<R: Read>(reader: R) -> Result<Vec<TableGroup>, BracketLoaderError> {
        let records = Self::parse(reader)?;
        let groups = Self::group(&records)?;
        debug!(
            records = records.len(),
            tables = groups.len(),
            "loaded bracket tables"
        );
        Ok(groups)
    }
}

fn same_table(
    a: &BracketRecord,
    b: &BracketRecord,
) -> bool {
    a.jurisdiction == b.jurisdiction
        && a.tax_year == b.tax_year
        && a.category == b.category
        && a.residency == b.residency
}

fn finish(
    first: &BracketRecord,
    brackets: Vec<Bracket>,
    seen: &mut BTreeSet<(Jurisdiction, TaxYear, TableKey)>,
) -> Result<TableGroup, BracketLoaderError> {
    let key = first.key();
    let id = (first.jurisdiction.clone(), first.tax_year.clone(), key.clone());
    if !seen.insert(id) {
        return Err(BracketLoaderError::DuplicateTable {
            jurisdiction: first.jurisdiction.clone(),
            tax_year: first.tax_year.clone(),
            key,
        });
    }

    let table = BracketTable::try_new(brackets).map_err(|source| {
        BracketLoaderError::InvalidTable {
            jurisdiction: first.jurisdiction.clone(),
            tax_year: first.tax_year.clone(),
            key: key.clone(),
            source,
        }
    })?;

    Ok(TableGroup {
        jurisdiction: first.jurisdiction.clone(),
        tax_year: first.tax_year.clone(),
        key,
        table,
    })
}
