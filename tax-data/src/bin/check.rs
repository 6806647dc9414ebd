use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tax_data::{BUNDLED_BRACKETS, BUNDLED_SCHEDULES, load_registry};

/// Validate bracket and schedule data files.
///
/// The brackets CSV has the columns:
/// - jurisdiction: jurisdiction code (e.g., AU, US-FED)
/// - tax_year: tax-year label (e.g., 2024-2025)
/// - category: filer category (any for every category)
/// - residency: resident, non_resident, or empty for any
/// - upper_bound: the bracket's upper bound (empty for the top bracket)
/// - rate: the marginal rate as a decimal (e.g., 0.19)
///
/// Without arguments the data compiled into the crate is checked.
#[derive(Parser, Debug)]
#[command(name = "tax-data-check")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the CSV file containing bracket rows
    #[arg(short, long, requires = "schedules")]
    brackets: Option<PathBuf>,

    /// Path to the TOML file containing year schedules
    #[arg(short, long, requires = "brackets")]
    schedules: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (brackets, schedules) = match (&args.brackets, &args.schedules) {
        (Some(brackets_path), Some(schedules_path)) => {
            println!("Checking {} and {}", brackets_path.display(), schedules_path.display());
            let brackets = fs::read_to_string(brackets_path)
                .with_context(|| format!("Failed to open: {}", brackets_path.display()))?;
            let schedules = fs::read_to_string(schedules_path)
                .with_context(|| format!("Failed to open: {}", schedules_path.display()))?;
            (brackets, schedules)
        }
        _ => {
            println!("Checking bundled data");
            (BUNDLED_BRACKETS.to_string(), BUNDLED_SCHEDULES.to_string())
        }
    };

    let registry = load_registry(&brackets, &schedules).context("Data files are invalid")?;

    for jurisdiction in registry.jurisdictions() {
        let years = registry.years(jurisdiction);
        let (Some(first), Some(last)) = (years.first(), years.last()) else {
            continue;
        };
        if years.len() == 1 {
            println!("  {jurisdiction:<18} {first}");
        } else {
            println!("  {jurisdiction:<18} {first} .. {last} ({} years)", years.len());
        }
    }

    let tables: usize = registry.schedules().map(|s| s.tables().count()).sum();
    println!(
        "OK: {} jurisdictions, {} schedules, {} tables.",
        registry.jurisdictions().count(),
        registry.schedules().count(),
        tables
    );

    Ok(())
}
