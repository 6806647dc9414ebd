use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tax_core::calculations::{
    AssessmentRequest, Deduction, PayFrequency, assess, assess_combined, compute_bracket_tax,
};
use tax_core::{FallbackPolicy, FilerCategory, Jurisdiction, Residency, ScheduleRegistry, TaxYear};
use tracing::{debug, info};

use crate::input::{parse_amount, parse_named_amount, parse_rate_table};
use crate::report::{self, BracketReport, CalcReport, CombinedReport};

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Progressive tax and levy calculator.
///
/// Rate schedules come from the bundled reference data unless
/// `--data-dir` points at a directory holding `brackets.csv` and
/// `schedules.toml`.
#[derive(Debug, Parser)]
#[command(name = "taxcalc", version)]
pub struct Cli {
    /// Directory with `brackets.csv` and `schedules.toml`.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `tax_core=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Also append log lines to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Assess an amount against a jurisdiction's schedule.
    Calc(CalcArgs),
    /// Walk an ad-hoc rate table without any reference data.
    Bracket(BracketArgs),
    /// List the tax years available per jurisdiction.
    Years {
        /// Limit the listing to one jurisdiction.
        jurisdiction: Option<Jurisdiction>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ResidencyArg {
    #[default]
    Resident,
    NonResident,
    PartYear,
}

#[derive(Debug, Args)]
pub struct CalcArgs {
    /// Jurisdiction code, e.g. AU, NZ, US-FED, US-CA, UK, UK-NI.
    pub jurisdiction: Jurisdiction,

    /// Tax year label, e.g. 2023-2024, 2024-25 or 2026.
    pub year: TaxYear,

    /// Gross amount; commas are allowed.
    pub amount: String,

    /// Filer category, e.g. single, married, first_time_buyer, a.
    #[arg(long, short, default_value = "any")]
    pub category: FilerCategory,

    #[arg(long, value_enum, default_value_t)]
    pub residency: ResidencyArg,

    /// Months present, for `--residency part-year`.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=12))]
    pub months: Option<u8>,

    /// `standard`, or an amount to subtract before the bracket walk.
    #[arg(long)]
    pub deduction: Option<String>,

    /// Earners sharing the amount, for per-earner levy caps.
    #[arg(long, default_value_t = 1)]
    pub earners: u32,

    /// Turn on a modifier that is off by default. Repeatable.
    #[arg(long = "enable", value_name = "NAME")]
    pub enable: Vec<String>,

    /// Turn off a modifier. Repeatable.
    #[arg(long = "disable", value_name = "NAME")]
    pub disable: Vec<String>,

    /// Override a contribution rate, e.g. kiwisaver=0.06. Repeatable.
    #[arg(long = "contribution-rate", value_name = "NAME=RATE")]
    pub contribution_rates: Vec<String>,

    /// Also assess this jurisdiction on the same taxable amount and add it
    /// to the totals, e.g. `--with US-CA` on a US-FED request. Repeatable.
    #[arg(long = "with", value_name = "JURISDICTION")]
    pub with: Vec<Jurisdiction>,

    /// Use the latest earlier year when the requested one is missing.
    #[arg(long)]
    pub fallback_latest: bool,

    /// Also show figures per pay period.
    #[arg(long)]
    pub frequency: Option<PayFrequency>,

    /// Print JSON instead of a text report.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct BracketArgs {
    /// Rate table as BOUND:RATE pairs, e.g. 18200:0,45000:0.19,inf:0.325.
    #[arg(long)]
    pub rate_table: String,

    pub amount: String,

    #[arg(long)]
    pub json: bool,
}

// ─── commands ────────────────────────────────────────────────────────────────

/// Runs the selected command and returns what should be printed.
pub fn run(cli: &Cli) -> Result<String> {
    match &cli.command {
        Command::Calc(args) => {
            let registry = load_registry(cli)?;
            calc(&registry, args)
        }
        Command::Bracket(args) => bracket(args),
        Command::Years { jurisdiction } => {
            let registry = load_registry(cli)?;
            if let Some(j) = jurisdiction
                && registry.years(j).is_empty()
            {
                bail!("no reference data for jurisdiction {j}");
            }
            Ok(report::render_years(&registry, jurisdiction.as_ref()))
        }
    }
}

fn load_registry(cli: &Cli) -> Result<ScheduleRegistry> {
    match &cli.data_dir {
        Some(dir) => {
            debug!("loading reference data from {}", dir.display());
            tax_data::load_registry_from_dir(dir)
                .with_context(|| format!("Failed to load reference data from {}", dir.display()))
        }
        None => tax_data::bundled_registry().context("Bundled reference data is invalid"),
    }
}

fn residency(args: &CalcArgs) -> Result<Residency> {
    match (args.residency, args.months) {
        (ResidencyArg::PartYear, Some(months)) => Ok(Residency::part_year(months)?),
        (ResidencyArg::PartYear, None) => bail!("--residency part-year requires --months"),
        (_, Some(_)) => bail!("--months only applies to --residency part-year"),
        (ResidencyArg::Resident, None) => Ok(Residency::Resident),
        (ResidencyArg::NonResident, None) => Ok(Residency::NonResident),
    }
}

fn deduction(value: Option<&str>) -> Result<Deduction> {
    match value {
        None => Ok(Deduction::None),
        Some(v) if v.trim().eq_ignore_ascii_case("standard") => Ok(Deduction::Standard),
        Some(v) => Ok(Deduction::Amount(parse_amount("--deduction", v)?)),
    }
}

/// Turns parsed arguments into an engine request.
pub fn build_request(args: &CalcArgs) -> Result<AssessmentRequest> {
    let gross = parse_amount("amount", &args.amount)?;

    let mut request = AssessmentRequest::new(
        args.jurisdiction.clone(),
        args.year.clone(),
        args.category.clone(),
        gross,
    )
    .with_residency(residency(args)?)
    .with_deduction(deduction(args.deduction.as_deref())?)
    .with_earners(args.earners);

    for name in &args.enable {
        request = request.with_toggle(name.as_str(), true);
    }
    for name in &args.disable {
        if args.enable.contains(name) {
            bail!("modifier '{name}' is both enabled and disabled");
        }
        request = request.with_toggle(name.as_str(), false);
    }
    for entry in &args.contribution_rates {
        let (name, rate) = parse_named_amount("--contribution-rate", entry)?;
        request = request.with_contribution_rate(name, rate);
    }
    if args.fallback_latest {
        request = request.with_fallback(FallbackPolicy::LatestAvailable);
    }

    Ok(request)
}

fn calc(
    registry: &ScheduleRegistry,
    args: &CalcArgs,
) -> Result<String> {
    let request = build_request(args)?;
    if !args.with.is_empty() {
        return calc_combined(registry, &request, args);
    }

    let assessment = assess(registry, &request)?;
    info!(
        jurisdiction = %assessment.jurisdiction,
        year = %assessment.year.resolved,
        total_tax = %assessment.total_tax,
        "assessment complete"
    );

    if args.json {
        let report = CalcReport {
            assessment: &assessment,
            per_period: args.frequency.map(|f| assessment.per_period(f)),
        };
        Ok(report::to_json(&report)?)
    } else {
        Ok(report::render_assessment(&assessment, args.frequency))
    }
}

fn calc_combined(
    registry: &ScheduleRegistry,
    request: &AssessmentRequest,
    args: &CalcArgs,
) -> Result<String> {
    let combined = assess_combined(registry, request, &args.with)?;
    info!(
        jurisdiction = %combined.primary.jurisdiction,
        layers = combined.layers.len(),
        total_tax = %combined.total_tax,
        "combined assessment complete"
    );

    if args.json {
        let report = CombinedReport {
            combined: &combined,
            per_period: args.frequency.map(|f| combined.per_period(f)),
        };
        Ok(report::to_json(&report)?)
    } else {
        Ok(report::render_combined(&combined, args.frequency))
    }
}

fn bracket(args: &BracketArgs) -> Result<String> {
    let table = parse_rate_table(&args.rate_table)?;
    let amount = parse_amount("amount", &args.amount)?;
    let result = compute_bracket_tax(amount, &table);

    if args.json {
        let report = BracketReport {
            amount,
            result: &result,
            effective_rate: result.effective_rate(amount),
        };
        Ok(report::to_json(&report)?)
    } else {
        Ok(report::render_bracket(amount, &result))
    }
}
