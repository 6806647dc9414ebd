//! Text and JSON rendering of calculation results.

use std::fmt::Write;

use rust_decimal::Decimal;
use serde::Serialize;
use tax_core::calculations::common::round_half_up;
use tax_core::calculations::{
    Assessment, CombinedAssessment, ModifierEffect, PayFrequency, PeriodBreakdown,
};
use tax_core::{BracketContribution, CalculationResult, Jurisdiction, Residency, ScheduleRegistry};

const LABEL_WIDTH: usize = 28;
const VALUE_WIDTH: usize = 16;

/// Formats a money amount with two decimals and comma thousands separators.
pub fn format_money(value: Decimal) -> String {
    let formatted = format!("{:.2}", round_half_up(value).abs());
    let (whole, fraction) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < Decimal::ZERO && !round_half_up(value).is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{fraction}")
}

/// Formats a fractional rate as a percentage, e.g. `0.325` as `32.5%`.
pub fn format_rate(rate: Decimal) -> String {
    format!("{}%", (rate * Decimal::ONE_HUNDRED).normalize())
}

fn format_effective_rate(rate: Decimal) -> String {
    format!("{:.2}%", round_half_up(rate * Decimal::ONE_HUNDRED))
}

fn residency_label(residency: Residency) -> String {
    match residency {
        Residency::Resident => "resident".to_string(),
        Residency::NonResident => "non-resident".to_string(),
        Residency::PartYear { months_present } => {
            format!("part-year resident ({months_present} months)")
        }
    }
}

fn line(
    out: &mut String,
    label: &str,
    value: &str,
) {
    let _ = writeln!(out, "  {label:<LABEL_WIDTH$}{value:>VALUE_WIDTH$}");
}

fn bracket_range(contribution: &BracketContribution) -> String {
    match contribution.upper_bound {
        Some(upper) => format!(
            "{} - {}",
            format_money(contribution.lower_bound),
            format_money(upper)
        ),
        None => format!("{} and over", format_money(contribution.lower_bound)),
    }
}

fn bracket_rows(
    out: &mut String,
    result: &CalculationResult,
) {
    if result.contributions.is_empty() {
        return;
    }
    let _ = writeln!(
        out,
        "  {:<28}{:>8}{:>16}{:>14}",
        "Bracket", "Rate", "Slice", "Tax"
    );
    for contribution in &result.contributions {
        let _ = writeln!(
            out,
            "  {:<28}{:>8}{:>16}{:>14}",
            bracket_range(contribution),
            format_rate(contribution.rate),
            format_money(contribution.taxable_slice),
            format_money(contribution.amount)
        );
    }
    out.push('\n');
}

/// Renders a full assessment as a text report.
pub fn render_assessment(
    assessment: &Assessment,
    frequency: Option<PayFrequency>,
) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} {}, category {}, {}",
        assessment.jurisdiction,
        assessment.year.resolved,
        assessment.applied_category,
        residency_label(assessment.residency)
    );
    if assessment.year.fell_back {
        let _ = writeln!(
            out,
            "  note: no schedule for {}; using {}",
            assessment.year.requested, assessment.year.resolved
        );
    }
    if assessment.applied_category != assessment.requested_category {
        let _ = writeln!(
            out,
            "  note: amount is over the {} limit; using {}",
            assessment.requested_category, assessment.applied_category
        );
    }
    out.push('\n');

    line(&mut out, "Gross amount", &format_money(assessment.gross));
    if !assessment.deduction.is_zero() {
        line(&mut out, "Deduction", &format_money(assessment.deduction));
    }
    line(&mut out, "Taxable amount", &format_money(assessment.taxable));
    out.push('\n');

    bracket_rows(&mut out, &assessment.bracket);

    line(&mut out, "Bracket tax", &format_money(assessment.bracket_tax));
    for modifier in &assessment.modifiers {
        let sign = match modifier.effect {
            ModifierEffect::Charge => "+",
            ModifierEffect::Credit => "-",
            ModifierEffect::Contribution => continue,
        };
        line(
            &mut out,
            &format!("{sign} {}", modifier.name),
            &format_money(modifier.amount),
        );
    }
    line(&mut out, "Total tax", &format_money(assessment.total_tax));

    for modifier in &assessment.modifiers {
        if modifier.effect == ModifierEffect::Contribution {
            line(
                &mut out,
                &format!("- {}", modifier.name),
                &format_money(modifier.amount),
            );
        }
    }
    line(&mut out, "Net amount", &format_money(assessment.net));
    line(
        &mut out,
        "Effective rate",
        &format_effective_rate(assessment.effective_rate),
    );
    line(&mut out, "Marginal rate", &format_rate(assessment.marginal_rate));

    if let Some(frequency) = frequency {
        period_rows(&mut out, &assessment.per_period(frequency));
    }

    out
}

fn period_rows(
    out: &mut String,
    period: &PeriodBreakdown,
) {
    let _ = writeln!(out, "\n  Per {} period", period.frequency);
    line(out, "Gross", &format_money(period.gross));
    line(out, "Tax", &format_money(period.total_tax));
    if !period.contributions.is_zero() {
        line(out, "Contributions", &format_money(period.contributions));
    }
    line(out, "Net", &format_money(period.net));
}

/// Renders each part of a combined assessment followed by the combined
/// totals.
pub fn render_combined(
    combined: &CombinedAssessment,
    frequency: Option<PayFrequency>,
) -> String {
    let mut out = String::new();
    for part in combined.parts() {
        out.push_str(&render_assessment(part, None));
        out.push('\n');
    }

    let names: Vec<&str> = combined.parts().map(|part| part.jurisdiction.as_str()).collect();
    let _ = writeln!(out, "Combined ({})", names.join(" + "));
    out.push('\n');
    line(&mut out, "Gross amount", &format_money(combined.primary.gross));
    for part in combined.parts() {
        line(
            &mut out,
            &format!("{} tax", part.jurisdiction),
            &format_money(part.total_tax),
        );
    }
    line(&mut out, "Total tax", &format_money(combined.total_tax));
    if !combined.contributions.is_zero() {
        line(&mut out, "Contributions", &format_money(combined.contributions));
    }
    line(&mut out, "Net amount", &format_money(combined.net));
    line(
        &mut out,
        "Effective rate",
        &format_effective_rate(combined.effective_rate),
    );

    if let Some(frequency) = frequency {
        period_rows(&mut out, &combined.per_period(frequency));
    }

    out
}

/// Renders a raw bracket walk.
pub fn render_bracket(
    amount: Decimal,
    result: &CalculationResult,
) -> String {
    let mut out = String::new();
    line(&mut out, "Amount", &format_money(amount));
    out.push('\n');
    bracket_rows(&mut out, result);
    line(&mut out, "Tax due", &format_money(result.tax_due));
    line(
        &mut out,
        "Effective rate",
        &format_effective_rate(result.effective_rate(amount)),
    );
    line(&mut out, "Marginal rate", &format_rate(result.marginal_rate));
    out
}

/// Lists available years, one jurisdiction per line.
pub fn render_years(
    registry: &ScheduleRegistry,
    jurisdiction: Option<&Jurisdiction>,
) -> String {
    let mut out = String::new();
    let jurisdictions: Vec<&Jurisdiction> = match jurisdiction {
        Some(j) => vec![j],
        None => registry.jurisdictions().collect(),
    };

    for j in jurisdictions {
        let years: Vec<String> = registry
            .years(j)
            .iter()
            .map(|y| y.label().to_string())
            .collect();
        let _ = writeln!(out, "{:<18}{}", j.as_str(), years.join(", "));
    }
    out
}

/// JSON shape of `calc --json`.
#[derive(Debug, Serialize)]
pub struct CalcReport<'a> {
    #[serde(flatten)]
    pub assessment: &'a Assessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_period: Option<PeriodBreakdown>,
}

/// JSON shape of `calc --with ... --json`.
#[derive(Debug, Serialize)]
pub struct CombinedReport<'a> {
    #[serde(flatten)]
    pub combined: &'a CombinedAssessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_period: Option<PeriodBreakdown>,
}

/// JSON shape of `bracket --json`.
#[derive(Debug, Serialize)]
pub struct BracketReport<'a> {
    pub amount: Decimal,
    #[serde(flatten)]
    pub result: &'a CalculationResult,
    pub effective_rate: Decimal,
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use tax_core::calculations::compute_bracket_tax;
    use tax_core::{Bracket, BracketTable};

    use super::*;

    #[test]
    fn money_has_thousands_separators() {
        assert_eq!(format_money(dec!(0)), "0.00");
        assert_eq!(format_money(dec!(999.5)), "999.50");
        assert_eq!(format_money(dec!(1000)), "1,000.00");
        assert_eq!(format_money(dec!(22967)), "22,967.00");
        assert_eq!(format_money(dec!(1234567.891)), "1,234,567.89");
        assert_eq!(format_money(dec!(-1500.005)), "-1,500.01");
    }

    #[test]
    fn rates_render_as_percentages() {
        assert_eq!(format_rate(dec!(0.325)), "32.5%");
        assert_eq!(format_rate(dec!(0.10)), "10%");
        assert_eq!(format_rate(dec!(0)), "0%");
        assert_eq!(format_effective_rate(dec!(0.24967)), "24.97%");
    }

    #[test]
    fn bracket_report_lists_every_slice() {
        let table = BracketTable::new(vec![
            Bracket::bounded(dec!(10000), dec!(0.10)),
            Bracket::unbounded(dec!(0.20)),
        ]);
        let result = compute_bracket_tax(dec!(15000), &table);

        let text = render_bracket(dec!(15000), &result);

        assert!(text.contains("0.00 - 10,000.00"));
        assert!(text.contains("10,000.00 and over"));
        assert!(text.contains("2,000.00"));
        assert!(text.contains("13.33%"));
        assert!(text.contains("20%"));
    }

    #[test]
    fn bracket_json_flattens_result() {
        let table = BracketTable::flat(dec!(0.10));
        let result = compute_bracket_tax(dec!(500), &table);
        let report = BracketReport {
            amount: dec!(500),
            result: &result,
            effective_rate: result.effective_rate(dec!(500)),
        };

        let json: serde_json::Value = serde_json::from_str(&to_json(&report).unwrap()).unwrap();

        assert_eq!(json["amount"], "500");
        assert!(json["tax_due"].is_string());
        assert_eq!(json["contributions"].as_array().map(Vec::len), Some(1));
    }
}
