//! Integration tests running assessments against the bundled reference data.

use std::sync::LazyLock;

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tax_core::calculations::{
    Assessment, AssessmentError, AssessmentRequest, Deduction, assess, assess_combined,
};
use tax_core::{FallbackPolicy, Residency, ScheduleRegistry, SelectionError, TaxYear};
use tax_data::{BUNDLED_BRACKETS, BUNDLED_SCHEDULES, TaxDataError, bundled_registry, load_registry};

static REGISTRY: LazyLock<ScheduleRegistry> =
    LazyLock::new(|| bundled_registry().expect("bundled data should load"));

fn request(
    jurisdiction: &str,
    tax_year: &str,
    category: &str,
    gross: Decimal,
) -> AssessmentRequest {
    AssessmentRequest::new(
        jurisdiction.parse().unwrap(),
        tax_year.parse().unwrap(),
        category.parse().unwrap(),
        gross,
    )
}

fn run(request: &AssessmentRequest) -> Assessment {
    assess(&REGISTRY, request).expect("assessment should succeed")
}

fn modifier(
    assessment: &Assessment,
    name: &str,
) -> Decimal {
    assessment
        .modifiers
        .iter()
        .find(|m| m.name == name)
        .map(|m| m.amount)
        .unwrap_or_else(|| panic!("modifier {name} not applied"))
}

// =============================================================================
// Registry contents
// =============================================================================

#[test]
fn test_bundled_registry_loads() {
    let jurisdictions: Vec<&str> = REGISTRY.jurisdictions().map(|j| j.as_str()).collect();

    for expected in ["AU", "NZ", "US-FED", "US-CA", "UK", "UK-NI", "UK-SDLT", "US-WA-TRANSFER"] {
        assert!(jurisdictions.contains(&expected), "missing {expected}");
    }
}

#[test]
fn test_australian_years_span_four_decades() {
    let years = REGISTRY.years(&"AU".parse().unwrap());
    let labels: Vec<&str> = years.iter().map(TaxYear::label).collect();

    assert_eq!(years.len(), 43);
    assert_eq!(labels.first(), Some(&"1983-1984"));
    assert_eq!(labels.last(), Some(&"2025-2026"));
}

// =============================================================================
// Australia
// =============================================================================

#[test]
fn test_au_2023_resident() {
    let assessment = run(&request("AU", "2023-2024", "resident", dec!(100000)));

    assert_eq!(assessment.bracket_tax, dec!(22967));
    assert_eq!(modifier(&assessment, "medicare_levy"), dec!(2000));
    assert_eq!(assessment.total_tax, dec!(24967));
    assert_eq!(assessment.net, dec!(75033));
}

#[test]
fn test_au_2024_stage_three_rates() {
    let assessment = run(&request("AU", "2024-2025", "resident", dec!(100000)));

    // 26800 * 0.16 + 55000 * 0.30
    assert_eq!(assessment.bracket_tax, dec!(20788));
    assert_eq!(assessment.total_tax, dec!(22788));
    assert_eq!(assessment.marginal_rate, dec!(0.30));
}

#[test]
fn test_au_non_resident_has_no_threshold_or_levy() {
    let request = request("AU", "2023-2024", "resident", dec!(100000))
        .with_residency(Residency::NonResident);

    let assessment = run(&request);

    assert_eq!(assessment.total_tax, dec!(32500));
    assert!(assessment.modifiers.is_empty());
}

#[test]
fn test_au_part_year_modern_threshold() {
    let request = request("AU", "2023-2024", "resident", dec!(50000))
        .with_residency(Residency::part_year(6).unwrap());

    let assessment = run(&request);

    // threshold 13464 + 4736 / 2 = 15832
    // (45000 - 15832) * 0.19 + 5000 * 0.325
    assert_eq!(assessment.bracket_tax, dec!(7166.92));
    assert_eq!(modifier(&assessment, "medicare_levy"), dec!(500));
}

#[test]
fn test_au_part_year_legacy_threshold() {
    let request = request("AU", "2010-2011", "resident", dec!(30000))
        .with_residency(Residency::part_year(6).unwrap());

    let assessment = run(&request);

    // threshold 6000 / 2 = 3000
    assert_eq!(assessment.bracket_tax, dec!(4050));
    // 30000 * 0.015 / 2
    assert_eq!(modifier(&assessment, "medicare_levy"), dec!(225));
}

#[test]
fn test_au_part_year_legacy_threshold_odd_months() {
    let request = request("AU", "2011-2012", "resident", dec!(30000))
        .with_residency(Residency::part_year(7).unwrap());

    let assessment = run(&request);

    // threshold 6000 * 7 / 12 = 3500
    assert_eq!(assessment.bracket_tax, dec!(3975));
    // 30000 * 0.015 * 7 / 12
    assert_eq!(modifier(&assessment, "medicare_levy"), dec!(262.50));
}

#[test]
fn test_au_legacy_threshold_selection_by_month() {
    let select = |months: u8| {
        REGISTRY
            .select_bracket_table(
                &"AU".parse().unwrap(),
                &"2011-2012".parse().unwrap(),
                &"any".parse().unwrap(),
                Residency::part_year(months).unwrap(),
            )
            .unwrap()
            .first_upper_bound()
    };

    assert_eq!(select(1), Some(dec!(500)));
    assert_eq!(select(7), Some(dec!(3500)));
    assert_eq!(select(12), Some(dec!(6000)));
}

#[test]
fn test_au_2016_budget_repair_top_rate() {
    let assessment = run(&request("AU", "2016-2017", "resident", dec!(200000)));

    assert_eq!(assessment.marginal_rate, dec!(0.47));
    assert_eq!(assessment.bracket_tax, dec!(63632));
}

#[test]
fn test_au_missing_year_lists_available() {
    let err = assess(&REGISTRY, &request("AU", "1950-1951", "resident", dec!(1000))).unwrap_err();

    match err {
        AssessmentError::Selection(SelectionError::YearNotFound { available, .. }) => {
            assert_eq!(available.len(), 43);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_au_fallback_to_latest_year() {
    let request = request("AU", "2030-2031", "resident", dec!(100000))
        .with_fallback(FallbackPolicy::LatestAvailable);

    let assessment = run(&request);

    assert!(assessment.year.fell_back);
    assert_eq!(assessment.year.resolved.label(), "2025-2026");
    assert_eq!(assessment.total_tax, dec!(22788));
}

// =============================================================================
// New Zealand
// =============================================================================

#[test]
fn test_nz_2026_phase_out_band() {
    let assessment = run(&request("NZ", "2026", "any", dec!(68000)));

    // 15600 * 0.105 + 37900 * 0.175 + 14500 * 0.30
    assert_eq!(assessment.bracket_tax, dec!(12620.50));
    assert_eq!(modifier(&assessment, "acc_levy"), dec!(1135.60));
    // 520 - 2000 * 0.13
    assert_eq!(modifier(&assessment, "ietc"), dec!(260));
    assert_eq!(assessment.total_tax, dec!(13496.10));
    assert_eq!(assessment.contributions, dec!(2040));
    assert_eq!(assessment.net, dec!(52463.90));
}

#[test]
fn test_nz_kiwisaver_can_be_disabled() {
    let request = request("NZ", "2026", "any", dec!(68000)).with_toggle("kiwisaver", false);

    let assessment = run(&request);

    assert_eq!(assessment.contributions, Decimal::ZERO);
    assert_eq!(assessment.net, dec!(54503.90));
}

#[test]
fn test_nz_acc_levy_is_capped() {
    let assessment = run(&request("NZ", "2025", "any", dec!(200000)));

    // 142283 * 0.0160
    assert_eq!(modifier(&assessment, "acc_levy"), dec!(2276.53));
}

// =============================================================================
// United States
// =============================================================================

#[test]
fn test_us_federal_single_with_standard_deduction() {
    let request = request("US-FED", "2026", "single", dec!(100000)).with_deduction(Deduction::Standard);

    let assessment = run(&request);

    assert_eq!(assessment.taxable, dec!(83900));
    assert_eq!(assessment.bracket_tax, dec!(13170));
    assert_eq!(modifier(&assessment, "social_security"), dec!(6200));
    assert_eq!(modifier(&assessment, "medicare"), dec!(1450));
    assert_eq!(modifier(&assessment, "additional_medicare"), Decimal::ZERO);
    assert_eq!(assessment.total_tax, dec!(20820));
    assert_eq!(assessment.net, dec!(79180));
}

#[test]
fn test_us_federal_fica_and_state_combined() {
    let request = request("US-FED", "2026", "single", dec!(100000)).with_deduction(Deduction::Standard);
    let layers = ["US-CA".parse().unwrap(), "US-TX".parse().unwrap()];

    let combined = assess_combined(&REGISTRY, &request, &layers).unwrap();

    assert_eq!(combined.primary.total_tax, dec!(20820));
    // California brackets walked over the federal taxable amount
    assert_eq!(combined.layers[0].taxable, dec!(83900));
    assert_eq!(combined.layers[0].total_tax, dec!(4455.55));
    assert_eq!(combined.layers[1].total_tax, Decimal::ZERO);
    assert_eq!(combined.total_tax, dec!(25275.55));
    assert_eq!(combined.net, dec!(74724.45));
}

#[test]
fn test_us_federal_married_two_earners() {
    let request = request("US-FED", "2026", "married", dec!(400000))
        .with_deduction(Deduction::Standard)
        .with_earners(2);

    let assessment = run(&request);

    assert_eq!(assessment.taxable, dec!(367800));
    assert_eq!(assessment.bracket_tax, dec!(73468));
    // each earner's 200000 is capped at 184500
    assert_eq!(modifier(&assessment, "social_security"), dec!(22878));
    assert_eq!(modifier(&assessment, "additional_medicare"), dec!(1350));
    assert_eq!(assessment.total_tax, dec!(103496));
}

#[test]
fn test_us_state_married_brackets_are_doubled() {
    let single = run(&request("US-CA", "2026", "single", dec!(50000)));
    let married = run(&request("US-CA", "2026", "married", dec!(50000)));

    assert_eq!(single.bracket_tax, dec!(1623.02));
    assert_eq!(married.bracket_tax, dec!(804.40));
}

#[test]
fn test_us_flat_and_untaxed_states() {
    let illinois = run(&request("US-IL", "2026", "single", dec!(80000)));
    let texas = run(&request("US-TX", "2026", "married", dec!(80000)));

    assert_eq!(illinois.total_tax, dec!(3960));
    assert_eq!(texas.total_tax, Decimal::ZERO);
    assert_eq!(texas.net, dec!(80000));
}

#[test]
fn test_us_graduated_transfer_tax() {
    let assessment = run(&request("US-WA-TRANSFER", "2026", "any", dec!(1000000)));

    // 525000 * 0.011 + 475000 * 0.0128
    assert_eq!(assessment.total_tax, dec!(11855));
}

#[test]
fn test_us_ny_transfer_with_mansion_tax() {
    let assessment = run(&request("US-NY-TRANSFER", "2026", "any", dec!(2000000)));

    assert_eq!(assessment.bracket_tax, dec!(8000));
    assert_eq!(modifier(&assessment, "mansion_tax"), dec!(25000));
    assert_eq!(assessment.total_tax, dec!(33000));
}

#[test]
fn test_us_ny_transfer_below_mansion_threshold() {
    let assessment = run(&request("US-NY-TRANSFER", "2026", "any", dec!(999999)));

    assert_eq!(modifier(&assessment, "mansion_tax"), Decimal::ZERO);
    assert_eq!(assessment.total_tax, dec!(4000.00));
}

#[test]
fn test_us_transfer_county_estimate() {
    let california = run(&request("US-CA-TRANSFER", "2026", "any", dec!(1000000)));
    let pennsylvania = run(&request("US-PA-TRANSFER", "2026", "any", dec!(300000)));

    assert_eq!(modifier(&california, "county_estimate"), dec!(1100));
    assert_eq!(california.total_tax, dec!(2200));
    assert_eq!(pennsylvania.total_tax, dec!(6000));
}

// =============================================================================
// United Kingdom
// =============================================================================

#[test]
fn test_uk_income_tax_allowance_taper() {
    let assessment = run(&request("UK", "2026-27", "any", dec!(110000)));

    assert_eq!(assessment.bracket_tax, dec!(31432));
    assert_eq!(modifier(&assessment, "personal_allowance_taper"), dec!(2000));
    assert_eq!(assessment.total_tax, dec!(33432));
}

#[test]
fn test_uk_income_tax_taper_is_exhausted() {
    let assessment = run(&request("UK", "2026-27", "any", dec!(200000)));

    assert_eq!(modifier(&assessment, "personal_allowance_taper"), dec!(5028));
    assert_eq!(assessment.total_tax, dec!(76203));
}

#[test]
fn test_uk_national_insurance_employee_and_employer() {
    let employee = run(&request("UK-NI", "2026-27", "A", dec!(60000)));
    let employer = run(&request("UK-NI-EMPLOYER", "2026-27", "A", dec!(60000)));
    let under_21 = run(&request("UK-NI-EMPLOYER", "2026-27", "M", dec!(60000)));

    assert_eq!(employee.total_tax, dec!(3210.60));
    assert_eq!(employer.total_tax, dec!(8250));
    // (60000 - 50270) * 0.15
    assert_eq!(under_21.total_tax, dec!(1459.50));
}

#[test]
fn test_uk_sdlt_first_time_buyer_relief() {
    let standard = run(&request("UK-SDLT", "2025-2026", "standard", dec!(300000)));
    let relieved = run(&request("UK-SDLT", "2025-2026", "first_time_buyer", dec!(450000)));

    assert_eq!(standard.total_tax, dec!(5000));
    assert_eq!(relieved.total_tax, dec!(7500));
    assert_eq!(relieved.applied_category.as_str(), "first_time_buyer");
}

#[test]
fn test_uk_sdlt_first_time_buyer_limit() {
    let assessment = run(&request("UK-SDLT", "2025-2026", "first_time_buyer", dec!(600000)));

    assert_eq!(assessment.requested_category.as_str(), "first_time_buyer");
    assert_eq!(assessment.applied_category.as_str(), "standard");
    assert_eq!(assessment.total_tax, dec!(20000));
}

#[test]
fn test_uk_sdlt_surcharges_are_opt_in() {
    let request = request("UK-SDLT", "2025-2026", "standard", dec!(300000))
        .with_toggle("additional_property", true)
        .with_toggle("non_uk_resident", true);

    let assessment = run(&request);

    assert_eq!(modifier(&assessment, "additional_property"), dec!(15000));
    assert_eq!(modifier(&assessment, "non_uk_resident"), dec!(6000));
    assert_eq!(assessment.total_tax, dec!(26000));
}

// =============================================================================
// Duplicate definitions
// =============================================================================

#[test]
fn test_duplicate_bracket_rows_are_rejected() {
    let brackets = format!("{BUNDLED_BRACKETS}AU,2023-2024,any,resident,,0.50\n");

    let err = load_registry(&brackets, BUNDLED_SCHEDULES).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Bracket table AU 2023-2024 any/resident appears more than once"
    );
}

#[test]
fn test_duplicate_schedule_is_rejected() {
    let schedules = format!("{BUNDLED_SCHEDULES}\n[[schedule]]\njurisdiction = \"NZ\"\ntax_year = \"2026\"\n");

    let err = load_registry(BUNDLED_BRACKETS, &schedules).unwrap_err();

    assert!(matches!(err, TaxDataError::DuplicateSchedule { .. }));
}
