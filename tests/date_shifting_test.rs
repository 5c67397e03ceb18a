//! Integration tests for date shifting through the engine
//!
//! Covers ambiguous day/month resolution per country, interval preservation
//! across one run, format preservation and the unparsed-date placeholder.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::Arc;
use test_case::test_case;
use veil::deidentification::date_shift::parse_date;
use veil::deidentification::{
    DeidentificationConfig, DeidentificationEngine, EncryptionMode, RunStatistics,
};
use veil::domain::{ComponentOrder, CountryCode, CountrySelection};

fn engine_for(country: CountryCode) -> DeidentificationEngine {
    let mut config = DeidentificationConfig::new(EncryptionMode::DisabledForTesting);
    config.countries = CountrySelection::only([country]);
    config.date_shift_range_days = 200;
    DeidentificationEngine::new(config, Arc::new(RunStatistics::new())).unwrap()
}

fn dates_in(text: &str, format: &str) -> Vec<NaiveDate> {
    let re = Regex::new(r"\d{1,4}[/.-]\d{1,2}[/.-]\d{2,4}").unwrap();
    re.find_iter(text)
        .map(|m| NaiveDate::parse_from_str(m.as_str(), format).unwrap())
        .collect()
}

#[test_case(CountryCode::IN; "india prefers day first")]
#[test_case(CountryCode::US; "us falls back to day first")]
fn test_ambiguous_date_resolves_to_thirteenth_of_may(country: CountryCode) {
    let (date, _) = parse_date("13/05/2020", country.date_order()).unwrap();
    assert_eq!(date, NaiveDate::from_ymd_opt(2020, 5, 13).unwrap());

    // Both dates of the note are read day-first, so the interval survives
    let engine = engine_for(country);
    let output = engine
        .deidentify_text("Admitted 13/05/2020, discharged 20/05/2020.")
        .unwrap()
        .text;
    let shifted = dates_in(&output, "%d/%m/%Y");
    assert_eq!(shifted.len(), 2);
    assert_eq!((shifted[1] - shifted[0]).num_days(), 7);
    assert_ne!(shifted[0], date);
}

#[test]
fn test_intervals_preserved_across_texts_in_one_run() {
    let engine = engine_for(CountryCode::GB);
    let first = engine.deidentify_text("Seen 2019-11-30").unwrap().text;
    let second = engine.deidentify_text("Reviewed 2020-03-01").unwrap().text;

    let a = dates_in(&first, "%Y-%m-%d")[0];
    let b = dates_in(&second, "%Y-%m-%d")[0];
    let original = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()
        - NaiveDate::from_ymd_opt(2019, 11, 30).unwrap();
    assert_eq!(b - a, original);
}

#[test]
fn test_reprocessing_shifts_dates_again() {
    let engine = engine_for(CountryCode::GB);
    let once = engine.deidentify_text("Seen 2019-11-30").unwrap().text;
    let twice = engine.deidentify_text(&once).unwrap().text;

    let d0 = NaiveDate::from_ymd_opt(2019, 11, 30).unwrap();
    let d1 = dates_in(&once, "%Y-%m-%d")[0];
    let d2 = dates_in(&twice, "%Y-%m-%d")[0];
    assert_ne!(d1, d0);
    assert_eq!(d2 - d1, d1 - d0);
}

#[test_case(CountryCode::US, "Visit on 01/15/1980", r"Visit on \d{2}/\d{2}/\d{4}$"; "month first slashes")]
#[test_case(CountryCode::GB, "Visit on 15.01.1980", r"Visit on \d{2}\.\d{2}\.\d{4}$"; "day first dots")]
#[test_case(CountryCode::KE, "Visit on 15-01-1980", r"Visit on \d{2}-\d{2}-\d{4}$"; "day first dashes")]
#[test_case(CountryCode::BR, "Visit on 1980/01/15", r"Visit on \d{4}/\d{2}/\d{2}$"; "year first slashes")]
fn test_format_is_preserved(country: CountryCode, input: &str, shape: &str) {
    let engine = engine_for(country);
    let output = engine.deidentify_text(input).unwrap().text;
    assert_ne!(output, input);
    assert!(Regex::new(shape).unwrap().is_match(&output), "{output}");
}

#[test]
fn test_shift_stays_within_range() {
    let engine = engine_for(CountryCode::ZA);
    let output = engine.deidentify_text("Baseline 2021-06-15").unwrap().text;
    let shifted = dates_in(&output, "%Y-%m-%d")[0];
    let delta = (shifted - NaiveDate::from_ymd_opt(2021, 6, 15).unwrap()).num_days();
    assert!(delta != 0 && delta.abs() <= 200);
}

#[test]
fn test_textual_month_becomes_placeholder() {
    let engine = engine_for(CountryCode::AU);
    let outcome = engine.deidentify_text("Consent signed 3 March 2021").unwrap();
    assert!(outcome.text.contains("[DATE-"));
    assert!(!outcome.text.contains("March"));
    assert_eq!(outcome.stats.unparsed_dates, 1);
}

#[test]
fn test_dates_pseudonymized_when_shifting_disabled() {
    let mut config = DeidentificationConfig::new(EncryptionMode::DisabledForTesting);
    config.countries = CountrySelection::only([CountryCode::US]);
    config.enable_date_shifting = false;
    let engine = DeidentificationEngine::new(config, Arc::new(RunStatistics::new())).unwrap();

    let output = engine.deidentify_text("DOB: 01/15/1980").unwrap().text;
    assert!(output.starts_with("DOB: [DATE-"));
}

#[test]
fn test_symmetric_date_uses_country_preference() {
    let (date, _) = parse_date("04/04/2020", ComponentOrder::MonthFirst).unwrap();
    assert_eq!(date, NaiveDate::from_ymd_opt(2020, 4, 4).unwrap());
}
