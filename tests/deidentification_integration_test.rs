//! Integration tests for text and record de-identification
//!
//! These tests verify that:
//! - Identifiers covered by the active patterns never survive de-identification
//! - Repeated values map to the same pseudonym within and across records
//! - Output is deterministic for a fixed store
//! - Re-processing output leaves existing pseudonyms alone
//! - A match that loses an overlap still has its remainder de-identified
//! - Non-string fields pass through unchanged

use fake::faker::internet::en::SafeEmail;
use fake::Fake;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use test_case::test_case;
use veil::deidentification::{
    DeidentificationConfig, DeidentificationEngine, EncryptionMode, IdentifierCategory,
    RunStatistics, TextFields,
};
use veil::domain::{CountryCode, CountrySelection};

fn us_engine() -> (DeidentificationEngine, Arc<RunStatistics>) {
    let mut config = DeidentificationConfig::new(EncryptionMode::DisabledForTesting);
    config.countries = CountrySelection::only([CountryCode::US]);
    let stats = Arc::new(RunStatistics::new());
    let engine = DeidentificationEngine::new(config, stats.clone()).unwrap();
    (engine, stats)
}

#[test]
fn test_patient_note_is_fully_deidentified() {
    let (engine, _) = us_engine();
    let outcome = engine
        .deidentify_text("Patient John Doe, MRN: 123456, DOB: 01/15/1980")
        .unwrap();

    assert!(!outcome.text.contains("John Doe"));
    assert!(!outcome.text.contains("123456"));
    assert!(!outcome.text.contains("01/15/1980"));
    assert!(outcome.text.starts_with("Patient [PATIENT-"));
    assert!(outcome.text.contains("MRN: [MRN-"));

    // The DOB keeps its MM/DD/YYYY shape
    let dob = Regex::new(r"DOB: (\d{2})/(\d{2})/(\d{4})$").unwrap();
    let caps = dob.captures(&outcome.text).expect("shifted DOB");
    let month: u32 = caps[1].parse().unwrap();
    assert!((1..=12).contains(&month));

    assert_eq!(outcome.stats.by_category[&IdentifierCategory::FullName], 1);
    assert_eq!(outcome.stats.by_category[&IdentifierCategory::Mrn], 1);
    assert_eq!(outcome.stats.by_category[&IdentifierCategory::Date], 1);
}

#[test]
fn test_detections_do_not_carry_matched_text() {
    let (engine, _) = us_engine();
    let outcome = engine.deidentify_text("MRN: 123456").unwrap();
    let debug = format!("{:?}", outcome.detections);
    assert!(!debug.contains("123456"));
}

#[test]
fn test_same_mrn_in_two_records_gets_same_pseudonym() {
    let (engine, stats) = us_engine();
    let first = engine
        .deidentify_record(json!({"note": "MRN: 123456 admitted"}), &TextFields::All)
        .unwrap();
    let second = engine
        .deidentify_record(json!({"summary": "Follow-up for MRN: 123456"}), &TextFields::All)
        .unwrap();

    let pseudonym = Regex::new(r"\[MRN-[A-Z]+\]").unwrap();
    let a = pseudonym
        .find(first.record["note"].as_str().unwrap())
        .unwrap()
        .as_str()
        .to_string();
    let b = pseudonym
        .find(second.record["summary"].as_str().unwrap())
        .unwrap()
        .as_str()
        .to_string();
    assert_eq!(a, b);

    assert_eq!(stats.records(), 2);
    assert_eq!(engine.mapping_counts().unwrap(), (1, 1));
    let (category, original) = engine.reverse_lookup(&a).unwrap().unwrap();
    assert_eq!(category, IdentifierCategory::Mrn);
    assert_eq!(original, "123456");
}

#[test]
fn test_output_is_deterministic() {
    let (engine, _) = us_engine();
    let text = "Contact jane.roe@example.org or call (555) 123-4567";
    let a = engine.deidentify_text(text).unwrap().text;
    let b = engine.deidentify_text(text).unwrap().text;
    assert_eq!(a, b);
    assert!(!a.contains("jane.roe"));
    assert!(!a.contains("123-4567"));
}

#[test]
fn test_reprocessing_keeps_pseudonyms() {
    let (engine, _) = us_engine();
    let once = engine
        .deidentify_text("Patient Mary Major, email mary@example.com, MRN: 99812")
        .unwrap()
        .text;
    let twice = engine.deidentify_text(&once).unwrap();
    assert_eq!(twice.text, once);
    assert!(twice.detections.is_empty());
}

fn engine_for(countries: CountrySelection) -> DeidentificationEngine {
    let mut config = DeidentificationConfig::new(EncryptionMode::DisabledForTesting);
    config.countries = countries;
    DeidentificationEngine::new(config, Arc::new(RunStatistics::new())).unwrap()
}

#[test_case("city: Springfield Patient John Doe", &["Springfield", "John Doe"]; "city label swallowing a name")]
#[test_case("state: Ohio GHA-123456789-0", &["Ohio", "123456789"]; "state label running into a card number")]
#[test_case("state: Ohio Patient Mary Major", &["Ohio", "Mary Major"]; "state label swallowing a name")]
fn test_overlap_remainder_is_deidentified(text: &str, fragments: &[&str]) {
    let engine = engine_for(CountrySelection::All);
    let output = engine.deidentify_text(text).unwrap().text;
    for fragment in fragments {
        assert!(!output.contains(fragment), "{fragment} survived in {output}");
    }
    let (is_valid, issues) = engine.validate_deidentification(&output).unwrap();
    assert!(is_valid, "residual identifiers: {issues:?}");
}

#[test]
fn test_phone_beside_ssn_is_deidentified() {
    let engine = engine_for(CountrySelection::only([CountryCode::US]));
    let output = engine
        .deidentify_text("+44 7911 123456 123-45-6789")
        .unwrap()
        .text;
    assert!(!output.contains("7911"), "{output}");
    assert!(!output.contains("6789"), "{output}");
    let (is_valid, issues) = engine.validate_deidentification(&output).unwrap();
    assert!(is_valid, "residual identifiers: {issues:?}");
}

#[test]
fn test_generated_identifiers_never_leak() {
    let (engine, _) = us_engine();
    for _ in 0..25 {
        let email: String = SafeEmail().fake();
        let mrn: u32 = (100_000..99_999_999).fake();
        let text = format!("Reach the family at {email}. Hospital number: {mrn}.");

        let output = engine.deidentify_text(&text).unwrap().text;
        assert!(!output.contains(&email));
        assert!(!output.contains(&mrn.to_string()));

        let (is_valid, issues) = engine.validate_deidentification(&output).unwrap();
        assert!(is_valid, "residual identifiers: {issues:?}");
    }
}

#[test]
fn test_validation_flags_raw_text() {
    let (engine, _) = us_engine();
    let (is_valid, issues) = engine
        .validate_deidentification("Record 1234567890 was reviewed")
        .unwrap();
    assert!(!is_valid);
    assert_eq!(issues[0].category, IdentifierCategory::Mrn);
}

#[test]
fn test_record_non_string_fields_pass_through() {
    let (engine, _) = us_engine();
    let record = json!({
        "visit": 3,
        "inpatient": true,
        "discharged": null,
        "note": "Seen by Dr. Alan Grant",
        "vitals": {"pulse": 72, "comment": "email alan@example.com"},
        "tags": ["routine", "MRN: 445566"]
    });

    let outcome = engine.deidentify_record(record, &TextFields::All).unwrap();
    let out = &outcome.record;
    assert_eq!(out["visit"], 3);
    assert_eq!(out["inpatient"], true);
    assert!(out["discharged"].is_null());
    assert_eq!(out["vitals"]["pulse"], 72);
    assert!(!out["note"].as_str().unwrap().contains("Alan Grant"));
    assert!(!out["vitals"]["comment"].as_str().unwrap().contains("alan@"));
    assert!(!out["tags"][1].as_str().unwrap().contains("445566"));
    assert_eq!(out["tags"][0], "routine");
}

#[test]
fn test_named_fields_leave_others_untouched() {
    let (engine, _) = us_engine();
    let record = json!({
        "note": "MRN: 123456",
        "source_file": "MRN: 123456"
    });
    let fields = TextFields::Named(vec!["note".to_string()]);

    let outcome = engine.deidentify_record(record, &fields).unwrap();
    assert!(!outcome.record["note"].as_str().unwrap().contains("123456"));
    assert_eq!(outcome.record["source_file"], "MRN: 123456");
}

#[test]
fn test_record_key_order_is_preserved() {
    let (engine, _) = us_engine();
    let record = json!({"z": "a", "a": "MRN: 123456", "m": 1});
    let outcome = engine.deidentify_record(record, &TextFields::All).unwrap();
    let keys: Vec<&String> = outcome.record.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["z", "a", "m"]);
}
