//! Integration tests for configuration loading and validation
//!
//! Note: Tests that modify environment variables should be run with --test-threads=1
//! to avoid interference between tests.

use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;
use veil::config::{load_config, load_default_config, KeySource};
use veil::core::dataset::PersistMode;
use veil::deidentification::{EncryptionMode, TextFields, Validator};
use veil::domain::{CountryCode, CountrySelection, DeidError};

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Helper function to clean up environment variables
fn cleanup_env_vars() {
    std::env::remove_var("VEIL_APPLICATION_LOG_LEVEL");
    std::env::remove_var("VEIL_DEIDENTIFICATION_COUNTRIES");
    std::env::remove_var("VEIL_DEIDENTIFICATION_DATE_SHIFT_RANGE_DAYS");
    std::env::remove_var("VEIL_DEIDENTIFICATION_STRICT_MODE");
    std::env::remove_var("VEIL_DEIDENTIFICATION_KEY_SOURCE");
    std::env::remove_var("VEIL_DATASET_WORKERS");
    std::env::remove_var("VEIL_DATASET_PERSIST_MODE");
    std::env::remove_var("TEST_STUDY_SALT");
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(contents.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    let toml_content = r#"
[application]
log_level = "debug"

[deidentification]
countries = ["US", "GB", "KE"]
enable_date_shifting = true
date_shift_range_days = 180
preserve_date_intervals = true
enable_validation = false
strict_mode = true
mapping_path = "/secure/study42/mappings.enc"

[deidentification.encryption]
key_source = "file"
key_file = "/secure/study42/mapping.key"

[deidentification.templates]
FULL_NAME = "[SUBJECT-{token}]"

[[deidentification.custom_patterns]]
name = "trial_subject"
category = "CUSTOM"
regex = '\bTRIAL-\d{4}\b'
priority = 95

[dataset]
subdirectories = ["original", "cleaned"]
extensions = [".jsonl"]
text_fields = ["note", "summary"]
workers = 8
persist_mode = "after_each_file"

[logging]
local_enabled = true
local_path = "/var/log/veil"
local_rotation = "hourly"
"#;
    let temp_file = write_config(toml_content);

    let config = load_config(temp_file.path()).unwrap();

    assert_eq!(config.application.log_level, "debug");
    let deid = &config.deidentification;
    assert!(deid.countries.includes(CountryCode::KE));
    assert!(!deid.countries.includes(CountryCode::IN));
    assert_eq!(deid.date_shift_range_days, 180);
    assert!(!deid.enable_validation);
    assert_eq!(deid.encryption.key_source, KeySource::File);
    assert_eq!(deid.encryption.key_file, "/secure/study42/mapping.key");

    let engine_config = deid
        .to_engine_config(EncryptionMode::Enabled(deid.encryption.key_provider()))
        .unwrap();
    assert!(engine_config.strict_mode);
    assert!(engine_config.enable_encryption());
    assert_eq!(engine_config.custom_patterns.len(), 1);
    assert_eq!(
        engine_config.mapping_path.as_deref(),
        Some(std::path::Path::new("/secure/study42/mappings.enc"))
    );

    let options = config.dataset.to_options().unwrap();
    assert_eq!(options.workers, 8);
    assert_eq!(options.extensions, vec!["jsonl".to_string()]);
    assert_eq!(options.persist_mode, PersistMode::AfterEachFile);
    assert_eq!(
        options.text_fields,
        TextFields::Named(vec!["note".to_string(), "summary".to_string()])
    );

    assert!(config.logging.local_enabled);
    assert_eq!(config.logging.local_rotation, "hourly");
}

#[test]
fn test_env_var_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("TEST_STUDY_SALT", "study-42-salt");

    let temp_file = write_config(
        r#"
[deidentification]
countries = ["ZA"]
salt = "${TEST_STUDY_SALT}"
"#,
    );

    let config = load_config(temp_file.path()).unwrap();
    let salt = config.deidentification.salt.as_ref().unwrap();
    assert_eq!(salt.expose_secret().as_ref(), "study-42-salt");
    assert!(!format!("{:?}", config.deidentification).contains("study-42-salt"));

    cleanup_env_vars();
}

#[test]
fn test_missing_substitution_variable_is_config_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let temp_file = write_config("[deidentification]\nsalt = \"${TEST_STUDY_SALT}\"\n");
    let err = load_config(temp_file.path()).unwrap_err();
    assert!(matches!(err, DeidError::Config(msg) if msg.contains("TEST_STUDY_SALT")));
}

#[test]
fn test_env_overrides_take_precedence() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("VEIL_DEIDENTIFICATION_COUNTRIES", "IN,BR");
    std::env::set_var("VEIL_DEIDENTIFICATION_STRICT_MODE", "true");
    std::env::set_var("VEIL_DATASET_WORKERS", "2");
    std::env::set_var("VEIL_DATASET_PERSIST_MODE", "at_end");
    std::env::set_var("VEIL_DEIDENTIFICATION_KEY_SOURCE", "env");

    let temp_file = write_config(
        r#"
[deidentification]
countries = ["US"]

[dataset]
workers = 6
"#,
    );

    let config = load_config(temp_file.path()).unwrap();
    cleanup_env_vars();

    let deid = &config.deidentification;
    assert_eq!(
        deid.countries,
        CountrySelection::only([CountryCode::IN, CountryCode::BR])
    );
    assert!(deid.strict_mode);
    assert_eq!(deid.encryption.key_source, KeySource::Env);
    assert_eq!(config.dataset.workers, 2);
    assert_eq!(
        config.dataset.to_options().unwrap().persist_mode,
        PersistMode::AtEnd
    );
}

#[test]
fn test_invalid_override_value_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("VEIL_DEIDENTIFICATION_DATE_SHIFT_RANGE_DAYS", "a fortnight");

    let result = load_default_config();
    cleanup_env_vars();
    assert!(matches!(result, Err(DeidError::Config(_))));
}

#[test]
fn test_invalid_config_values() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let cases = [
        "[deidentification]\ncountries = [\"XX\"]\n",
        "[deidentification]\ndate_shift_range_days = 0\n",
        "[deidentification.templates]\nMRN = \"[MRN]\"\n",
        "[dataset]\nworkers = 0\n",
        "[dataset]\npersist_mode = \"sometimes\"\n",
        "[logging]\nlocal_rotation = \"weekly\"\n",
        "[application]\nlog_level = \"verbose\"\n",
    ];
    for case in cases {
        let temp_file = write_config(case);
        let result = load_config(temp_file.path()).and_then(|config| {
            config
                .deidentification
                .to_engine_config(EncryptionMode::DisabledForTesting)
                .and_then(|engine_config| Validator::from_config(&engine_config))
                .map(|_| config)
        });
        assert!(result.is_err(), "accepted invalid config: {case}");
    }
}

#[test]
fn test_defaults_without_file() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let config = load_default_config().unwrap();
    assert_eq!(config.deidentification.countries, CountrySelection::All);
    assert!(config.deidentification.enable_date_shifting);
    assert!(config.deidentification.enable_validation);
    assert_eq!(config.dataset.workers, 4);

    let options = config.dataset.to_options().unwrap();
    assert_eq!(options.text_fields, TextFields::All);
    assert_eq!(options.persist_mode, PersistMode::AfterEachFile);
}
