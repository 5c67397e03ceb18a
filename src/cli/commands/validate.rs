//! Validate command implementation
//!
//! This module implements the `validate` command, which re-scans an already
//! de-identified output tree for residual identifiers without touching the
//! mapping store.

use crate::cli::commands::load_settings;
use crate::core::validation::validate_dataset;
use crate::deidentification::{EncryptionMode, Validator};
use crate::domain::{CountrySelection, DeidError};
use clap::Args;
use std::path::PathBuf;

/// Arguments for the validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Root of the de-identified output tree
    #[arg(long, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Country codes to scan for (comma-separated, or ALL)
    #[arg(long, value_name = "CODES")]
    pub countries: Option<String>,

    /// Where to write the report (defaults to <output-dir>/_deidentification/validation_report.json)
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

impl ValidateArgs {
    /// Execute the validate command
    pub async fn execute(&self, config_path: Option<&str>) -> anyhow::Result<i32> {
        tracing::info!(output_dir = %self.output_dir.display(), "Validating output");

        let settings = match load_settings(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let mut deid = settings.deidentification.clone();
        if let Some(countries) = &self.countries {
            match countries.parse::<CountrySelection>() {
                Ok(selection) => deid.countries = selection,
                Err(e) => {
                    eprintln!("Invalid --countries: {e}");
                    return Ok(2);
                }
            }
        }

        // The validator never opens the store, so the key is not loaded here
        let built = deid
            .to_engine_config(EncryptionMode::Enabled(deid.encryption.key_provider()))
            .and_then(|config| Validator::from_config(&config))
            .and_then(|validator| Ok((validator, settings.dataset.to_options()?)));
        let (validator, mut options) = match built {
            Ok(built) => built,
            Err(e) => {
                eprintln!("Configuration validation failed: {e}");
                return Ok(2);
            }
        };
        if self.report.is_some() {
            options.report_path = self.report.clone();
        }

        println!("🔍 Validating {}", self.output_dir.display());
        println!();

        let output_dir = self.output_dir.clone();
        let scan_options = options.clone();
        let scanned = tokio::task::spawn_blocking(move || {
            validate_dataset(&output_dir, &validator, &scan_options)
        })
        .await
        .map_err(|e| DeidError::Aborted(format!("Validation task failed: {e}")));

        let report = match scanned.and_then(|result| result) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Validation failed");
                eprintln!("Validation failed: {e}");
                return Ok(match e {
                    DeidError::Config(_) => 2,
                    _ => 5, // Fatal error exit code
                });
            }
        };

        let report_path = options.report_path_for(&self.output_dir);
        report.write(&report_path)?;

        println!("  Files scanned: {}", report.files_scanned);
        println!("  Records scanned: {}", report.records_scanned);
        println!("  Duration: {:.2}s", report.duration_ms as f64 / 1000.0);
        println!("  Report: {}", report_path.display());
        println!();

        if report.is_valid {
            println!("✅ No residual identifiers found");
            return Ok(0);
        }

        if report.fields_unscanned > 0 {
            println!("⚠️  {} field(s) could not be scanned", report.fields_unscanned);
        }
        println!("⚠️  {} residual identifier(s) found:", report.issues.len());
        for file in report.affected_files() {
            let count = report.issues.iter().filter(|i| i.file == file).count();
            println!("  - {file} ({count})");
        }
        println!();
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_validate_missing_config_file() {
        let dir = TempDir::new().unwrap();
        let args = ValidateArgs {
            output_dir: dir.path().to_path_buf(),
            countries: None,
            report: None,
        };
        let code = args
            .execute(Some("missing-config-for-validate-test.toml"))
            .await
            .unwrap();
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn test_validate_reports_residual_identifier() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("veil.toml");
        std::fs::write(&config_path, "[deidentification]\ncountries = [\"US\"]\n").unwrap();
        let output = dir.path().join("out");
        std::fs::create_dir_all(&output).unwrap();
        std::fs::write(
            output.join("visits.jsonl"),
            "{\"note\":\"Seen by [PATIENT-QWERTYUIOP]\"}\n{\"note\":\"MRN: 12345678\"}\n",
        )
        .unwrap();

        let args = ValidateArgs {
            output_dir: output.clone(),
            countries: None,
            report: Some(dir.path().join("report.json")),
        };
        let code = args.execute(config_path.to_str()).await.unwrap();
        assert_eq!(code, 1);
        assert!(dir.path().join("report.json").exists());
    }
}
