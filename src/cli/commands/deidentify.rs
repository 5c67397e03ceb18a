//! Deidentify command implementation
//!
//! This module implements the `deidentify` command, which turns `veil.toml`
//! plus command-line overrides into a [`DeidentificationConfig`] and runs the
//! dataset orchestrator.

use crate::cli::commands::load_settings;
use crate::config::VeilConfig;
use crate::core::dataset::{deidentify_dataset, DatasetOptions, DatasetSummary};
use crate::deidentification::{DeidentificationConfig, EncryptionMode};
use crate::domain::{CountrySelection, DeidError};
use clap::Args;
use std::path::PathBuf;
use tokio::sync::watch;

/// Arguments for the deidentify command
#[derive(Args, Debug)]
pub struct DeidentifyArgs {
    /// Root of the raw record files
    #[arg(long, value_name = "DIR")]
    pub input_dir: PathBuf,

    /// Root of the de-identified output tree
    #[arg(long, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Country codes to activate (comma-separated, or ALL)
    #[arg(long, value_name = "CODES")]
    pub countries: Option<String>,

    /// Re-scan the output after processing, even if `enable_validation = false`
    ///
    /// Validation is on by default; `--no-validate` turns it off for this run.
    #[arg(long, overrides_with = "no_validate")]
    pub validate: bool,

    /// Skip the post-run residual identifier scan
    #[arg(long, overrides_with = "validate")]
    pub no_validate: bool,

    /// Store mappings in plaintext (testing only, never on real data)
    #[arg(long)]
    pub no_encryption: bool,

    /// Abort on the first recoverable error
    #[arg(long)]
    pub strict: bool,

    /// Only process these subdirectories of the input root (repeatable)
    #[arg(long, value_name = "NAME")]
    pub subdir: Vec<String>,

    /// Mapping store file (defaults to <output-dir>/_deidentification/mappings.enc)
    #[arg(long, value_name = "FILE")]
    pub mapping_file: Option<PathBuf>,
}

impl DeidentifyArgs {
    /// Execute the deidentify command
    pub async fn execute(
        &self,
        config_path: Option<&str>,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting deidentify command");

        let settings = match load_settings(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let (config, options) = match self.build(&settings) {
            Ok(built) => built,
            Err(e) => {
                tracing::error!(error = %e, "Configuration validation failed");
                eprintln!("Configuration validation failed: {e}");
                return Ok(2); // Configuration error exit code
            }
        };
        let options = options.with_shutdown(shutdown_signal);

        println!("🔐 De-identifying {}", self.input_dir.display());
        println!("  Output: {}", self.output_dir.display());
        println!("  Countries: {}", config.countries);
        if !config.enable_encryption() {
            println!("  ⚠️  Mapping store encryption DISABLED (testing only)");
        }
        println!();

        let summary =
            match deidentify_dataset(&self.input_dir, &self.output_dir, config, options).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "De-identification failed");
                    eprintln!("De-identification failed: {e}");
                    return Ok(match e {
                        DeidError::Config(_) => 2, // Configuration error exit code
                        DeidError::Store(_) => 3,  // Mapping store error exit code
                        _ => 5,                    // Fatal error exit code
                    });
                }
            };

        Ok(report(&summary))
    }

    /// Merge command-line flags over the loaded settings
    fn build(
        &self,
        settings: &VeilConfig,
    ) -> crate::domain::Result<(DeidentificationConfig, DatasetOptions)> {
        let mut deid = settings.deidentification.clone();

        if let Some(countries) = &self.countries {
            let selection: CountrySelection = countries.parse().map_err(DeidError::Config)?;
            tracing::info!(countries = %selection, "Overriding countries from CLI");
            deid.countries = selection;
        }
        if self.validate {
            deid.enable_validation = true;
        } else if self.no_validate {
            tracing::info!("Skipping output validation (--no-validate)");
            deid.enable_validation = false;
        }
        if self.strict {
            tracing::info!("Enabling strict mode from CLI");
            deid.strict_mode = true;
        }

        let encryption = if self.no_encryption {
            tracing::warn!(
                "Mapping store encryption disabled by --no-encryption; \
                 the store will hold original identifiers in plaintext"
            );
            EncryptionMode::DisabledForTesting
        } else {
            EncryptionMode::Enabled(deid.encryption.key_provider())
        };

        let config = deid.to_engine_config(encryption)?;

        let mut options = settings.dataset.to_options()?;
        if !self.subdir.is_empty() {
            options.subdirectories = self.subdir.clone();
        }
        if let Some(path) = &self.mapping_file {
            options.mapping_path = Some(path.clone());
        }

        Ok((config, options))
    }
}

/// Print the run summary and pick the exit code
fn report(summary: &DatasetSummary) -> i32 {
    summary.log_summary();

    println!("📊 De-identification Summary:");
    println!("  Run ID: {}", summary.run_id);
    println!("  Files processed: {}", summary.files_processed);
    println!("  Files failed: {}", summary.files_failed);
    println!("  Records processed: {}", summary.records_processed);
    println!("  Records failed: {}", summary.records_failed);
    println!("  Identifiers replaced: {}", summary.total_detections);
    for (category, count) in &summary.detections_by_category {
        println!("    {category}: {count}");
    }
    println!(
        "  Mappings: {} new, {} total",
        summary.mappings_created, summary.mappings_total
    );
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!("  Mapping store: {}", summary.mapping_path.display());
    println!("  Audit log: {}", summary.audit_path.display());
    println!();

    if let Some(report) = &summary.validation {
        println!("🔍 Validation Results:");
        println!("  Files scanned: {}", report.files_scanned);
        println!("  Records scanned: {}", report.records_scanned);
        println!("  Issues: {}", report.issues.len());
        if report.fields_unscanned > 0 {
            println!("  Fields not scanned: {}", report.fields_unscanned);
        }
        for (i, issue) in report.issues.iter().enumerate() {
            if i < 10 {
                println!(
                    "    - {}:{} {} ({})",
                    issue.file,
                    issue.line,
                    issue.field.as_deref().unwrap_or("<raw>"),
                    issue.category
                );
            }
        }
        if report.issues.len() > 10 {
            println!("    ... and {} more issues", report.issues.len() - 10);
        }
        println!();
    }

    if !summary.errors.is_empty() {
        println!("⚠️  Errors encountered:");
        for error in &summary.errors {
            println!("  - {error}");
        }
        println!();
    }

    match &summary.aborted {
        Some(_) if summary.was_interrupted() => {
            println!("⚠️  Run interrupted. Completed files and the mapping store were saved.");
            tracing::info!("Run interrupted by user signal");
            130 // SIGINT exit code (standard Unix convention)
        }
        Some(reason) => {
            println!("❌ Run aborted: {reason}");
            1
        }
        None if summary.is_successful() => {
            println!("✅ De-identification completed successfully!");
            0
        }
        None => {
            println!("⚠️  De-identification completed with failures");
            1 // Partial success
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VeilConfig;
    use crate::domain::CountryCode;

    fn args() -> DeidentifyArgs {
        DeidentifyArgs {
            input_dir: PathBuf::from("in"),
            output_dir: PathBuf::from("out"),
            countries: None,
            validate: false,
            no_validate: false,
            no_encryption: false,
            strict: false,
            subdir: Vec::new(),
            mapping_file: None,
        }
    }

    #[test]
    fn test_build_defaults_to_encryption() {
        let (config, options) = args().build(&VeilConfig::default()).unwrap();
        assert!(config.enable_encryption());
        assert!(options.subdirectories.is_empty());
    }

    #[test]
    fn test_build_applies_overrides() {
        let mut a = args();
        a.countries = Some("US,IN".to_string());
        a.no_encryption = true;
        a.strict = true;
        a.subdir = vec!["original".to_string()];
        a.mapping_file = Some(PathBuf::from("maps.enc"));

        let (config, options) = a.build(&VeilConfig::default()).unwrap();
        assert!(!config.enable_encryption());
        assert!(config.strict_mode);
        assert!(config.countries.includes(CountryCode::IN));
        assert!(!config.countries.includes(CountryCode::BR));
        assert_eq!(options.subdirectories, vec!["original"]);
        assert_eq!(options.mapping_path, Some(PathBuf::from("maps.enc")));
    }

    #[test]
    fn test_validate_flag_overrides_disabled_setting() {
        let mut settings = VeilConfig::default();
        settings.deidentification.enable_validation = false;

        let (config, _) = args().build(&settings).unwrap();
        assert!(!config.enable_validation);

        let mut a = args();
        a.validate = true;
        let (config, _) = a.build(&settings).unwrap();
        assert!(config.enable_validation);
    }

    #[test]
    fn test_no_validate_flag_disables_default() {
        let (config, _) = args().build(&VeilConfig::default()).unwrap();
        assert!(config.enable_validation);

        let mut a = args();
        a.no_validate = true;
        let (config, _) = a.build(&VeilConfig::default()).unwrap();
        assert!(!config.enable_validation);
    }

    #[test]
    fn test_build_rejects_unknown_country() {
        let mut a = args();
        a.countries = Some("US,XX".to_string());
        assert!(matches!(
            a.build(&VeilConfig::default()),
            Err(DeidError::Config(_))
        ));
    }
}
