//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Veil configuration file, including templates and custom patterns
//! that are only checked when compiled.

use crate::config::load_config;
use crate::deidentification::{EncryptionMode, Validator};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateConfigArgs {}

impl ValidateConfigArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: Option<&str>) -> anyhow::Result<i32> {
        let config_path = config_path.unwrap_or("veil.toml");
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let deid = &config.deidentification;
        let checked = deid
            .to_engine_config(EncryptionMode::Enabled(deid.encryption.key_provider()))
            .and_then(|engine_config| Validator::from_config(&engine_config).map(|_| ()))
            .and_then(|()| config.dataset.to_options().map(|_| ()));

        match checked {
            Ok(()) => {
                println!("✅ Configuration is valid");
                println!();
                println!("Configuration Summary:");
                println!("  Log Level: {}", config.application.log_level);
                println!("  Countries: {}", deid.countries);
                println!(
                    "  Date Shifting: {} (±{} days, intervals preserved: {})",
                    deid.enable_date_shifting,
                    deid.date_shift_range_days,
                    deid.preserve_date_intervals
                );
                println!("  Validation: {}", deid.enable_validation);
                println!("  Strict Mode: {}", deid.strict_mode);
                println!("  Key Source: {:?}", deid.encryption.key_source);
                println!("  Custom Patterns: {}", deid.custom_patterns.len());
                println!("  Template Overrides: {}", deid.templates.len());
                println!("  Workers: {}", config.dataset.workers);
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                Ok(2) // Configuration error exit code
            }
        }
    }
}
