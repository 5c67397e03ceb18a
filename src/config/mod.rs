//! Configuration management for Veil.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Veil uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `VEIL_*` environment overrides
//! - Default values for every setting
//! - Validation on load
//!
//! The de-identification core never reads files or the environment itself:
//! the CLI turns a [`VeilConfig`] plus command-line flags into a fully
//! constructed [`DeidentificationConfig`](crate::deidentification::DeidentificationConfig)
//! and [`DatasetOptions`](crate::core::dataset::DatasetOptions).
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use veil::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("veil.toml")?;
//! println!("Countries: {}", config.deidentification.countries);
//! println!("Workers: {}", config.dataset.workers);
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [deidentification]
//! countries = ["US", "IN"]
//! date_shift_range_days = 365
//! strict_mode = false
//! salt = "${VEIL_STUDY_SALT}"
//!
//! [deidentification.encryption]
//! key_source = "file"
//! key_file = "/etc/veil/study.key"
//!
//! [deidentification.templates]
//! MRN = "[MRN-{token}]"
//!
//! [[deidentification.custom_patterns]]
//! name = "subject_id"
//! category = "CUSTOM"
//! regex = '\bSUBJ-\d{5}\b'
//! priority = 90
//!
//! [dataset]
//! subdirectories = ["original", "cleaned"]
//! text_fields = ["note", "summary"]
//! workers = 4
//!
//! [logging]
//! local_enabled = true
//! local_path = "/var/log/veil"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_default_config};
pub use schema::{
    ApplicationConfig, DatasetConfig, DeidentificationSettings, EncryptionConfig, KeySource,
    LoggingConfig, VeilConfig,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
