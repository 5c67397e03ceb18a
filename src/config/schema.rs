//! Configuration schema types
//!
//! This module defines the structure of `veil.toml`.

use crate::config::SecretString;
use crate::core::dataset::{DatasetOptions, PersistMode};
use crate::deidentification::config::MAX_DATE_SHIFT_RANGE_DAYS;
use crate::deidentification::store::DEFAULT_KEY_ENV;
use crate::deidentification::{
    CustomPatternDefinition, DeidentificationConfig, EncryptionMode, EnvKeyProvider,
    FileKeyProvider, IdentifierCategory, KeyProvider, TextFields,
};
use crate::domain::{CountrySelection, DeidError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Main Veil configuration
///
/// This is the root configuration structure that maps to the TOML file.
/// Every section is optional; an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VeilConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Detection, pseudonym, date shift and mapping store settings
    #[serde(default)]
    pub deidentification: DeidentificationSettings,

    /// Dataset walking and output settings
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl VeilConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.application.validate()?;
        self.deidentification.validate()?;
        self.dataset.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// `[deidentification]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeidentificationSettings {
    /// `"ALL"` or a list of country codes
    #[serde(default)]
    pub countries: CountrySelection,

    #[serde(default = "default_true")]
    pub enable_date_shifting: bool,

    #[serde(default = "default_date_shift_range_days")]
    pub date_shift_range_days: u32,

    #[serde(default = "default_true")]
    pub preserve_date_intervals: bool,

    #[serde(default = "default_true")]
    pub enable_validation: bool,

    #[serde(default)]
    pub strict_mode: bool,

    #[serde(default)]
    pub log_detections: bool,

    /// Mapping store file; defaults to `<output>/_deidentification/mappings.enc`
    #[serde(default)]
    pub mapping_path: Option<String>,

    /// Overrides the salt stored in the mapping store
    #[serde(default, skip_serializing)]
    pub salt: Option<SecretString>,

    /// Extra TOML file with a `[[patterns]]` array
    #[serde(default)]
    pub custom_patterns_file: Option<String>,

    #[serde(default)]
    pub encryption: EncryptionConfig,

    /// Category code to template, e.g. `MRN = "[MRN-{token}]"`
    #[serde(default)]
    pub templates: BTreeMap<String, String>,

    #[serde(default)]
    pub custom_patterns: Vec<CustomPatternDefinition>,
}

impl DeidentificationSettings {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.countries.is_empty() {
            return Err("deidentification.countries cannot be empty".to_string());
        }

        if self.enable_date_shifting
            && !(1..=MAX_DATE_SHIFT_RANGE_DAYS).contains(&self.date_shift_range_days)
        {
            return Err(format!(
                "deidentification.date_shift_range_days must be between 1 and {MAX_DATE_SHIFT_RANGE_DAYS}"
            ));
        }

        for category in self.templates.keys() {
            category.parse::<IdentifierCategory>().map_err(|e| {
                format!("Invalid deidentification.templates entry: {e}")
            })?;
        }

        for pattern in &self.custom_patterns {
            if pattern.name.trim().is_empty() {
                return Err("custom pattern name cannot be empty".to_string());
            }
        }

        self.encryption.validate()
    }

    /// Build the engine configuration with the chosen encryption mode
    ///
    /// Custom patterns from `custom_patterns_file` are appended after the
    /// inline ones.
    pub fn to_engine_config(&self, encryption: EncryptionMode) -> Result<DeidentificationConfig> {
        let mut custom_patterns = self.custom_patterns.clone();
        if let Some(path) = &self.custom_patterns_file {
            custom_patterns.extend(CustomPatternDefinition::load_file(path)?);
        }

        let mut config = DeidentificationConfig::new(encryption);
        config.countries = self.countries.clone();
        config.enable_date_shifting = self.enable_date_shifting;
        config.date_shift_range_days = self.date_shift_range_days;
        config.preserve_date_intervals = self.preserve_date_intervals;
        config.enable_validation = self.enable_validation;
        config.strict_mode = self.strict_mode;
        config.log_detections = self.log_detections;
        config.pseudonym_templates = self.templates.clone();
        config.mapping_path = self.mapping_path.as_ref().map(PathBuf::from);
        config.custom_patterns = custom_patterns;
        config.salt = self.salt.clone();
        config.validate()?;
        Ok(config)
    }
}

impl Default for DeidentificationSettings {
    fn default() -> Self {
        Self {
            countries: CountrySelection::All,
            enable_date_shifting: true,
            date_shift_range_days: default_date_shift_range_days(),
            preserve_date_intervals: true,
            enable_validation: true,
            strict_mode: false,
            log_detections: false,
            mapping_path: None,
            salt: None,
            custom_patterns_file: None,
            encryption: EncryptionConfig::default(),
            templates: BTreeMap::new(),
            custom_patterns: Vec::new(),
        }
    }
}

/// Where the mapping store key comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    /// Base64 key file
    #[default]
    File,
    /// Base64 key in an environment variable
    Env,
}

/// `[deidentification.encryption]` section
///
/// Encryption cannot be turned off from the file; the plaintext testing mode
/// is only reachable through the CLI's `--no-encryption` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    #[serde(default)]
    pub key_source: KeySource,

    #[serde(default = "default_key_file")]
    pub key_file: String,

    #[serde(default = "default_key_env")]
    pub key_env: String,
}

impl EncryptionConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        match self.key_source {
            KeySource::File if self.key_file.trim().is_empty() => {
                Err("deidentification.encryption.key_file cannot be empty".to_string())
            }
            KeySource::Env if self.key_env.trim().is_empty() => {
                Err("deidentification.encryption.key_env cannot be empty".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Key provider described by this section
    pub fn key_provider(&self) -> Arc<dyn KeyProvider> {
        match self.key_source {
            KeySource::File => Arc::new(FileKeyProvider::new(&self.key_file)),
            KeySource::Env => Arc::new(EnvKeyProvider::new(&self.key_env)),
        }
    }
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            key_source: KeySource::File,
            key_file: default_key_file(),
            key_env: default_key_env(),
        }
    }
}

/// `[dataset]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Only process these subdirectories of the input root
    #[serde(default)]
    pub subdirectories: Vec<String>,

    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Record fields to de-identify; empty means every field
    #[serde(default)]
    pub text_fields: Vec<String>,

    #[serde(default = "default_workers")]
    pub workers: usize,

    /// `after_each_file` or `at_end`
    #[serde(default = "default_persist_mode")]
    pub persist_mode: String,

    #[serde(default)]
    pub audit_path: Option<String>,

    #[serde(default)]
    pub report_path: Option<String>,
}

impl DatasetConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.workers == 0 {
            return Err("dataset.workers must be > 0".to_string());
        }
        if self.extensions.is_empty() {
            return Err("dataset.extensions cannot be empty".to_string());
        }
        self.persist_mode.parse::<PersistMode>()?;
        Ok(())
    }

    /// Dataset options described by this section
    pub fn to_options(&self) -> Result<DatasetOptions> {
        let persist_mode = self.persist_mode.parse().map_err(DeidError::Config)?;
        Ok(DatasetOptions {
            subdirectories: self.subdirectories.clone(),
            extensions: self
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_string())
                .collect(),
            text_fields: if self.text_fields.is_empty() {
                TextFields::All
            } else {
                TextFields::Named(self.text_fields.clone())
            },
            mapping_path: None,
            audit_path: self.audit_path.as_ref().map(PathBuf::from),
            report_path: self.report_path.as_ref().map(PathBuf::from),
            persist_mode,
            workers: self.workers,
            shutdown: None,
        })
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            subdirectories: Vec::new(),
            extensions: default_extensions(),
            text_fields: Vec::new(),
            workers: default_workers(),
            persist_mode: default_persist_mode(),
            audit_path: None,
            report_path: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local JSON file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_date_shift_range_days() -> u32 {
    365
}

fn default_key_file() -> String {
    "veil.key".to_string()
}

fn default_key_env() -> String {
    DEFAULT_KEY_ENV.to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["jsonl".to_string(), "ndjson".to_string()]
}

fn default_workers() -> usize {
    4
}

fn default_persist_mode() -> String {
    "after_each_file".to_string()
}

fn default_local_path() -> String {
    "logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
