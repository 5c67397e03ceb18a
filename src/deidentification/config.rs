//! Run configuration for the de-identification engine

use crate::config::SecretString;
use crate::deidentification::patterns::CustomPatternDefinition;
use crate::deidentification::store::EncryptionMode;
use crate::domain::{CountrySelection, DeidError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Largest accepted date shift range, in days
pub const MAX_DATE_SHIFT_RANGE_DAYS: u32 = 3650;

/// Fully constructed engine configuration
///
/// Built once per run (by the CLI from `veil.toml` and flags, or directly by
/// an embedding program) and read-only afterwards. There is no `Default`:
/// the encryption mode must always be chosen explicitly.
#[derive(Clone)]
pub struct DeidentificationConfig {
    /// Active jurisdictions
    pub countries: CountrySelection,
    pub enable_date_shifting: bool,
    /// Offsets are drawn from `[-range, range]`, never zero
    pub date_shift_range_days: u32,
    /// One offset for every date in the run
    pub preserve_date_intervals: bool,
    /// Mapping store protection and key source
    pub encryption: EncryptionMode,
    /// Re-scan output for residual identifiers
    pub enable_validation: bool,
    /// Promote recoverable per-field errors to a run abort
    pub strict_mode: bool,
    /// Category name to template overrides (`"MRN" = "[MRN-{token}]"`)
    pub pseudonym_templates: BTreeMap<String, String>,
    /// Emit per-record category tallies at debug level
    pub log_detections: bool,
    /// Mapping store file; `None` keeps the store in memory
    pub mapping_path: Option<PathBuf>,
    pub custom_patterns: Vec<CustomPatternDefinition>,
    /// Overrides the salt persisted in the store
    pub salt: Option<SecretString>,
}

impl DeidentificationConfig {
    pub fn new(encryption: EncryptionMode) -> Self {
        Self {
            countries: CountrySelection::All,
            enable_date_shifting: true,
            date_shift_range_days: 365,
            preserve_date_intervals: true,
            encryption,
            enable_validation: true,
            strict_mode: false,
            pseudonym_templates: BTreeMap::new(),
            log_detections: false,
            mapping_path: None,
            custom_patterns: Vec::new(),
            salt: None,
        }
    }

    pub fn enable_encryption(&self) -> bool {
        self.encryption.is_enabled()
    }

    /// Reject settings the engine cannot honour
    ///
    /// Templates and custom patterns are checked when the engine compiles them.
    pub fn validate(&self) -> Result<()> {
        if self.countries.is_empty() {
            return Err(DeidError::Config(
                "At least one country must be selected".to_string(),
            ));
        }
        if self.enable_date_shifting
            && !(1..=MAX_DATE_SHIFT_RANGE_DAYS).contains(&self.date_shift_range_days)
        {
            return Err(DeidError::Config(format!(
                "date_shift_range_days must be between 1 and {MAX_DATE_SHIFT_RANGE_DAYS}, got {}",
                self.date_shift_range_days
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for DeidentificationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeidentificationConfig")
            .field("countries", &self.countries.to_string())
            .field("enable_date_shifting", &self.enable_date_shifting)
            .field("date_shift_range_days", &self.date_shift_range_days)
            .field("preserve_date_intervals", &self.preserve_date_intervals)
            .field("encryption", &self.encryption)
            .field("enable_validation", &self.enable_validation)
            .field("strict_mode", &self.strict_mode)
            .field("pseudonym_templates", &self.pseudonym_templates)
            .field("log_detections", &self.log_detections)
            .field("mapping_path", &self.mapping_path)
            .field("custom_patterns", &self.custom_patterns.len())
            .field("salt", &self.salt.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
