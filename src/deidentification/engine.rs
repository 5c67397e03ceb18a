//! De-identification engine
//!
//! [`DeidentificationEngine`] owns everything one run needs: the compiled
//! pattern detector, the pseudonym generator, the date shifter, the validator
//! and the single mapping store. It is `Send + Sync`; dataset workers share it
//! through an `Arc` and every store access goes through one mutex.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use veil::deidentification::{
//!     DeidentificationConfig, DeidentificationEngine, EncryptionMode, RunStatistics,
//! };
//! use veil::domain::{CountryCode, CountrySelection};
//!
//! let mut config = DeidentificationConfig::new(EncryptionMode::DisabledForTesting);
//! config.countries = CountrySelection::only([CountryCode::US]);
//! let engine = DeidentificationEngine::new(config, Arc::new(RunStatistics::new()))?;
//!
//! let outcome = engine.deidentify_text("Patient John Doe, MRN: 123456")?;
//! assert!(!outcome.text.contains("John Doe"));
//! assert!(!outcome.text.contains("123456"));
//! # Ok::<(), veil::domain::DeidError>(())
//! ```

use crate::deidentification::{
    audit::StatsReporter,
    config::DeidentificationConfig,
    date_shift::{draw_offset, DateShifter},
    detector::PatternDetector,
    models::{DetectionResult, DetectionStats, IdentifierCategory},
    patterns::PatternLibrary,
    pseudonym::{PseudonymGenerator, PseudonymTemplates},
    store::MappingStore,
    validator::{ValidationIssue, Validator},
};
use crate::domain::{DeidError, Result};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Which record fields are de-identified
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TextFields {
    /// Every field
    #[default]
    All,
    /// Only the named top-level fields; everything else passes through
    Named(Vec<String>),
}

impl TextFields {
    pub fn includes(&self, field: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(names) => names.iter().any(|n| n == field),
        }
    }
}

/// Result of de-identifying one text
#[derive(Debug, Clone)]
pub struct TextOutcome {
    pub text: String,
    /// Spans refer to the input text
    pub detections: Vec<DetectionResult>,
    pub stats: DetectionStats,
}

/// Result of de-identifying one record
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub record: Value,
    pub stats: DetectionStats,
}

pub struct DeidentificationEngine {
    config: DeidentificationConfig,
    detector: PatternDetector,
    generator: PseudonymGenerator,
    shifter: Option<DateShifter>,
    validator: Validator,
    store: Mutex<MappingStore>,
    reporter: Arc<dyn StatsReporter>,
}

impl DeidentificationEngine {
    /// Build the engine and load (or start) the mapping store
    ///
    /// # Errors
    ///
    /// - [`DeidError::Config`] for invalid settings, templates or custom patterns
    /// - [`DeidError::Store`] when the store or its key cannot be loaded
    pub fn new(config: DeidentificationConfig, reporter: Arc<dyn StatsReporter>) -> Result<Self> {
        config.validate()?;

        let library = PatternLibrary::with_custom(&config.custom_patterns)?;
        let templates = PseudonymTemplates::new(&config.pseudonym_templates)?;
        let detector =
            PatternDetector::new(&library, &config.countries).with_protected(templates.shape_regex()?);

        let mut store = match &config.mapping_path {
            Some(path) => MappingStore::load(path, &config.encryption)?,
            None => MappingStore::in_memory(),
        };

        let salt = match &config.salt {
            Some(secret) => secret.expose_secret().as_ref().as_bytes().to_vec(),
            None => store.ensure_salt()?,
        };

        let shifter = if config.enable_date_shifting {
            let range = config.date_shift_range_days;
            let offset = match store.date_shift_offset() {
                Some(offset) => {
                    if offset.unsigned_abs() > u64::from(range) {
                        tracing::warn!(
                            range_days = range,
                            "Stored date shift offset lies outside the configured range; keeping it for consistency"
                        );
                    }
                    offset
                }
                None => {
                    let offset = draw_offset(range);
                    store.set_date_shift_offset(offset);
                    offset
                }
            };
            Some(DateShifter::new(
                config.countries.primary_date_order(),
                offset,
                range,
                config.preserve_date_intervals,
                salt.clone(),
            ))
        } else {
            None
        };

        let validator = Validator::new(detector.clone(), config.enable_date_shifting);
        let generator = PseudonymGenerator::new(templates, salt);

        tracing::info!(
            countries = %config.countries,
            patterns = detector.patterns().len(),
            stored_mappings = store.len(),
            encryption = config.enable_encryption(),
            date_shifting = config.enable_date_shifting,
            strict_mode = config.strict_mode,
            "De-identification engine initialized"
        );

        Ok(Self {
            config,
            detector,
            generator,
            shifter,
            validator,
            store: Mutex::new(store),
            reporter,
        })
    }

    pub fn config(&self) -> &DeidentificationConfig {
        &self.config
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Replace every detected identifier in `text`
    ///
    /// # Errors
    ///
    /// [`DeidError::Detection`] if a matcher fails; [`DeidError::Store`] if the
    /// mapping store cannot be updated.
    pub fn deidentify_text(&self, text: &str) -> Result<TextOutcome> {
        let detections = self.detector.detect(text)?;
        let mut stats = DetectionStats::new();
        if detections.is_empty() {
            return Ok(TextOutcome {
                text: text.to_string(),
                detections,
                stats,
            });
        }

        let mut output = String::with_capacity(text.len() + detections.len() * 8);
        let mut cursor = 0;
        for detection in &detections {
            output.push_str(&text[cursor..detection.span_start]);
            let value = &text[detection.span_start..detection.span_end];
            output.push_str(&self.replacement(detection.category, value, &mut stats)?);
            stats.record(detection.category);
            cursor = detection.span_end;
        }
        output.push_str(&text[cursor..]);

        Ok(TextOutcome {
            text: output,
            detections,
            stats,
        })
    }

    fn replacement(
        &self,
        category: IdentifierCategory,
        value: &str,
        stats: &mut DetectionStats,
    ) -> Result<String> {
        if category == IdentifierCategory::Date {
            if let Some(shifter) = &self.shifter {
                match shifter.shift(value) {
                    Ok(shifted) => return Ok(shifted),
                    Err(DeidError::Parse(_)) => {
                        stats.unparsed_dates += 1;
                    }
                    Err(other) => return Err(other),
                }
            }
        }
        self.generator.resolve(category, value, &self.store)
    }

    /// De-identify the selected fields of a record
    ///
    /// Strings below a selected field are de-identified at any depth; numbers,
    /// booleans and nulls pass through. A detection failure leaves that field
    /// untouched and is counted in `field_errors`, unless strict mode is on.
    pub fn deidentify_record(&self, mut record: Value, fields: &TextFields) -> Result<RecordOutcome> {
        let mut stats = DetectionStats::new();
        match &mut record {
            Value::Object(map) => {
                for (key, value) in map.iter_mut() {
                    if fields.includes(key) {
                        self.deidentify_value(value, key, &mut stats)?;
                    }
                }
            }
            other => {
                if *fields == TextFields::All {
                    self.deidentify_value(other, "", &mut stats)?;
                }
            }
        }
        self.reporter.on_record(&stats);
        Ok(RecordOutcome { record, stats })
    }

    fn deidentify_value(&self, value: &mut Value, path: &str, stats: &mut DetectionStats) -> Result<()> {
        match value {
            Value::String(text) => match self.deidentify_text(text) {
                Ok(outcome) => {
                    stats.merge(&outcome.stats);
                    *text = outcome.text;
                }
                Err(err @ DeidError::Detection(_)) => {
                    if self.config.strict_mode {
                        return Err(err);
                    }
                    stats.field_errors += 1;
                    self.reporter.on_field_error(path, &err);
                }
                Err(err) => return Err(err),
            },
            Value::Object(map) => {
                for (key, child) in map.iter_mut() {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    self.deidentify_value(child, &child_path, stats)?;
                }
            }
            Value::Array(items) => {
                for (idx, child) in items.iter_mut().enumerate() {
                    self.deidentify_value(child, &format!("{path}[{idx}]"), stats)?;
                }
            }
            Value::Number(_) | Value::Bool(_) | Value::Null => {}
        }
        Ok(())
    }

    /// Re-scan processed text; any finding signals potential leakage
    pub fn validate_deidentification(&self, text: &str) -> Result<(bool, Vec<ValidationIssue>)> {
        self.validator.validate(text)
    }

    /// Atomically save the mapping store, if it has a file and changes
    pub fn persist_store(&self) -> Result<()> {
        let Some(path) = &self.config.mapping_path else {
            return Ok(());
        };
        let mut store = self.lock_store()?;
        if store.is_dirty() || !path.exists() {
            store.save(path, &self.config.encryption)?;
        }
        Ok(())
    }

    /// `(created this run, total)` mapping counts
    pub fn mapping_counts(&self) -> Result<(usize, usize)> {
        let store = self.lock_store()?;
        Ok((store.created_this_run(), store.len()))
    }

    /// Authorised reverse path: pseudonym to `(category, original)`
    pub fn reverse_lookup(&self, pseudonym: &str) -> Result<Option<(IdentifierCategory, String)>> {
        let store = self.lock_store()?;
        Ok(store
            .reverse_lookup(pseudonym)
            .map(|(category, original)| (category, original.to_string())))
    }

    fn lock_store(&self) -> Result<std::sync::MutexGuard<'_, MappingStore>> {
        self.store
            .lock()
            .map_err(|_| DeidError::Aborted("mapping store lock poisoned".to_string()))
    }
}

impl std::fmt::Debug for DeidentificationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeidentificationEngine")
            .field("config", &self.config)
            .field("patterns", &self.detector.patterns().len())
            .field("date_shifting", &self.shifter.is_some())
            .finish()
    }
}
