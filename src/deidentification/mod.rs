//! De-identification of clinical research records
//!
//! Identifiers are detected with country-aware patterns and replaced with
//! consistent pseudonyms; numeric dates are shifted instead. Every original
//! to pseudonym pair lands in an encrypted mapping store so repeated runs over
//! the same study keep the same pseudonyms.
//!
//! # Architecture
//!
//! The pipeline consists of:
//! - **Patterns**: built-in table for 14 jurisdictions plus custom TOML patterns
//! - **Detection**: priority-ordered, non-overlapping span selection
//! - **Replacement**: salted pseudonyms and format-preserving date shifts
//! - **Store**: AES-256-GCM mapping file with pluggable key providers
//! - **Validation**: re-scan of output for residual identifiers
//! - **Audit**: per-category counts, never values
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use veil::deidentification::{
//!     DeidentificationConfig, DeidentificationEngine, EncryptionMode, TracingReporter,
//! };
//!
//! let config = DeidentificationConfig::new(EncryptionMode::DisabledForTesting);
//! let engine = DeidentificationEngine::new(config, Arc::new(TracingReporter::new(false)))?;
//! let clean = engine.deidentify_text("Contact: jane.doe@example.org")?.text;
//! assert!(clean.contains("[EMAIL-"));
//! # Ok::<(), veil::domain::DeidError>(())
//! ```

pub mod audit;
pub mod config;
pub mod date_shift;
pub mod detector;
pub mod engine;
pub mod models;
pub mod patterns;
pub mod pseudonym;
pub mod store;
pub mod validator;

// Re-export main types
pub use audit::{DatasetAudit, FileAudit, RunStatistics, StatsReporter, TracingReporter};
pub use config::DeidentificationConfig;
pub use date_shift::DateShifter;
pub use detector::PatternDetector;
pub use engine::{DeidentificationEngine, RecordOutcome, TextFields, TextOutcome};
pub use models::{DetectionResult, DetectionStats, IdentifierCategory};
pub use patterns::{CustomPatternDefinition, DetectionPattern, PatternLibrary};
pub use pseudonym::{PseudonymGenerator, PseudonymTemplates};
pub use store::{
    EncryptionMode, EnvKeyProvider, FileKeyProvider, KeyProvider, MappingKey, MappingStore,
    StaticKeyProvider,
};
pub use validator::{ValidationIssue, Validator};
