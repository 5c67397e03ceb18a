//! Domain error types
//!
//! This module defines the error hierarchy for Veil. The top-level variants map
//! onto the failure classes the engine distinguishes at run time:
//!
//! - [`DeidError::Config`] - invalid pattern, template or setting; raised before a run starts
//! - [`DeidError::Parse`] - a value (usually a date) could not be interpreted; recoverable
//! - [`DeidError::Detection`] - a matcher failed on one field; recoverable unless strict mode
//! - [`DeidError::Store`] - mapping store load/save/encryption failure; always fatal
//! - [`DeidError::Validation`] - residual identifier found after processing; reported
//!
//! Error messages never carry identifier values or record content.

use thiserror::Error;

/// Main Veil error type
#[derive(Debug, Error)]
pub enum DeidError {
    /// Invalid pattern, template or configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unrecognized value (e.g. an unparseable date or malformed record)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Matcher failure on a single field
    #[error("Detection error: {0}")]
    Detection(String),

    /// Mapping store errors
    #[error("Mapping store error: {0}")]
    Store(#[from] StoreError),

    /// Residual identifier found in de-identified output
    #[error("Validation failure: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Run aborted (strict mode or shutdown)
    #[error("Run aborted: {0}")]
    Aborted(String),
}

impl DeidError {
    /// Whether the error must abort the whole run
    ///
    /// Parse, detection and validation errors are folded into the audit at the
    /// record/field boundary; everything else stops the run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Store(_) | Self::Io(_) | Self::Aborted(_)
        )
    }

    /// Short machine-friendly label used in audit summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Parse(_) => "parse",
            Self::Detection(_) => "detection",
            Self::Store(_) => "store",
            Self::Validation(_) => "validation",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Aborted(_) => "aborted",
        }
    }
}

/// Mapping store errors
///
/// Every variant is fatal: a store that cannot be read, written or encrypted
/// aborts the run before anything is persisted unencrypted.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The supplied key does not open the store
    #[error("Failed to decrypt mapping store: {0}")]
    Decryption(String),

    /// Malformed or tampered store file
    #[error("Mapping store is corrupt: {0}")]
    Corrupt(String),

    /// Encryption failed while saving
    #[error("Failed to encrypt mapping store: {0}")]
    Encryption(String),

    /// Filesystem failure while loading or saving
    #[error("Mapping store I/O error: {0}")]
    Io(String),

    /// Key provider could not supply a key
    #[error("Key provider error: {0}")]
    KeyProvider(String),

    /// An encrypted store cannot be opened or written without encryption
    #[error("Encryption required: {0}")]
    EncryptionRequired(String),
}

impl From<std::io::Error> for DeidError {
    fn from(err: std::io::Error) -> Self {
        DeidError::Io(err.to_string())
    }
}

// serde_json syntax errors only report position, never the offending content
impl From<serde_json::Error> for DeidError {
    fn from(err: serde_json::Error) -> Self {
        DeidError::Serialization(format!(
            "{:?} error at line {} column {}",
            err.classify(),
            err.line(),
            err.column()
        ))
    }
}

impl From<toml::de::Error> for DeidError {
    fn from(err: toml::de::Error) -> Self {
        DeidError::Config(format!("TOML parse error: {err}"))
    }
}
