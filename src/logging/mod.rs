//! Logging and observability
//!
//! Structured logging with `tracing`: console output plus an optional JSON
//! file with rotation. Events carry counts, categories, file paths and
//! durations; identifier values never appear in a log field.
//!
//! # Example
//!
//! ```no_run
//! use veil::logging::init_logging;
//! use veil::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(files = 4, "Dataset discovered");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of a record file
///
/// # Example
///
/// ```no_run
/// use veil::log_file_start;
///
/// log_file_start!("original/visits.jsonl");
/// ```
#[macro_export]
macro_rules! log_file_start {
    ($file:expr) => {
        tracing::debug!(file = %$file, "Processing file");
    };
}

/// Log the completion of a record file
///
/// # Example
///
/// ```no_run
/// use veil::log_file_complete;
/// use std::time::Duration;
///
/// log_file_complete!("original/visits.jsonl", 1200, Duration::from_millis(850));
/// ```
#[macro_export]
macro_rules! log_file_complete {
    ($file:expr, $records:expr, $duration:expr) => {
        tracing::info!(
            file = %$file,
            records = $records,
            duration_ms = $duration.as_millis(),
            "File de-identified"
        );
    };
}

/// Log the completion of a dataset run
///
/// # Example
///
/// ```no_run
/// use veil::log_dataset_complete;
/// use std::time::Duration;
///
/// log_dataset_complete!(4, Duration::from_secs(12));
/// ```
#[macro_export]
macro_rules! log_dataset_complete {
    ($files:expr, $duration:expr) => {
        tracing::info!(
            files = $files,
            duration_ms = $duration.as_millis(),
            "Dataset run finished"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use veil::log_error_with_context;
/// use veil::domain::DeidError;
///
/// let error = DeidError::Config("unknown category".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
