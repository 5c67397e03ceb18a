//! Dataset orchestration
//!
//! This module de-identifies a whole directory tree of newline-delimited JSON
//! record files:
//! - Discovery of record files, optionally limited to named subdirectories
//! - Concurrent per-file processing against one shared mapping store
//! - Atomic output files mirroring the input layout
//! - Audit and summary reporting

pub mod discover;
pub mod options;
pub mod runner;
pub mod summary;

pub use options::{
    default_mapping_path, DatasetOptions, PersistMode, ARTIFACT_DIR, SHUTDOWN_REASON,
};
pub use runner::deidentify_dataset;
pub use summary::DatasetSummary;
