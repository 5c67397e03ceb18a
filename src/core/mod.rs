//! Core business logic for Veil.
//!
//! This module contains the dataset-level orchestration built on top of the
//! [`deidentification`](crate::deidentification) engine.
//!
//! # Modules
//!
//! - [`dataset`] - Dataset walking, concurrent file processing, audit and summary
//! - [`validation`] - Residual identifier scanning of produced output
//!
//! # Dataset Workflow
//!
//! 1. **Discover**: Walk the input tree for record files
//! 2. **Load Store**: Open (or create) the encrypted mapping store
//! 3. **De-identify**: Stream each file record by record into a temp file
//! 4. **Commit**: Rename the finished file into the mirrored output tree
//! 5. **Persist**: Atomically save the mapping store
//! 6. **Audit**: Write aggregate counts
//! 7. **Validate** (optional): Re-scan the output and write a report
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use veil::core::dataset::{deidentify_dataset, DatasetOptions};
//! use veil::deidentification::{DeidentificationConfig, EncryptionMode, FileKeyProvider};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = Arc::new(FileKeyProvider::new("veil.key"));
//! let config = DeidentificationConfig::new(EncryptionMode::Enabled(provider));
//!
//! let summary = deidentify_dataset(
//!     Path::new("extract"),
//!     Path::new("deidentified"),
//!     config,
//!     DatasetOptions::default(),
//! )
//! .await?;
//!
//! println!("Files: {}", summary.files_processed);
//! println!("Detections: {}", summary.total_detections);
//! # Ok(())
//! # }
//! ```

pub mod dataset;
pub mod validation;
