// Veil - Clinical Research Records De-identification
// Copyright (c) 2025 Veil Contributors
// Licensed under the MIT License

//! # Veil - Clinical Research Records De-identification
//!
//! Veil removes protected health information from clinical research records
//! before they are used for analysis, replacing identifiers with consistent
//! pseudonyms and shifting dates while keeping the intervals between them.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Detecting** identifiers with a pattern table covering 14 jurisdictions
//! - **Pseudonymizing** them consistently within and across runs
//! - **Shifting** dates by a run-wide offset in their original format
//! - **Persisting** the pseudonym mapping in an AES-256-GCM encrypted store
//! - **Orchestrating** whole datasets of JSON Lines files with an audit log
//! - **Validating** produced output for residual identifiers
//!
//! ## Architecture
//!
//! Veil follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Dataset orchestration and output validation
//! - [`deidentification`] - Detection, pseudonyms, date shifting, mapping store
//! - [`domain`] - Error types and country codes
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use veil::config::load_config;
//! use veil::core::dataset::deidentify_dataset;
//! use veil::deidentification::EncryptionMode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load configuration
//!     let settings = load_config("veil.toml")?;
//!     let deid = &settings.deidentification;
//!
//!     // Build the engine configuration with the configured key source
//!     let config =
//!         deid.to_engine_config(EncryptionMode::Enabled(deid.encryption.key_provider()))?;
//!
//!     // De-identify the dataset
//!     let summary = deidentify_dataset(
//!         Path::new("data/raw"),
//!         Path::new("data/deidentified"),
//!         config,
//!         settings.dataset.to_options()?,
//!     )
//!     .await?;
//!
//!     println!("Replaced {} identifiers", summary.total_detections);
//!     Ok(())
//! }
//! ```
//!
//! ## Single Texts and Records
//!
//! ```rust
//! use std::sync::Arc;
//! use veil::deidentification::{
//!     DeidentificationConfig, DeidentificationEngine, EncryptionMode, RunStatistics, TextFields,
//! };
//!
//! # fn example() -> Result<(), veil::domain::DeidError> {
//! let config = DeidentificationConfig::new(EncryptionMode::DisabledForTesting);
//! let engine = DeidentificationEngine::new(config, Arc::new(RunStatistics::new()))?;
//!
//! let record = serde_json::json!({"note": "Contact jane.roe@example.org"});
//! let outcome = engine.deidentify_record(record, &TextFields::All)?;
//! assert!(!outcome.record.to_string().contains("jane.roe"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Veil uses the [`domain::DeidError`] type for all library errors. Errors
//! never carry identifier values or record content:
//!
//! ```rust,no_run
//! use veil::domain::DeidError;
//!
//! fn example() -> Result<(), DeidError> {
//!     // Errors are automatically converted using the ? operator
//!     let settings = veil::config::load_config("veil.toml")?;
//!     println!("Countries: {}", settings.deidentification.countries);
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! Veil uses structured logging with the `tracing` crate. Log fields carry
//! counts, categories and file paths only:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(files = 4, "Dataset discovered");
//! warn!(category = "MRN", residual = 1, "Residual identifier found");
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod deidentification;
pub mod domain;
pub mod logging;
