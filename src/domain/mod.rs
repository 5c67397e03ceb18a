//! Domain types for Veil.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Error types** ([`DeidError`], [`StoreError`])
//! - **Result type alias** ([`Result`])
//! - **Jurisdictions** ([`CountryCode`], [`CountrySelection`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, DeidError>`]:
//!
//! ```rust
//! use veil::domain::{CountrySelection, DeidError, Result};
//!
//! fn parse_countries(raw: &str) -> Result<CountrySelection> {
//!     raw.parse().map_err(DeidError::Config)
//! }
//!
//! assert!(parse_countries("US,IN").is_ok());
//! assert!(parse_countries("XX").is_err());
//! ```

pub mod country;
pub mod errors;
pub mod result;

pub use country::{ComponentOrder, CountryCode, CountrySelection};
pub use errors::{DeidError, StoreError};
pub use result::Result;
