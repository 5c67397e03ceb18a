//! Post-run validation of de-identified output
//!
//! Re-walks an output tree and runs the shared [`Validator`](crate::deidentification::Validator)
//! over every record. Findings are reported with a redacted excerpt; the
//! output itself is never modified or deleted, so it stays in place for review.

pub mod report;
pub mod scan;

pub use report::{DatasetIssue, ValidationReport};
pub use scan::validate_dataset;
