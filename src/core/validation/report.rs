//! Validation report structures

use crate::deidentification::IdentifierCategory;
use crate::domain::{DeidError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Residual identifier found in an output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetIssue {
    /// File path relative to the output root
    pub file: String,

    /// 1-based line number
    pub line: usize,

    /// Dotted field path; `None` for lines that are not valid JSON
    pub field: Option<String>,

    pub category: IdentifierCategory,

    /// Context with every finding masked as `[REDACTED:<len>]`
    pub excerpt: String,
}

/// Result of scanning an output tree for residual identifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub validated_at: DateTime<Utc>,

    pub is_valid: bool,

    pub files_scanned: usize,

    pub records_scanned: usize,

    pub issues: Vec<DatasetIssue>,

    /// Text fields the detector gave up on; they may still hold identifiers
    #[serde(default)]
    pub fields_unscanned: usize,

    pub duration_ms: u64,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            validated_at: Utc::now(),
            is_valid: true,
            files_scanned: 0,
            records_scanned: 0,
            issues: Vec::new(),
            fields_unscanned: 0,
            duration_ms: 0,
        }
    }

    pub fn record_issue(&mut self, issue: DatasetIssue) {
        self.is_valid = false;
        self.issues.push(issue);
    }

    pub fn record_unscanned(&mut self) {
        self.is_valid = false;
        self.fields_unscanned += 1;
    }

    /// Distinct files with at least one issue
    pub fn affected_files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = self.issues.iter().map(|i| i.file.as_str()).collect();
        files.sort_unstable();
        files.dedup();
        files
    }

    /// Write the report as pretty JSON
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        crate::deidentification::store::write_atomic(path, &json)
            .map_err(|e| DeidError::Io(e.to_string()))
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}
