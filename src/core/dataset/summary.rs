//! Dataset run summary and reporting

use crate::core::dataset::options::SHUTDOWN_REASON;
use crate::core::validation::ValidationReport;
use crate::deidentification::{DatasetAudit, IdentifierCategory};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Summary of a dataset run
///
/// Always produced, including after a strict-mode abort or shutdown, so the
/// caller can report what was done before the run stopped.
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub run_id: String,

    /// Files fully written to the output tree
    pub files_processed: usize,

    /// Files that failed and produced no output
    pub files_failed: usize,

    pub records_processed: usize,

    /// Malformed records dropped from the output
    pub records_failed: usize,

    pub total_detections: usize,

    pub detections_by_category: BTreeMap<IdentifierCategory, usize>,

    pub mappings_created: usize,

    pub mappings_total: usize,

    pub duration: Duration,

    /// Why the run stopped early, if it did
    pub aborted: Option<String>,

    pub errors: Vec<String>,

    pub mapping_path: PathBuf,

    pub audit_path: PathBuf,

    /// Present when validation ran
    pub validation: Option<ValidationReport>,
}

impl DatasetSummary {
    pub fn from_audit(audit: &DatasetAudit, mapping_path: PathBuf, audit_path: PathBuf) -> Self {
        Self {
            run_id: audit.run_id.clone(),
            files_processed: audit.files_processed,
            files_failed: 0,
            records_processed: audit.records_processed,
            records_failed: audit.records_failed,
            total_detections: audit.total_detections,
            detections_by_category: audit.detections_by_category.clone(),
            mappings_created: audit.mappings_created,
            mappings_total: audit.mappings_total,
            duration: Duration::from_secs(0),
            aborted: audit.aborted.clone(),
            errors: audit.errors.clone(),
            mapping_path,
            audit_path,
            validation: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Completed without abort, failed files or validation findings
    pub fn is_successful(&self) -> bool {
        self.aborted.is_none()
            && self.files_failed == 0
            && self.validation.as_ref().map_or(true, |report| report.is_valid)
    }

    /// Stopped by the shutdown signal rather than an error
    pub fn was_interrupted(&self) -> bool {
        self.aborted.as_deref() == Some(SHUTDOWN_REASON)
    }

    pub fn log_summary(&self) {
        tracing::info!(
            run_id = %self.run_id,
            files_processed = self.files_processed,
            files_failed = self.files_failed,
            records_processed = self.records_processed,
            records_failed = self.records_failed,
            detections = self.total_detections,
            mappings_created = self.mappings_created,
            mappings_total = self.mappings_total,
            duration_secs = self.duration.as_secs(),
            "De-identification completed"
        );

        for (category, count) in &self.detections_by_category {
            tracing::debug!(category = %category, count = count, "Detections by category");
        }

        if let Some(reason) = &self.aborted {
            tracing::warn!(reason = %reason, "Run stopped before all files were processed");
        }

        if !self.errors.is_empty() {
            tracing::warn!(error_count = self.errors.len(), "Run completed with errors");
            for error in &self.errors {
                tracing::warn!(message = %error, "Dataset error");
            }
        }

        if let Some(report) = &self.validation {
            if report.is_valid {
                tracing::info!(records_scanned = report.records_scanned, "Validation passed");
            } else {
                tracing::warn!(
                    issues = report.issues.len(),
                    "Validation found residual identifiers; output left in place for review"
                );
            }
        }
    }
}
