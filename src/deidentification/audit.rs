//! Audit statistics
//!
//! Everything here is aggregate: category tallies, file names and counts.
//! Neither original values nor pseudonyms are ever recorded.

use crate::deidentification::models::{DetectionStats, IdentifierCategory};
use crate::domain::{CountrySelection, DeidError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

/// Receives per-record statistics from the engine
pub trait StatsReporter: Send + Sync {
    /// Called once per processed record
    fn on_record(&self, stats: &DetectionStats);

    /// Called when a field is left untouched after a detection failure
    fn on_field_error(&self, _field: &str, _error: &DeidError) {}
}

/// In-memory run totals
#[derive(Debug, Default)]
pub struct RunStatistics {
    inner: Mutex<RunTotals>,
}

#[derive(Debug, Default, Clone)]
struct RunTotals {
    records: usize,
    stats: DetectionStats,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> usize {
        self.inner.lock().map(|t| t.records).unwrap_or(0)
    }

    /// Totals so far
    pub fn snapshot(&self) -> DetectionStats {
        self.inner
            .lock()
            .map(|t| t.stats.clone())
            .unwrap_or_default()
    }
}

impl StatsReporter for RunStatistics {
    fn on_record(&self, stats: &DetectionStats) {
        if let Ok(mut totals) = self.inner.lock() {
            totals.records += 1;
            totals.stats.merge(stats);
        }
    }
}

/// Emits debug events with category tallies
#[derive(Debug, Clone, Copy)]
pub struct TracingReporter {
    log_detections: bool,
}

impl TracingReporter {
    pub fn new(log_detections: bool) -> Self {
        Self { log_detections }
    }
}

impl StatsReporter for TracingReporter {
    fn on_record(&self, stats: &DetectionStats) {
        if !self.log_detections || stats.total() == 0 {
            return;
        }
        let categories: Vec<String> = stats
            .by_category
            .iter()
            .map(|(category, count)| format!("{category}={count}"))
            .collect();
        tracing::debug!(
            detections = stats.total(),
            categories = %categories.join(","),
            unparsed_dates = stats.unparsed_dates,
            "Record de-identified"
        );
    }

    fn on_field_error(&self, field: &str, error: &DeidError) {
        tracing::warn!(field = field, error_kind = error.kind(), "Field left untouched after detection failure");
    }
}

/// One `{file, category, count}` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub file: String,
    pub category: IdentifierCategory,
    pub count: usize,
}

/// Per-file counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAudit {
    /// Path relative to the input root
    pub file: String,
    pub records_processed: usize,
    pub records_failed: usize,
    pub detections: usize,
    pub unparsed_dates: usize,
    pub field_errors: usize,
}

/// Date shift settings as recorded in the audit (the offset is never written)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateShiftAudit {
    pub enabled: bool,
    pub range_days: u32,
    pub preserve_intervals: bool,
}

/// Audit document written once per dataset run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetAudit {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub countries: String,
    pub date_shifting: DateShiftAudit,
    pub encryption_enabled: bool,
    pub strict_mode: bool,
    pub files_processed: usize,
    pub records_processed: usize,
    pub records_failed: usize,
    pub total_detections: usize,
    pub detections_by_category: std::collections::BTreeMap<IdentifierCategory, usize>,
    pub unparsed_dates: usize,
    pub field_errors: usize,
    pub mappings_created: usize,
    pub mappings_total: usize,
    pub files: Vec<FileAudit>,
    pub records: Vec<AuditRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl DatasetAudit {
    pub fn new(run_id: String, countries: &CountrySelection, date_shifting: DateShiftAudit) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            started_at: now,
            completed_at: now,
            countries: countries.to_string(),
            date_shifting,
            encryption_enabled: true,
            strict_mode: false,
            files_processed: 0,
            records_processed: 0,
            records_failed: 0,
            total_detections: 0,
            detections_by_category: Default::default(),
            unparsed_dates: 0,
            field_errors: 0,
            mappings_created: 0,
            mappings_total: 0,
            files: Vec::new(),
            records: Vec::new(),
            aborted: None,
            errors: Vec::new(),
        }
    }

    /// Fold one finished file into the totals
    pub fn add_file(&mut self, file: FileAudit, stats: &DetectionStats) {
        self.files_processed += 1;
        self.records_processed += file.records_processed;
        self.records_failed += file.records_failed;
        self.total_detections += stats.total();
        self.unparsed_dates += stats.unparsed_dates;
        self.field_errors += stats.field_errors;
        for (category, count) in &stats.by_category {
            *self.detections_by_category.entry(*category).or_insert(0) += count;
            self.records.push(AuditRecord {
                file: file.file.clone(),
                category: *category,
                count: *count,
            });
        }
        self.files.push(file);
    }

    /// Write the audit as pretty JSON
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        crate::deidentification::store::write_atomic(path, &json)
            .map_err(|e| DeidError::Io(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }
}
