//! Dataset run options

use crate::deidentification::TextFields;
use std::path::{Path, PathBuf};
use tokio::sync::watch;

/// Directory under the output root holding the mapping store, audit and report
pub const ARTIFACT_DIR: &str = "_deidentification";

pub const DEFAULT_MAPPING_FILE: &str = "mappings.enc";
pub const DEFAULT_AUDIT_FILE: &str = "audit_log.json";
pub const DEFAULT_REPORT_FILE: &str = "validation_report.json";

/// Abort reason recorded when the shutdown signal stops a run
pub const SHUTDOWN_REASON: &str = "shutdown requested";

/// When the mapping store is written during a dataset run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistMode {
    /// Atomic save after every completed file
    #[default]
    AfterEachFile,
    /// Single save once all files are done
    AtEnd,
}

impl std::str::FromStr for PersistMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "after_each_file" | "after-each-file" => Ok(Self::AfterEachFile),
            "at_end" | "at-end" => Ok(Self::AtEnd),
            other => Err(format!(
                "Invalid persist mode '{other}'. Must be 'after_each_file' or 'at_end'"
            )),
        }
    }
}

/// How a dataset directory is walked and where run artifacts land
#[derive(Debug, Clone)]
pub struct DatasetOptions {
    /// Only walk these subdirectories of the input root (empty: everything)
    pub subdirectories: Vec<String>,

    /// Record file extensions, without the dot
    pub extensions: Vec<String>,

    /// Record fields to de-identify
    pub text_fields: TextFields,

    /// Mapping store path; falls back to the engine config, then the default
    pub mapping_path: Option<PathBuf>,

    pub audit_path: Option<PathBuf>,

    pub report_path: Option<PathBuf>,

    pub persist_mode: PersistMode,

    /// Files processed concurrently
    pub workers: usize,

    /// Checked between files; `true` stops the run after in-flight files finish
    pub shutdown: Option<watch::Receiver<bool>>,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            subdirectories: Vec::new(),
            extensions: vec!["jsonl".to_string(), "ndjson".to_string()],
            text_fields: TextFields::All,
            mapping_path: None,
            audit_path: None,
            report_path: None,
            persist_mode: PersistMode::AfterEachFile,
            workers: 4,
            shutdown: None,
        }
    }
}

impl DatasetOptions {
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn audit_path_for(&self, output_dir: &Path) -> PathBuf {
        self.audit_path
            .clone()
            .unwrap_or_else(|| output_dir.join(ARTIFACT_DIR).join(DEFAULT_AUDIT_FILE))
    }

    pub fn report_path_for(&self, output_dir: &Path) -> PathBuf {
        self.report_path
            .clone()
            .unwrap_or_else(|| output_dir.join(ARTIFACT_DIR).join(DEFAULT_REPORT_FILE))
    }

    pub(crate) fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    pub(crate) fn is_record_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
    }
}

/// Default mapping store location for an output root
pub fn default_mapping_path(output_dir: &Path) -> PathBuf {
    output_dir.join(ARTIFACT_DIR).join(DEFAULT_MAPPING_FILE)
}
