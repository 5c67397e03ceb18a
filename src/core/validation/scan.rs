//! Output tree scanning

use crate::core::dataset::discover::record_files;
use crate::core::dataset::DatasetOptions;
use crate::core::validation::report::{DatasetIssue, ValidationReport};
use crate::deidentification::{TextFields, Validator};
use crate::domain::{DeidError, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

/// Re-scan every record file under `output_dir` for residual identifiers
///
/// Only the fields selected by `options.text_fields` are scanned, matching
/// what the engine de-identified. Lines that are not valid JSON are scanned
/// as raw text. Issues carry a redacted excerpt, never the matched text.
pub fn validate_dataset(
    output_dir: &Path,
    validator: &Validator,
    options: &DatasetOptions,
) -> Result<ValidationReport> {
    let started = Instant::now();
    let mut report = ValidationReport::new();

    let files = record_files(output_dir, options, None)?;
    tracing::info!(
        output_dir = %output_dir.display(),
        files = files.len(),
        "Validating de-identified output"
    );

    for relative in files {
        let name = relative.display().to_string();
        let reader = BufReader::new(File::open(output_dir.join(&relative))?);
        for (idx, line) in reader.split(b'\n').enumerate() {
            let line = line?;
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches('\r');
            if text.trim().is_empty() {
                continue;
            }
            report.records_scanned += 1;

            let mut sink = IssueSink {
                validator,
                report: &mut report,
                file: &name,
                line: idx + 1,
            };
            match serde_json::from_str::<Value>(text) {
                Ok(record) => sink.scan_record(&record, &options.text_fields)?,
                Err(_) => sink.scan_text(text, None)?,
            }
        }
        report.files_scanned += 1;
    }

    report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    if report.is_valid {
        tracing::info!(
            files = report.files_scanned,
            records = report.records_scanned,
            "No residual identifiers found"
        );
    } else {
        tracing::warn!(
            issues = report.issues.len(),
            files = report.affected_files().len(),
            "Residual identifiers found in output"
        );
    }
    Ok(report)
}

struct IssueSink<'a> {
    validator: &'a Validator,
    report: &'a mut ValidationReport,
    file: &'a str,
    line: usize,
}

impl IssueSink<'_> {
    fn scan_record(&mut self, record: &Value, fields: &TextFields) -> Result<()> {
        match record {
            Value::Object(map) => {
                for (key, value) in map {
                    if fields.includes(key) {
                        self.scan_value(value, key)?;
                    }
                }
                Ok(())
            }
            other if *fields == TextFields::All => self.scan_value(other, ""),
            _ => Ok(()),
        }
    }

    fn scan_value(&mut self, value: &Value, path: &str) -> Result<()> {
        match value {
            Value::String(text) => self.scan_text(text, Some(path)),
            Value::Object(map) => {
                for (key, child) in map {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    self.scan_value(child, &child_path)?;
                }
                Ok(())
            }
            Value::Array(items) => {
                for (idx, child) in items.iter().enumerate() {
                    self.scan_value(child, &format!("{path}[{idx}]"))?;
                }
                Ok(())
            }
            Value::Number(_) | Value::Bool(_) | Value::Null => Ok(()),
        }
    }

    fn scan_text(&mut self, text: &str, field: Option<&str>) -> Result<()> {
        let issues = match self.validator.scan(text) {
            Ok(issues) => issues,
            Err(err @ DeidError::Detection(_)) => {
                tracing::warn!(
                    file = %self.file,
                    line = self.line,
                    field = field.unwrap_or(""),
                    error = %err,
                    "Field could not be scanned"
                );
                self.report.record_unscanned();
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        for issue in issues {
            self.report.record_issue(DatasetIssue {
                file: self.file.to_string(),
                line: self.line,
                field: field.map(str::to_string),
                category: issue.category,
                excerpt: issue.excerpt,
            });
        }
        Ok(())
    }
}
