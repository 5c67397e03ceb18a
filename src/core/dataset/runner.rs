//! Dataset runner - de-identifies a directory tree of record files
//!
//! Files are processed concurrently on blocking worker tasks while the engine
//! serializes every mapping store access through its single mutex, so one
//! store is shared by the whole dataset. Each output file is written to a temp
//! file beside its target and renamed into place only once complete.

use crate::core::dataset::discover::record_files;
use crate::core::dataset::options::{
    default_mapping_path, DatasetOptions, PersistMode, SHUTDOWN_REASON,
};
use crate::core::dataset::summary::DatasetSummary;
use crate::core::validation::validate_dataset;
use crate::deidentification::audit::{DatasetAudit, DateShiftAudit, FileAudit, TracingReporter};
use crate::deidentification::{
    DeidentificationConfig, DeidentificationEngine, DetectionStats, TextFields,
};
use crate::domain::{DeidError, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Result of one completed file
#[derive(Debug)]
struct FileOutcome {
    audit: FileAudit,
    stats: DetectionStats,
}

/// De-identify every record file under `input_dir` into `output_dir`
///
/// The input tree is mirrored under the output root. One mapping store, one
/// audit JSON and (when validation is enabled) one validation report are
/// written for the whole dataset.
///
/// A strict-mode failure or a shutdown signal stops scheduling new files;
/// files already running finish, the store and audit are saved and the
/// returned summary carries the abort reason.
///
/// # Errors
///
/// - [`DeidError::Config`] for invalid settings or directories
/// - [`DeidError::Store`] when the mapping store cannot be loaded or saved
pub async fn deidentify_dataset(
    input_dir: &Path,
    output_dir: &Path,
    mut config: DeidentificationConfig,
    options: DatasetOptions,
) -> Result<DatasetSummary> {
    let start_time = Instant::now();

    if !input_dir.is_dir() {
        return Err(DeidError::Config(format!(
            "Input directory not found: {}",
            input_dir.display()
        )));
    }
    tokio::fs::create_dir_all(output_dir).await?;
    let input_root = input_dir.canonicalize()?;
    let output_root = output_dir.canonicalize()?;
    if input_root.starts_with(&output_root) {
        return Err(DeidError::Config(
            "Input directory must not be the output directory or inside it".to_string(),
        ));
    }

    let mapping_path = options
        .mapping_path
        .clone()
        .or_else(|| config.mapping_path.clone())
        .unwrap_or_else(|| default_mapping_path(&output_root));
    let audit_path = options.audit_path_for(&output_root);
    config.mapping_path = Some(mapping_path.clone());

    let exclude = output_root
        .starts_with(&input_root)
        .then_some(output_root.as_path());
    let files = record_files(&input_root, &options, exclude)?;

    let reporter = Arc::new(TracingReporter::new(config.log_detections));
    let engine = tokio::task::spawn_blocking(move || DeidentificationEngine::new(config, reporter))
        .await
        .map_err(|e| DeidError::Aborted(format!("Engine initialization task failed: {e}")))??;
    let engine = Arc::new(engine);

    let engine_config = engine.config();
    let strict = engine_config.strict_mode;
    let mut audit = DatasetAudit::new(
        uuid::Uuid::new_v4().to_string(),
        &engine_config.countries,
        DateShiftAudit {
            enabled: engine_config.enable_date_shifting,
            range_days: engine_config.date_shift_range_days,
            preserve_intervals: engine_config.preserve_date_intervals,
        },
    );
    audit.encryption_enabled = engine_config.enable_encryption();
    audit.strict_mode = strict;

    tracing::info!(
        run_id = %audit.run_id,
        input_dir = %input_root.display(),
        output_dir = %output_root.display(),
        files = files.len(),
        workers = options.workers.max(1),
        "Starting dataset de-identification"
    );

    let workers = options.workers.max(1);
    let total_files = files.len();
    let mut pending = files.into_iter();
    let mut tasks: JoinSet<(PathBuf, Result<FileOutcome>)> = JoinSet::new();
    let mut files_failed = 0;
    let mut completed = 0;
    let mut stop = false;

    loop {
        while !stop && tasks.len() < workers {
            if options.shutdown_requested() {
                tracing::warn!("Shutdown requested; no further files will be started");
                audit
                    .aborted
                    .get_or_insert_with(|| SHUTDOWN_REASON.to_string());
                stop = true;
                break;
            }
            let Some(relative) = pending.next() else {
                break;
            };
            let engine = Arc::clone(&engine);
            let input = input_root.join(&relative);
            let output = output_root.join(&relative);
            let fields = options.text_fields.clone();
            tasks.spawn_blocking(move || {
                let result = process_file(&engine, &input, &output, &relative, &fields);
                (relative, result)
            });
        }

        let Some(joined) = tasks.join_next().await else {
            break;
        };
        completed += 1;

        match joined {
            Ok((relative, Ok(outcome))) => {
                tracing::debug!(
                    file = %relative.display(),
                    completed = completed,
                    total = total_files,
                    "File progress"
                );
                audit.add_file(outcome.audit, &outcome.stats);
                if options.persist_mode == PersistMode::AfterEachFile {
                    if let Err(e) = persist_store(&engine).await {
                        crate::log_error_with_context!(&e, "Failed to persist mapping store");
                        audit.errors.push(e.to_string());
                        audit.aborted.get_or_insert_with(|| e.to_string());
                        stop = true;
                    }
                }
            }
            Ok((relative, Err(err))) => {
                files_failed += 1;
                let name = relative.display().to_string();
                tracing::error!(
                    file = %name,
                    error_kind = err.kind(),
                    error = %err,
                    "Failed to process file"
                );
                audit.errors.push(format!("{name}: {err}"));
                if strict || matches!(err, DeidError::Store(_) | DeidError::Aborted(_)) {
                    audit
                        .aborted
                        .get_or_insert_with(|| format!("{name}: {err}"));
                    stop = true;
                }
            }
            Err(join_err) => {
                files_failed += 1;
                tracing::error!(error = %join_err, "File worker task failed");
                audit.errors.push(format!("worker task failed: {join_err}"));
                if strict {
                    audit
                        .aborted
                        .get_or_insert_with(|| "worker task failed".to_string());
                    stop = true;
                }
            }
        }
    }

    let persisted = persist_store(&engine).await;
    if let Err(e) = &persisted {
        crate::log_error_with_context!(e, "Failed to persist mapping store");
        audit.errors.push(e.to_string());
        audit.aborted.get_or_insert_with(|| e.to_string());
    }

    let (created, total) = engine.mapping_counts()?;
    audit.mappings_created = created;
    audit.mappings_total = total;
    audit.completed_at = chrono::Utc::now();
    audit.write(&audit_path)?;
    persisted?;

    let mut summary = DatasetSummary::from_audit(&audit, mapping_path, audit_path);
    summary.files_failed = files_failed;

    if engine.config().enable_validation && audit.aborted.is_none() {
        let validator = engine.validator().clone();
        let scan_root = output_root.clone();
        let scan_options = options.clone();
        let report = tokio::task::spawn_blocking(move || {
            validate_dataset(&scan_root, &validator, &scan_options)
        })
        .await
        .map_err(|e| DeidError::Aborted(format!("Validation task failed: {e}")))??;
        report.write(&options.report_path_for(&output_root))?;
        summary.validation = Some(report);
    }

    let summary = summary.with_duration(start_time.elapsed());
    crate::log_dataset_complete!(summary.files_processed, summary.duration);
    Ok(summary)
}

/// Save the mapping store off the async runtime; encryption and fsync block
async fn persist_store(engine: &Arc<DeidentificationEngine>) -> Result<()> {
    let engine = Arc::clone(engine);
    tokio::task::spawn_blocking(move || engine.persist_store())
        .await
        .map_err(|e| DeidError::Aborted(format!("Store persist task failed: {e}")))?
}

/// De-identify one record file into `output`
///
/// Malformed lines are dropped and counted; in strict mode they fail the file.
/// On any error the temp file is discarded and `output` is left untouched.
fn process_file(
    engine: &DeidentificationEngine,
    input: &Path,
    output: &Path,
    relative: &Path,
    fields: &TextFields,
) -> Result<FileOutcome> {
    let name = relative.display().to_string();
    crate::log_file_start!(name);
    let started = Instant::now();

    let parent = output
        .parent()
        .ok_or_else(|| DeidError::Io(format!("Output path has no parent: {name}")))?;
    std::fs::create_dir_all(parent)?;

    let reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(tempfile::NamedTempFile::new_in(parent)?);
    let mut audit = FileAudit {
        file: name.clone(),
        ..Default::default()
    };
    let mut stats = DetectionStats::new();

    for (idx, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        let line_no = idx + 1;
        let bytes = line.strip_suffix(b"\r").unwrap_or(&line);
        if bytes.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let record: Value = match serde_json::from_slice(bytes) {
            Ok(record) => record,
            Err(e) => {
                audit.records_failed += 1;
                tracing::warn!(
                    file = %name,
                    line = line_no,
                    error_kind = ?e.classify(),
                    "Dropped malformed record"
                );
                if engine.config().strict_mode {
                    return Err(DeidError::Aborted(format!(
                        "malformed record at line {line_no}"
                    )));
                }
                continue;
            }
        };

        let outcome = engine.deidentify_record(record, fields)?;
        serde_json::to_writer(&mut writer, &outcome.record)?;
        writer.write_all(b"\n")?;
        audit.records_processed += 1;
        stats.merge(&outcome.stats);
    }

    let temp = writer
        .into_inner()
        .map_err(|e| DeidError::Io(format!("Failed to flush {name}: {}", e.error())))?;
    temp.as_file().sync_all()?;
    temp.persist(output)
        .map_err(|e| DeidError::Io(format!("Failed to write {name}: {}", e.error)))?;

    audit.detections = stats.total();
    audit.unparsed_dates = stats.unparsed_dates;
    audit.field_errors = stats.field_errors;
    crate::log_file_complete!(name, audit.records_processed, started.elapsed());

    Ok(FileOutcome { audit, stats })
}
