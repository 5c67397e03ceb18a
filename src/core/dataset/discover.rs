//! Record file discovery

use crate::core::dataset::options::{DatasetOptions, ARTIFACT_DIR};
use crate::domain::{DeidError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Record files under `root`, as paths relative to `root`, sorted
///
/// `exclude` (typically the output root when it sits inside the input) and
/// any `_deidentification` artifact directory are never entered.
pub fn record_files(
    root: &Path,
    options: &DatasetOptions,
    exclude: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(DeidError::Config(format!(
            "Not a directory: {}",
            root.display()
        )));
    }

    let starts: Vec<PathBuf> = if options.subdirectories.is_empty() {
        vec![root.to_path_buf()]
    } else {
        let mut starts = Vec::with_capacity(options.subdirectories.len());
        for sub in &options.subdirectories {
            let dir = root.join(sub);
            if !dir.is_dir() {
                return Err(DeidError::Config(format!(
                    "Subdirectory '{sub}' not found under {}",
                    root.display()
                )));
            }
            starts.push(dir);
        }
        starts
    };

    let mut files = Vec::new();
    for start in starts {
        let walker = WalkDir::new(&start).follow_links(false).into_iter();
        for entry in walker.filter_entry(|e| {
            let path = e.path();
            if e.file_type().is_dir() && e.file_name() == ARTIFACT_DIR {
                return false;
            }
            exclude.map_or(true, |excluded| !path.starts_with(excluded))
        }) {
            let entry = entry.map_err(|e| DeidError::Io(format!("Failed to walk directory: {e}")))?;
            if !entry.file_type().is_file() || !options.is_record_file(entry.path()) {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| DeidError::Io(e.to_string()))?;
            files.push(relative.to_path_buf());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}\n").unwrap();
    }

    #[test]
    fn test_walks_nested_and_filters_extensions() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "original/a.jsonl");
        touch(dir.path(), "original/deep/b.ndjson");
        touch(dir.path(), "original/readme.txt");
        touch(dir.path(), "_deidentification/audit.jsonl");

        let files = record_files(dir.path(), &DatasetOptions::default(), None).unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("original/a.jsonl"),
                PathBuf::from("original/deep/b.ndjson"),
            ]
        );
    }

    #[test]
    fn test_subdirectory_filter() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "original/a.jsonl");
        touch(dir.path(), "cleaned/b.jsonl");

        let options = DatasetOptions {
            subdirectories: vec!["cleaned".to_string()],
            ..Default::default()
        };
        let files = record_files(dir.path(), &options, None).unwrap();
        assert_eq!(files, vec![PathBuf::from("cleaned/b.jsonl")]);
    }

    #[test]
    fn test_missing_subdirectory_is_config_error() {
        let dir = TempDir::new().unwrap();
        let options = DatasetOptions {
            subdirectories: vec!["nope".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            record_files(dir.path(), &options, None),
            Err(DeidError::Config(_))
        ));
    }

    #[test]
    fn test_excluded_output_root_skipped() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.jsonl");
        touch(dir.path(), "out/a.jsonl");
        let out = dir.path().join("out");

        let files = record_files(dir.path(), &DatasetOptions::default(), Some(&out)).unwrap();
        assert_eq!(files, vec![PathBuf::from("a.jsonl")]);
    }
}
