//! Export discovery and loading.
//!
//! Paths may be files or directories. Directories are scanned one level
//! deep for `*.json`, in file-name order, so the batch order (and with it
//! duplicate provenance) is stable across runs.

use std::fs;
use std::path::{Path, PathBuf};

use capsule_core::consolidate::SkippedBatch;
use capsule_core::{Consolidation, HistoryConsolidator, NormalizeConfig, RawBatch};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("export path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no *.json export files under {}", .0.display())]
    Empty(PathBuf),
}

/// Expand `paths` into the ordered list of export files.
///
/// # Errors
///
/// Fails if a path does not exist, a directory cannot be listed, or a
/// directory holds no `*.json` files.
pub fn collect_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>, InputError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = json_files_in(path)?;
            if found.is_empty() {
                return Err(InputError::Empty(path.clone()));
            }
            files.append(&mut found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(InputError::NotFound(path.clone()));
        }
    }
    Ok(files)
}

fn json_files_in(dir: &Path) -> Result<Vec<PathBuf>, InputError> {
    let unreadable = |source| InputError::Unreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Batches that decoded as JSON, plus files that did not.
#[derive(Debug, Default)]
pub struct Loaded {
    pub batches: Vec<RawBatch>,
    pub undecodable: Vec<SkippedBatch>,
}

/// Read and decode every file. Invalid JSON is not an error here; the file
/// is recorded as an unreadable batch instead.
///
/// # Errors
///
/// Fails only when a file cannot be read at all.
pub fn read_batches(files: &[PathBuf]) -> Result<Loaded, InputError> {
    let mut loaded = Loaded::default();
    for path in files {
        let id = batch_id(path);
        let content = fs::read_to_string(path).map_err(|source| InputError::Unreadable {
            path: path.clone(),
            source,
        })?;
        match serde_json::from_str::<Value>(&content) {
            Ok(payload) => {
                debug!(batch = %id, bytes = content.len(), "loaded export");
                loaded.batches.push(RawBatch::new(id, payload));
            }
            Err(e) => {
                warn!(batch = %id, error = %e, "export is not valid JSON");
                loaded.undecodable.push(SkippedBatch {
                    id,
                    reason: format!("invalid JSON: {e}"),
                });
            }
        }
    }
    Ok(loaded)
}

/// Load `paths` and consolidate them under `config`.
///
/// # Errors
///
/// See [`collect_paths`] and [`read_batches`].
pub fn load_log(paths: &[PathBuf], config: &NormalizeConfig) -> Result<Consolidation, InputError> {
    let files = collect_paths(paths)?;
    let loaded = read_batches(&files)?;

    let mut result = HistoryConsolidator::new(config).ingest(&loaded.batches);
    result.report.batches_seen += loaded.undecodable.len();
    result.report.batches_skipped.extend(loaded.undecodable);
    Ok(result)
}

fn batch_id(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}
