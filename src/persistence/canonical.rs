//! Canonical file I/O (C3, §4.3): a line-delimited JSON file, one `Issue`
//! per line, sorted by identifier, replaced atomically on write.
//!
//! Grounded on the teacher's `SegmentWriter` atomic-rename pattern
//! (`src/storage/persistent/segment.rs`), adapted from binary+CRC framing to
//! plain UTF-8 JSON Lines: the canonical file must be human-diffable (§6),
//! so there is no header, no length prefix, no checksum.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use uuid::Uuid;

use crate::error::StorageError;
use crate::model::Issue;

const CONFLICT_MARKERS: [&str; 3] = ["<<<<<<<", "=======", ">>>>>>>"];

/// Reads every well-formed line as an `Issue`, skipping and logging corrupt
/// ones rather than failing the whole read (lenient, per §4.6's "strictly
/// lenient" load).
pub fn read_all(path: &Path) -> Result<Vec<Issue>, StorageError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).map_err(|e| StorageError::io(path.display().to_string(), e))?;
    let reader = BufReader::new(file);
    let mut issues = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| StorageError::io(path.display().to_string(), e))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Issue>(&line) {
            Ok(issue) => issues.push(issue),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = idx + 1,
                    error = %e,
                    "skipping corrupt canonical line"
                );
            }
        }
    }
    Ok(issues)
}

/// Same as [`read_all`] but fails on the first malformed line instead of
/// skipping it. Used by the import engine, which treats a malformed snapshot
/// as a fatal pre-flight rejection rather than something to silently repair.
pub fn read_all_strict(path: &Path) -> Result<Vec<Issue>, StorageError> {
    let file = File::open(path).map_err(|e| StorageError::io(path.display().to_string(), e))?;
    let reader = BufReader::new(file);
    let mut issues = Vec::with_capacity(16);
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| StorageError::io(path.display().to_string(), e))?;
        if line.trim().is_empty() {
            continue;
        }
        let issue = serde_json::from_str::<Issue>(&line).map_err(|e| StorageError::CorruptLine {
            path: path.display().to_string(),
            line: idx + 1,
            reason: e.to_string(),
        })?;
        issues.push(issue);
    }
    Ok(issues)
}

/// Writes `issues` sorted by identifier (I6) via the temp-file-then-rename
/// protocol: write + fsync the temp file, rename over the target, then fsync
/// the containing directory so the rename itself is durable.
pub fn write_all(path: &Path, issues: &[Issue]) -> Result<(), StorageError> {
    let mut sorted: Vec<&Issue> = issues.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let temp_path = dir.join(format!(".beads.jsonl.tmp.{}", Uuid::new_v4()));

    {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| StorageError::io(temp_path.display().to_string(), e))?;
        let mut writer = std::io::BufWriter::new(file);
        for issue in sorted {
            let line = serde_json::to_string(issue)
                .map_err(|e| StorageError::CorruptLine {
                    path: temp_path.display().to_string(),
                    line: 0,
                    reason: e.to_string(),
                })?;
            writer
                .write_all(line.as_bytes())
                .and_then(|()| writer.write_all(b"\n"))
                .map_err(|e| StorageError::io(temp_path.display().to_string(), e))?;
        }
        writer
            .flush()
            .map_err(|e| StorageError::io(temp_path.display().to_string(), e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| StorageError::io(temp_path.display().to_string(), e))?;
    }

    fs::rename(&temp_path, path).map_err(|e| StorageError::AtomicRenameFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }

    Ok(())
}

/// True if any line contains an unresolved merge-conflict marker
/// (`<<<<<<<`, `=======`, `>>>>>>>`); the import engine treats this as a
/// fatal pre-flight rejection (§4.9).
pub fn scan_conflict_markers(path: &Path) -> Result<bool, StorageError> {
    if !path.exists() {
        return Ok(false);
    }
    let file = File::open(path).map_err(|e| StorageError::io(path.display().to_string(), e))?;
    let reader = BufReader::new(file);
    for line in reader.lines() {
        let line = line.map_err(|e| StorageError::io(path.display().to_string(), e))?;
        if CONFLICT_MARKERS.iter().any(|m| line.starts_with(m)) {
            return Ok(true);
        }
    }
    Ok(false)
}
