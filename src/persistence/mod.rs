//! Durable storage (C3-C5, C8, §4.3-§4.5, §4.8): the exclusive lock,
//! canonical file, write-ahead log, and compactor that together give the
//! workspace crash-safe multi-writer persistence.

pub mod canonical;
pub mod compactor;
pub mod file_lock;
pub mod wal;

pub use compactor::compact;
pub use file_lock::ExclusiveLock;
pub use wal::{WalOp, WalRecord, WriteAheadLog};

use std::path::{Path, PathBuf};

/// The three well-known paths inside a `.beads/` workspace directory (§6).
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    /// Canonical line-delimited JSON file.
    pub canonical: PathBuf,
    /// Write-ahead log.
    pub wal: PathBuf,
    /// Advisory exclusive lock file.
    pub lock: PathBuf,
}

impl WorkspacePaths {
    /// Resolves the three paths beneath `dir` (the `.beads` directory
    /// itself, not its parent).
    #[must_use]
    pub fn under(dir: &Path) -> Self {
        Self {
            canonical: dir.join("beads.jsonl"),
            wal: dir.join("beads.wal"),
            lock: dir.join("beads.lock"),
        }
    }
}
