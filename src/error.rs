//! Error types for beads-core.
//!
//! All errors are strongly typed using thiserror. This enables pattern
//! matching on specific error conditions and keeps the machine-readable
//! code stable across error message wording changes.

use thiserror::Error;

use crate::id::IssueId;

/// Errors about the on-disk workspace itself.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// `open` was called against a directory with no `.beads/` workspace.
    #[error("workspace not initialized at {path}")]
    NotInitialized {
        /// Directory that was checked.
        path: String,
    },

    /// `init` was called against a directory that already has a workspace.
    #[error("workspace already initialized at {path}")]
    AlreadyInitialized {
        /// Directory that was checked.
        path: String,
    },

    /// A mutating operation was attempted against a workspace opened via
    /// [`crate::Workspace::open_read_only`], which never acquires
    /// `beads.lock` (§4.4: "readers may concurrently open the canonical file
    /// and WAL without the lock").
    #[error("workspace at {path} was opened read-only")]
    ReadOnly {
        /// Directory that was checked.
        path: String,
    },
}

/// Errors from the identifier codec (C1).
#[derive(Debug, Error)]
pub enum IdentifierError {
    /// `decode`/`parse` received a string that is not a valid identifier.
    #[error("invalid issue id '{value}': {reason}")]
    InvalidIssueId {
        /// The offending string.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// `generate_child` was asked to extend an id already at max depth.
    #[error("id '{parent}' is already at the maximum hierarchy depth (3)")]
    MaxHierarchyDepthExceeded {
        /// The parent id that could not be extended.
        parent: String,
    },
}

/// Errors about issue records (C2/C6).
#[derive(Debug, Error)]
pub enum IssueError {
    /// No issue with the given id exists in the store.
    #[error("issue not found: {id}")]
    IssueNotFound {
        /// The missing id.
        id: IssueId,
    },

    /// Title is empty or exceeds 500 characters.
    #[error("title length {len} is out of bounds (1..=500)")]
    TitleTooLong {
        /// Length that was rejected.
        len: usize,
    },

    /// Priority outside 0..=4.
    #[error("invalid priority: {value}")]
    InvalidPriority {
        /// The rejected value, rendered as given (numeric or named).
        value: String,
    },

    /// Status string did not match any known or custom-encodable form.
    #[error("invalid status: {value}")]
    InvalidStatus {
        /// The rejected value.
        value: String,
    },

    /// `close` on an issue that is already closed.
    #[error("issue {id} is already closed")]
    AlreadyClosed {
        /// The issue id.
        id: IssueId,
    },

    /// `reopen` on an issue that isn't closed.
    #[error("issue {id} is not closed")]
    NotClosed {
        /// The issue id.
        id: IssueId,
    },

    /// Any mutating operation against a tombstoned issue.
    #[error("issue {id} has already been deleted")]
    AlreadyDeleted {
        /// The issue id.
        id: IssueId,
    },
}

/// Errors from the dependency graph (C7).
#[derive(Debug, Error)]
pub enum GraphError {
    /// `add_edge` would close a cycle in the blocks/parent_child subgraph.
    #[error("adding this dependency would create a cycle: {}", render_path(.0))]
    CycleDetected(Vec<IssueId>),

    /// `add_edge(id, id, _)`.
    #[error("issue {id} cannot depend on itself")]
    SelfDependency {
        /// The offending id.
        id: IssueId,
    },

    /// `remove_edge`/`blockers`/`dependents` referenced a missing issue.
    #[error("dependency endpoint not found: {id}")]
    DependencyNotFound {
        /// The missing id.
        id: IssueId,
    },
}

fn render_path(path: &[IssueId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors from the import/merge engine (C9).
#[derive(Debug, Error)]
pub enum SyncError {
    /// The incoming snapshot contains unresolved `<<<<<<<` conflict markers.
    #[error("merge conflict markers present in import source")]
    MergeConflictDetected,

    /// A line of a `.jsonl` file failed to parse.
    #[error("failed to parse line {line}: {reason}")]
    JsonlParseError {
        /// 1-based line number.
        line: usize,
        /// Parse failure detail.
        reason: String,
    },

    /// Import was asked to read a path outside the workspace directory.
    #[error("external path not allowed: {path}")]
    ExternalPathNotAllowed {
        /// The rejected path.
        path: String,
    },

    /// The overwrite-empty guard rejected an import that would wipe data.
    #[error("import would overwrite {existing} existing issues with an empty snapshot")]
    WouldOverwriteData {
        /// Number of issues currently in the store.
        existing: usize,
    },
}

/// Errors from the storage layer (C3/C4/C5/C8).
#[derive(Debug, Error)]
pub enum StorageError {
    /// Lock acquisition failed for a reason other than contention/timeout.
    #[error("failed to acquire lock at {path}: {reason}")]
    LockFailed {
        /// Lock file path.
        path: String,
        /// OS-level detail.
        reason: String,
    },

    /// `acquire_timeout` elapsed before the lock could be obtained.
    #[error("timed out after {ms}ms waiting for lock at {path}")]
    LockTimeout {
        /// Lock file path.
        path: String,
        /// Timeout that elapsed.
        ms: u64,
    },

    /// WAL replay found a non-trailing corrupt record.
    #[error("write-ahead log corrupted at byte offset {offset}: {reason}")]
    WalCorrupted {
        /// Byte offset of the bad record.
        offset: u64,
        /// Parse/format failure detail.
        reason: String,
    },

    /// Compaction failed after the canonical rename but before WAL truncation.
    #[error("compaction failed: {reason}")]
    CompactionFailed {
        /// Failure detail.
        reason: String,
    },

    /// The atomic temp-file rename over the canonical file failed.
    #[error("atomic rename of {path} failed: {reason}")]
    AtomicRenameFailed {
        /// Target path.
        path: String,
        /// OS-level detail.
        reason: String,
    },

    /// A line of the canonical file or WAL failed to parse.
    #[error("corrupt line {line} in {path}: {reason}")]
    CorruptLine {
        /// File the line came from.
        path: String,
        /// 1-based line number.
        line: usize,
        /// Parse failure detail.
        reason: String,
    },

    /// Wrapped `std::io::Error`, tagged with the path it concerns.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path the I/O operation concerned.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error type for beads-core.
#[derive(Debug, Error)]
pub enum BeadsError {
    /// Workspace lifecycle error.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// Identifier codec error.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    /// Issue validation/lifecycle error.
    #[error(transparent)]
    Issue(#[from] IssueError),

    /// Dependency graph error.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Import/merge error.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Storage/durability error.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The exit-status contract surfaced to an external command dispatcher (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// User error: bad input, not-initialized, cycle, already closed, etc.
    User = 1,
    /// System error: I/O failure, lock failure, corruption.
    System = 2,
}

impl BeadsError {
    /// Maps this error to the exit-status class a dispatcher should use.
    ///
    /// Success (0) is never represented by an error value, so it has no
    /// variant here.
    #[must_use]
    pub const fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Storage(_) => ExitStatus::System,
            Self::Workspace(_) | Self::Identifier(_) | Self::Issue(_) | Self::Graph(_) | Self::Sync(_) => {
                ExitStatus::User
            }
        }
    }
}

/// Result alias used throughout the crate.
pub type BeadsResult<T> = Result<T, BeadsError>;

impl StorageError {
    /// Wraps a `std::io::Error` with path context, preserving its category.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_classifies_storage_as_system() {
        let err = BeadsError::Storage(StorageError::LockTimeout {
            path: "beads.lock".into(),
            ms: 50,
        });
        assert_eq!(err.exit_status(), ExitStatus::System);
    }

    #[test]
    fn exit_status_classifies_user_errors() {
        let err = BeadsError::Graph(GraphError::SelfDependency {
            id: "bd-abc".parse().unwrap(),
        });
        assert_eq!(err.exit_status(), ExitStatus::User);
    }

    #[test]
    fn cycle_detected_renders_path() {
        let a: IssueId = "bd-aaa".parse().unwrap();
        let b: IssueId = "bd-bbb".parse().unwrap();
        let err = GraphError::CycleDetected(vec![a.clone(), b.clone(), a]);
        let msg = err.to_string();
        assert!(msg.contains("bd-aaa -> bd-bbb -> bd-aaa"));
    }
}
