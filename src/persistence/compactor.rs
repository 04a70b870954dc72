//! Compaction (C8, §4.8): merge WAL into the canonical file and truncate.
//!
//! Grounded on the teacher's `PersistentStores::compact`
//! (`src/storage/persistent/stores.rs`) for the snapshot-then-atomic-write-
//! then-truncate shape, adapted to write a full canonical JSONL file in
//! place of a binary segment.

use std::path::Path;

use crate::error::StorageError;
use crate::persistence::canonical;
use crate::persistence::file_lock::ExclusiveLock;
use crate::persistence::wal::{self, WriteAheadLog};
use crate::store::IssueStore;

/// Runs one compaction cycle: acquire the lock, read canonical + WAL, build
/// state, write the new canonical via the atomic rename protocol, truncate
/// the WAL to zero length and fsync, then release the lock.
///
/// A failure before the canonical rename leaves the previous canonical and
/// WAL untouched. A failure between the rename and the truncate is the one
/// case the spec calls out as needing special care (§4.8): the canonical
/// file already reflects the merged state, so truncation failure here is
/// surfaced as a fatal [`StorageError::CompactionFailed`] rather than
/// silently leaving stale WAL entries that would double-apply non-idempotent
/// operations (`add`, `close`) on the next replay.
pub fn compact(canonical_path: &Path, wal_path: &Path, lock_path: &Path) -> Result<(), StorageError> {
    let _lock = ExclusiveLock::try_acquire(lock_path)?;

    let issues = canonical::read_all(canonical_path)?;
    let wal = WriteAheadLog::open(wal_path)?;
    let records = wal::iter(wal_path)?;
    let store = IssueStore::load(issues, records.map(|r| r.op));

    let merged: Vec<_> = store.all().cloned().collect();
    canonical::write_all(canonical_path, &merged)?;

    wal.truncate().map_err(|e| StorageError::CompactionFailed { reason: e.to_string() })?;

    Ok(())
}
