//! Import/merge engine (C9, §4.9).
//!
//! Matches each incoming record against the in-memory store in precedence
//! order (external ref, content fingerprint, identifier, else new), then
//! merges matched pairs field-by-field using `updated_at` (ties broken by
//! fingerprint) to decide a winner.

use std::path::Path;

use crate::error::SyncError;
use crate::model::{Comment, Dependency, Issue};
use crate::persistence::canonical;
use crate::store::IssueStore;

/// Summary of one import/merge run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Ids that matched an existing record and were merged.
    pub merged: Vec<String>,
    /// Ids inserted as brand-new records.
    pub inserted: Vec<String>,
}

/// Reads `path` as an import snapshot and merges it into `store`.
///
/// Pre-flight rejections (fatal, not partial): unresolved conflict markers
/// in the file, or (when `overwrite_empty_guard` is set) a non-empty store
/// being asked to import an empty snapshot.
pub fn import_snapshot(store: &mut IssueStore, path: &Path, overwrite_empty_guard: bool) -> Result<ImportReport, SyncError> {
    if canonical::scan_conflict_markers(path).map_err(|_| SyncError::MergeConflictDetected)? {
        return Err(SyncError::MergeConflictDetected);
    }

    let incoming = canonical::read_all_strict(path).map_err(|e| SyncError::JsonlParseError {
        line: 0,
        reason: e.to_string(),
    })?;

    if overwrite_empty_guard && incoming.is_empty() && !store.is_empty() {
        return Err(SyncError::WouldOverwriteData { existing: store.len() });
    }

    Ok(merge_all(store, incoming))
}

/// Merges an already-parsed snapshot (used directly by tests and by callers
/// that have their own path-reading policy).
pub fn merge_all(store: &mut IssueStore, incoming: Vec<Issue>) -> ImportReport {
    let mut report = ImportReport::default();
    for candidate in incoming {
        match find_match(store, &candidate) {
            Some(existing_id) => {
                let existing = store.get(&existing_id).expect("matched id must exist").clone();
                let merged = merge_pair(existing, candidate);
                store.replace(merged).expect("existing id must still be present");
                report.merged.push(existing_id.as_str().to_string());
            }
            None => {
                let id = candidate.id.as_str().to_string();
                store.insert(candidate).expect("new id must not collide");
                report.inserted.push(id);
            }
        }
    }
    report
}

fn find_match(store: &IssueStore, candidate: &Issue) -> Option<crate::id::IssueId> {
    if let Some(external_ref) = candidate.external_ref.as_deref().filter(|s| !s.is_empty()) {
        if let Some(existing) = store.get_by_external_ref(external_ref) {
            return Some(existing.id.clone());
        }
    }
    if let Some(existing) = store.get_by_fingerprint(&candidate.fingerprint) {
        return Some(existing.id.clone());
    }
    if store.get(&candidate.id).is_some() {
        return Some(candidate.id.clone());
    }
    None
}

/// Merge rule: the record with the greater `updated_at` wins on scalar
/// fields; ties resolve by lexicographically greater fingerprint. Embedded
/// lists union by their respective key. The merged record always keeps the
/// in-memory identifier (`existing.id`), never the incoming side's — an
/// incoming record matched by external ref or fingerprint may carry a
/// different, even rewritten, id, and the store indexes by the existing one.
fn merge_pair(existing: Issue, incoming: Issue) -> Issue {
    let existing_id = existing.id.clone();
    let incoming_wins = match incoming.updated_at.as_secs().cmp(&existing.updated_at.as_secs()) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => incoming.fingerprint > existing.fingerprint,
    };

    let (mut winner, loser) = if incoming_wins {
        (incoming, existing)
    } else {
        (existing, incoming)
    };

    winner.id = existing_id;
    winner.labels = union_labels(&winner.labels, &loser.labels);
    winner.dependencies = union_dependencies(&winner.dependencies, &loser.dependencies);
    winner.comments = union_comments(&winner.comments, &loser.comments);
    winner
}

fn union_labels(a: &[String], b: &[String]) -> Vec<String> {
    let mut merged = a.to_vec();
    for label in b {
        if !merged.contains(label) {
            merged.push(label.clone());
        }
    }
    merged
}

fn union_dependencies(a: &[Dependency], b: &[Dependency]) -> Vec<Dependency> {
    let mut merged = a.to_vec();
    for dep in b {
        if !merged.iter().any(|existing| existing.merge_key() == dep.merge_key()) {
            merged.push(dep.clone());
        }
    }
    merged
}

fn union_comments(a: &[Comment], b: &[Comment]) -> Vec<Comment> {
    let mut merged = a.to_vec();
    for comment in b {
        if !merged.iter().any(|existing| existing.id == comment.id) {
            merged.push(comment.clone());
        }
    }
    merged.sort_by_key(|c| c.id);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DependencyKind, IssueStatus, IssueType, Priority};
    use crate::time::Timestamp;

    fn base_issue(id: &str, updated: i64) -> Issue {
        Issue {
            id: id.parse().unwrap(),
            fingerprint: format!("{id:0>64}"),
            title: "t".to_string(),
            description: None,
            design: None,
            acceptance_criteria: None,
            notes: None,
            status: IssueStatus::Open,
            priority: Priority::MEDIUM,
            issue_type: IssueType::Task,
            assignee: None,
            owner: None,
            creator: None,
            created_at: Timestamp::from_secs(1),
            updated_at: Timestamp::from_secs(updated),
            closed_at: None,
            due_at: None,
            defer_until: None,
            external_ref: None,
            source_system: None,
            pinned: false,
            is_template: false,
            labels: Vec::new(),
            dependencies: Vec::new(),
            comments: Vec::new(),
            events: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn new_record_is_inserted() {
        let mut store = IssueStore::new();
        let report = merge_all(&mut store, vec![base_issue("bd-a", 1)]);
        assert_eq!(report.inserted, vec!["bd-a"]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn matches_by_external_ref_before_fingerprint() {
        let mut store = IssueStore::new();
        let mut existing = base_issue("bd-a", 1);
        existing.external_ref = Some("EXT-1".to_string());
        store.insert(existing).unwrap();

        let mut incoming = base_issue("bd-completely-different", 5);
        incoming.fingerprint = "f".repeat(64);
        incoming.external_ref = Some("EXT-1".to_string());
        let report = merge_all(&mut store, vec![incoming]);
        assert_eq!(report.merged, vec!["bd-a"]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn greater_updated_at_wins_scalar_fields() {
        let mut store = IssueStore::new();
        let mut existing = base_issue("bd-a", 1);
        existing.title = "old title".to_string();
        store.insert(existing).unwrap();

        let mut incoming = base_issue("bd-a", 10);
        incoming.title = "new title".to_string();
        merge_all(&mut store, vec![incoming]);

        assert_eq!(store.get(&"bd-a".parse().unwrap()).unwrap().title, "new title");
    }

    #[test]
    fn embedded_lists_union_rather_than_overwrite() {
        let mut store = IssueStore::new();
        let mut existing = base_issue("bd-a", 1);
        existing.labels = vec!["alpha".to_string()];
        existing.dependencies.push(Dependency {
            from: "bd-a".parse().unwrap(),
            to: "bd-b".parse().unwrap(),
            kind: DependencyKind::Related,
        });
        store.insert(existing).unwrap();

        let mut incoming = base_issue("bd-a", 10);
        incoming.labels = vec!["beta".to_string()];
        incoming.dependencies.push(Dependency {
            from: "bd-a".parse().unwrap(),
            to: "bd-c".parse().unwrap(),
            kind: DependencyKind::Related,
        });
        merge_all(&mut store, vec![incoming]);

        let merged = store.get(&"bd-a".parse().unwrap()).unwrap();
        assert_eq!(merged.labels.len(), 2);
        assert_eq!(merged.dependencies.len(), 2);
    }

    #[test]
    fn merge_keeps_existing_identifier_even_when_incoming_wins() {
        let mut store = IssueStore::new();
        let existing = base_issue("bd-a", 1);
        let existing_fingerprint = existing.fingerprint.clone();
        store.insert(existing).unwrap();

        let mut incoming = base_issue("bd-rewritten", 10);
        incoming.fingerprint = existing_fingerprint;
        incoming.title = "renamed upstream".to_string();
        let report = merge_all(&mut store, vec![incoming]);

        assert_eq!(report.merged, vec!["bd-a"]);
        assert!(store.get(&"bd-rewritten".parse().unwrap()).is_none());
        let merged = store.get(&"bd-a".parse().unwrap()).unwrap();
        assert_eq!(merged.title, "renamed upstream");
    }

    #[test]
    fn overwrite_empty_guard_rejects_wiping_snapshot() {
        let mut store = IssueStore::new();
        store.insert(base_issue("bd-a", 1)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        std::fs::write(&path, "").unwrap();
        let err = import_snapshot(&mut store, &path, true).unwrap_err();
        assert!(matches!(err, SyncError::WouldOverwriteData { existing: 1 }));
    }

    #[test]
    fn conflict_markers_are_rejected() {
        let mut store = IssueStore::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conflicted.jsonl");
        std::fs::write(&path, "<<<<<<< ours\n").unwrap();
        let err = import_snapshot(&mut store, &path, false).unwrap_err();
        assert!(matches!(err, SyncError::MergeConflictDetected));
    }
}
