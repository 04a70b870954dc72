//! In-memory issue store (C6, §4.6).
//!
//! Grounded on the teacher's `PersistentEntityStore`
//! (`src/storage/persistent/stores.rs`, a small trait over a
//! `RwLock<HashMap<...>>`), generalized from a hash-keyed index to an
//! ordered-vector-plus-position-map: canonical output must be sorted by
//! identifier (I6), which a plain hash map can't give us cheaply.

pub mod filters;

use std::collections::BTreeMap;

use crate::error::IssueError;
use crate::id::IssueId;
use crate::model::{Dependency, DependencyKind, Issue, IssueStatus};
use crate::persistence::wal::WalOp;
use crate::time::Timestamp;

pub use filters::ListFilters;

/// The in-memory dataset: an ordered list of issues, a position index, a
/// fingerprint→id dedupe index, and the set of identifiers touched since the
/// last compaction.
#[derive(Debug, Default)]
pub struct IssueStore {
    issues: Vec<Issue>,
    position_of: BTreeMap<IssueId, usize>,
    id_of_fingerprint: BTreeMap<String, IssueId>,
    dirty: std::collections::BTreeSet<IssueId>,
}

impl IssueStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from a canonical snapshot plus WAL records applied
    /// in order (§4.6 "load(P, WAL)"). The canonical read itself is expected
    /// to already be lenient (see [`crate::persistence::canonical::read_all`]);
    /// this just seeds the store and replays on top.
    pub fn load(canonical: Vec<Issue>, wal: impl IntoIterator<Item = WalOp>) -> Self {
        let mut store = Self::new();
        for issue in canonical {
            store.reindex_insert(issue);
        }
        for op in wal {
            // Replay is best-effort: operations against an id that no
            // longer resolves (e.g. a stale op after a later delete raced
            // it in a pathological WAL) are skipped rather than panicking.
            let _ = store.apply(op);
        }
        store.dirty.clear();
        store
    }

    fn reindex_insert(&mut self, issue: Issue) {
        if let Some(&pos) = self.position_of.get(&issue.id) {
            let old_fp = self.issues[pos].fingerprint.clone();
            if old_fp != issue.fingerprint {
                self.id_of_fingerprint.remove(&old_fp);
            }
            self.id_of_fingerprint
                .insert(issue.fingerprint.clone(), issue.id.clone());
            self.issues[pos] = issue;
        } else {
            let pos = self.issues.len();
            self.id_of_fingerprint
                .insert(issue.fingerprint.clone(), issue.id.clone());
            self.position_of.insert(issue.id.clone(), pos);
            self.issues.push(issue);
        }
    }

    /// Applies a single WAL operation to the in-memory state, matching
    /// §4.6's replay rules exactly: every variant but `delete` carries the
    /// full post-state issue and simply replaces the stored record;
    /// `delete` tombstones the existing record in place.
    pub fn apply(&mut self, op: WalOp) -> Result<(), IssueError> {
        match op {
            WalOp::Add(issue)
            | WalOp::Update(issue)
            | WalOp::Close(issue)
            | WalOp::Reopen(issue)
            | WalOp::SetBlocked(issue)
            | WalOp::UnsetBlocked(issue) => {
                let id = issue.id.clone();
                self.reindex_insert(issue);
                self.dirty.insert(id);
            }
            WalOp::Delete(id) => {
                let issue = self.get_mut(&id)?;
                issue.status = IssueStatus::Tombstone;
                self.dirty.insert(id);
            }
        }
        Ok(())
    }

    /// Inserts a brand-new issue (fails if the id is already in use, even by
    /// a tombstone — I1: tombstones reserve their identifier permanently).
    pub fn insert(&mut self, issue: Issue) -> Result<(), IssueError> {
        if self.position_of.contains_key(&issue.id) {
            return Err(IssueError::AlreadyDeleted { id: issue.id.clone() });
        }
        let id = issue.id.clone();
        self.reindex_insert(issue);
        self.dirty.insert(id);
        Ok(())
    }

    /// Looks up an issue by id.
    #[must_use]
    pub fn get(&self, id: &IssueId) -> Option<&Issue> {
        self.position_of.get(id).map(|&pos| &self.issues[pos])
    }

    /// Looks up an issue by content fingerprint (C9 phase 2).
    #[must_use]
    pub fn get_by_fingerprint(&self, fingerprint: &str) -> Option<&Issue> {
        self.id_of_fingerprint
            .get(fingerprint)
            .and_then(|id| self.get(id))
    }

    /// Looks up an issue by its external reference (C9 phase 1).
    #[must_use]
    pub fn get_by_external_ref(&self, external_ref: &str) -> Option<&Issue> {
        self.issues
            .iter()
            .find(|i| i.external_ref.as_deref() == Some(external_ref))
    }

    /// Mutable lookup, used by operations that stamp `updated_at` after
    /// editing a field.
    pub fn get_mut(&mut self, id: &IssueId) -> Result<&mut Issue, IssueError> {
        let pos = *self
            .position_of
            .get(id)
            .ok_or_else(|| IssueError::IssueNotFound { id: id.clone() })?;
        Ok(&mut self.issues[pos])
    }

    /// Replaces an issue wholesale (used by `update` and import merges).
    pub fn replace(&mut self, issue: Issue) -> Result<(), IssueError> {
        if !self.position_of.contains_key(&issue.id) {
            return Err(IssueError::IssueNotFound { id: issue.id.clone() });
        }
        let id = issue.id.clone();
        self.reindex_insert(issue);
        self.dirty.insert(id);
        Ok(())
    }

    /// Total number of records, including tombstones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// True if the store holds no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Identifiers touched since the last [`Self::clear_dirty`], for partial
    /// export.
    #[must_use]
    pub fn dirty_ids(&self) -> Vec<IssueId> {
        self.dirty.iter().cloned().collect()
    }

    /// Clears the dirty set (called after a successful compaction/export).
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Every issue currently held, including tombstones, in storage order
    /// (insertion order, not the display sort order — see
    /// [`crate::persistence::canonical::write_all`] for that).
    pub fn all(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter()
    }

    /// Filtered, sorted view per §4.6: priority ascending, then created_at
    /// descending, ties broken by identifier.
    #[must_use]
    pub fn list(&self, filters: &ListFilters, now: Timestamp) -> Vec<&Issue> {
        let mut matched: Vec<&Issue> = self
            .issues
            .iter()
            .filter(|issue| self.matches(issue, filters, now))
            .collect();
        matched.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        matched
    }

    fn matches(&self, issue: &Issue, filters: &ListFilters, now: Timestamp) -> bool {
        if issue.is_tombstone() && !filters.include_tombstones {
            return false;
        }
        if let Some(defer_until) = issue.defer_until {
            let visible = filters
                .include_deferred_before
                .map(|cutoff| defer_until.as_secs() <= cutoff.as_secs())
                .unwrap_or(defer_until.as_secs() <= now.as_secs());
            if !visible {
                return false;
            }
        }
        if let Some(statuses) = &filters.status_set {
            if !statuses.contains(&issue.status) {
                return false;
            }
        }
        if let Some((min, max)) = filters.priority_range {
            if issue.priority < min || issue.priority > max {
                return false;
            }
        }
        if let Some(types) = &filters.type_set {
            if !types.contains(&issue.issue_type) {
                return false;
            }
        }
        if let Some(assignee) = &filters.assignee {
            if issue.assignee.as_deref() != Some(assignee.as_str()) {
                return false;
            }
        }
        if let Some(owner) = &filters.owner {
            if issue.owner.as_deref() != Some(owner.as_str()) {
                return false;
            }
        }
        if let Some(any_of) = &filters.label_any_of {
            if !any_of.iter().any(|l| issue.labels.contains(l)) {
                return false;
            }
        }
        if let Some(all_of) = &filters.label_all_of {
            if !all_of.iter().all(|l| issue.labels.contains(l)) {
                return false;
            }
        }
        if let Some(needle) = &filters.text_substring {
            let needle = needle.to_lowercase();
            let haystack = format!(
                "{} {}",
                issue.title.to_lowercase(),
                issue.description.as_deref().unwrap_or("").to_lowercase()
            );
            if !haystack.contains(&needle) {
                return false;
            }
        }
        true
    }

    /// Outgoing `blocks` edges from `id` whose target is not closed/tombstone
    /// (C10 `blocked`/`ready`).
    #[must_use]
    pub fn outstanding_blockers(&self, id: &IssueId) -> Vec<IssueId> {
        let Some(issue) = self.get(id) else {
            return Vec::new();
        };
        issue
            .dependencies
            .iter()
            .filter(|d| d.kind == DependencyKind::Blocks)
            .filter_map(|d| {
                let target = self.get(&d.to)?;
                (!target.status.is_closed_or_tombstone()).then(|| d.to.clone())
            })
            .collect()
    }

    /// Reverse lookup: every dependency anywhere in the store whose `to`
    /// matches `id` (C7 `dependents`).
    #[must_use]
    pub fn dependents_of<'a>(&'a self, id: &'a IssueId) -> impl Iterator<Item = (&'a Issue, &'a Dependency)> {
        self.issues.iter().flat_map(move |issue| {
            issue
                .dependencies
                .iter()
                .filter(move |d| &d.to == id)
                .map(move |d| (issue, d))
        })
    }
}
