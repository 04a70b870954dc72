//! The `Workspace` facade: ties identifier generation, the in-memory store,
//! the dependency graph, the evaluator, and durable storage together into
//! the single entry point an external command dispatcher drives (§13
//! supplement; not explicitly named by the distilled spec, but the natural
//! completion of the on-disk layout §6 describes).
//!
//! Grounded on the teacher's `PersistentStores::open`
//! (`src/storage/persistent/stores.rs`): create-dir-all, then lock, then WAL.

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use rand::RngCore;

use crate::config::Config;
use crate::error::{BeadsResult, GraphError, IssueError, SyncError, WorkspaceError};
use crate::evaluator::{self, GroupBy};
use crate::graph;
use crate::id::{self, IssueId};
use crate::import::{self, ImportReport};
use crate::model::{Comment, DependencyKind, Issue, IssueStatus, IssueType, Priority};
use crate::persistence::wal::WalOp;
use crate::persistence::{ExclusiveLock, WorkspacePaths, WriteAheadLog};
use crate::store::{IssueStore, ListFilters};
use crate::time::{Clock, SystemClock, Timestamp};

/// Fields accepted by [`Workspace::add`]; everything but `title` is
/// optional and falls back to [`Config::defaults`].
#[derive(Debug, Clone, Default)]
pub struct NewIssue {
    /// Required title (§3: 1-500 characters).
    pub title: String,
    /// Optional long-form description.
    pub description: Option<String>,
    /// Overrides `defaults.priority` when set.
    pub priority: Option<Priority>,
    /// Overrides `defaults.issue_type` when set.
    pub issue_type: Option<IssueType>,
    /// Optional assignee.
    pub assignee: Option<String>,
    /// Optional labels.
    pub labels: Vec<String>,
    /// Optional external-system correlation fields.
    pub external_ref: Option<String>,
    /// Optional external-system name.
    pub source_system: Option<String>,
}

/// An open workspace: the WAL handle and in-memory store for the lifetime of
/// the value. `lock` is `Some` for a workspace opened read-write via
/// [`Workspace::init`]/[`Workspace::open`] (held for the object's lifetime,
/// §5: "each command execution is a short-lived single-threaded process"),
/// and `None` for one opened via [`Workspace::open_read_only`], which never
/// touches `beads.lock` at all (§4.4: "readers may concurrently open the
/// canonical file and WAL without the lock"). Every mutating method checks
/// `lock.is_some()` before touching the store.
pub struct Workspace {
    dir: PathBuf,
    paths: WorkspacePaths,
    lock: Option<ExclusiveLock>,
    wal: WriteAheadLog,
    store: IssueStore,
    config: Config,
    clock: Box<dyn Clock>,
    rng: Box<dyn RngCore + Send>,
}

impl Workspace {
    /// Creates a new workspace at `dir` (the `.beads` directory itself).
    /// Fails with [`WorkspaceError::AlreadyInitialized`] if one already
    /// exists there.
    pub fn init(dir: &Path, config: Config) -> BeadsResult<Self> {
        if dir.join("beads.jsonl").exists() {
            return Err(WorkspaceError::AlreadyInitialized {
                path: dir.display().to_string(),
            }
            .into());
        }
        fs::create_dir_all(dir).map_err(|e| crate::error::StorageError::io(dir.display().to_string(), e))?;
        let paths = WorkspacePaths::under(dir);
        let lock = ExclusiveLock::try_acquire(&paths.lock)?;
        crate::persistence::canonical::write_all(&paths.canonical, &[])?;
        let wal = WriteAheadLog::open(&paths.wal)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            paths,
            lock: Some(lock),
            wal,
            store: IssueStore::new(),
            config,
            clock: Box::new(SystemClock),
            rng: Box::new(OsRng),
        })
    }

    /// Opens an existing workspace for reading and writing, replaying the
    /// canonical file and WAL, and holding `beads.lock` for the lifetime of
    /// the returned value. Fails with [`WorkspaceError::NotInitialized`] if
    /// `dir` has no canonical file.
    pub fn open(dir: &Path, config: Config) -> BeadsResult<Self> {
        let paths = WorkspacePaths::under(dir);
        if !paths.canonical.exists() {
            return Err(WorkspaceError::NotInitialized {
                path: dir.display().to_string(),
            }
            .into());
        }
        let lock = ExclusiveLock::try_acquire(&paths.lock)?;
        let (store, wal) = Self::load(&paths)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            paths,
            lock: Some(lock),
            wal,
            store,
            config,
            clock: Box::new(SystemClock),
            rng: Box::new(OsRng),
        })
    }

    /// Opens an existing workspace for reading only, without ever acquiring
    /// `beads.lock` (§4.4). The returned value rejects every mutating method
    /// with [`WorkspaceError::ReadOnly`]; use it for listings, `ready`,
    /// `blocked`, and similar queries that should never contend with a
    /// concurrent writer's lock.
    pub fn open_read_only(dir: &Path, config: Config) -> BeadsResult<Self> {
        let paths = WorkspacePaths::under(dir);
        if !paths.canonical.exists() {
            return Err(WorkspaceError::NotInitialized {
                path: dir.display().to_string(),
            }
            .into());
        }
        let (store, wal) = Self::load(&paths)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            paths,
            lock: None,
            wal,
            store,
            config,
            clock: Box::new(SystemClock),
            rng: Box::new(OsRng),
        })
    }

    fn load(paths: &WorkspacePaths) -> BeadsResult<(IssueStore, WriteAheadLog)> {
        let issues = crate::persistence::canonical::read_all(&paths.canonical)?;
        let wal = WriteAheadLog::open(&paths.wal)?;
        let records = crate::persistence::wal::iter(&paths.wal)?;
        let store = IssueStore::load(issues, records.map(|r| r.op));
        Ok((store, wal))
    }

    /// Swaps in a deterministic clock and RNG, for tests that need
    /// reproducible timestamps and identifiers.
    #[must_use]
    pub fn with_clock_and_rng(mut self, clock: Box<dyn Clock>, rng: Box<dyn RngCore + Send>) -> Self {
        self.clock = clock;
        self.rng = rng;
        self
    }

    /// The workspace directory (the `.beads` directory itself).
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn require_write_lock(&self) -> BeadsResult<()> {
        if self.lock.is_none() {
            return Err(WorkspaceError::ReadOnly {
                path: self.dir.display().to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn append(&mut self, op: WalOp) -> BeadsResult<()> {
        let now = self.clock.now();
        self.wal.append(now, op)?;
        if self.config.sync.auto_flush && self.wal.needs_compaction() {
            self.flush()?;
        }
        Ok(())
    }

    /// Forces a compaction cycle now, regardless of thresholds.
    ///
    /// Unlike [`crate::persistence::compact`] (the standalone entry point for
    /// a process that doesn't already hold the lock), this merges the
    /// in-memory store directly into the canonical file and truncates the
    /// WAL without reacquiring `beads.lock` — the workspace already holds it
    /// for its entire lifetime, and `flock` would deadlock against itself.
    pub fn flush(&mut self) -> BeadsResult<()> {
        self.require_write_lock()?;
        let merged: Vec<_> = self.store.all().cloned().collect();
        crate::persistence::canonical::write_all(&self.paths.canonical, &merged)?;
        self.wal.truncate()?;
        self.store.clear_dirty();
        Ok(())
    }

    // -- mutating operations -------------------------------------------------

    /// Creates a new issue, generating its identifier and content
    /// fingerprint, and appends an `Add` WAL record.
    pub fn add(&mut self, new_issue: NewIssue) -> BeadsResult<IssueId> {
        self.require_write_lock()?;
        let now = self.clock.now();
        let title = new_issue.title;
        if title.is_empty() || title.chars().count() > 500 {
            return Err(IssueError::TitleTooLong { len: title.chars().count() }.into());
        }

        let priority = new_issue.priority.unwrap_or_else(|| {
            Priority::try_from(i64::from(self.config.defaults.priority)).unwrap_or_default()
        });
        let issue_type = new_issue
            .issue_type
            .unwrap_or_else(|| IssueType::from(self.config.defaults.issue_type.clone()));

        let generated_id = id::generate(
            &mut self.rng,
            self.clock.now_nanos(),
            &self.config.id.prefix,
            self.store.len(),
            self.config.id.min_hash_length,
            self.config.id.max_hash_length,
        );

        let mut issue = Issue {
            id: generated_id.clone(),
            fingerprint: String::new(),
            title,
            description: new_issue.description,
            design: None,
            acceptance_criteria: None,
            notes: None,
            status: IssueStatus::Open,
            priority,
            issue_type,
            assignee: new_issue.assignee,
            owner: None,
            creator: Some(self.config.actor.clone()),
            created_at: now,
            updated_at: now,
            closed_at: None,
            due_at: None,
            defer_until: None,
            external_ref: new_issue.external_ref,
            source_system: new_issue.source_system,
            pinned: false,
            is_template: false,
            labels: new_issue.labels,
            dependencies: Vec::new(),
            comments: Vec::new(),
            events: Vec::new(),
            extra: serde_json::Map::new(),
        };
        issue.fingerprint = id::issue_fingerprint(&issue);
        record_event(&mut issue, now, self.config.actor.clone(), crate::model::EventKind::Created, None, None);

        self.store.insert(issue.clone())?;
        self.append(WalOp::Add(issue))?;
        Ok(generated_id)
    }

    /// Replaces mutable content fields (title/description/etc.) on an
    /// existing issue, stamping `updated_at` and recomputing the fingerprint.
    pub fn update(&mut self, id: &IssueId, edit: impl FnOnce(&mut Issue)) -> BeadsResult<()> {
        self.require_write_lock()?;
        let now = self.clock.now();
        let mut issue = self
            .store
            .get(id)
            .ok_or_else(|| IssueError::IssueNotFound { id: id.clone() })?
            .clone();
        if issue.is_tombstone() {
            return Err(IssueError::AlreadyDeleted { id: id.clone() }.into());
        }
        let before = serde_json::to_value(&issue).ok();
        edit(&mut issue);
        issue.validate().map_err(|_| IssueError::TitleTooLong { len: issue.title.chars().count() })?;
        issue.updated_at = now;
        issue.fingerprint = id::issue_fingerprint(&issue);
        let after = serde_json::to_value(&issue).ok();
        record_event(&mut issue, now, self.config.actor.clone(), crate::model::EventKind::FieldChanged("fields".to_string()), before, after);

        self.store.replace(issue.clone())?;
        self.append(WalOp::Update(issue))
    }

    /// Applies a status transition, recording a `StatusChanged` event and
    /// appending the post-state issue under `wal_op` (the caller picks the
    /// WAL vocabulary word: `close`/`reopen`/`set_blocked`/`unset_blocked`,
    /// or `update` for the defer/undefer transitions the closed op
    /// vocabulary (§6) has no dedicated word for).
    fn set_status(
        &mut self,
        id: &IssueId,
        status: IssueStatus,
        closed_at: Option<Timestamp>,
        wal_op: fn(Issue) -> WalOp,
    ) -> BeadsResult<()> {
        self.require_write_lock()?;
        let now = self.clock.now();
        let old = self
            .store
            .get(id)
            .ok_or_else(|| IssueError::IssueNotFound { id: id.clone() })?
            .status
            .clone();
        let snapshot = {
            let issue = self.store.get_mut(id)?;
            issue.status = status.clone();
            issue.updated_at = now;
            if let Some(closed_at) = closed_at {
                issue.closed_at = Some(closed_at);
            }
            record_event(
                issue,
                now,
                self.config.actor.clone(),
                crate::model::EventKind::StatusChanged,
                Some(serde_json::json!(old.as_str())),
                Some(serde_json::json!(status.as_str())),
            );
            issue.clone()
        };
        self.append(wal_op(snapshot))
    }

    /// Transitions to [`IssueStatus::Closed`], stamping `closed_at`.
    pub fn close(&mut self, id: &IssueId) -> BeadsResult<()> {
        self.require_write_lock()?;
        let issue = self.store.get(id).ok_or_else(|| IssueError::IssueNotFound { id: id.clone() })?;
        if issue.status.is_closed_or_tombstone() {
            return Err(IssueError::AlreadyClosed { id: id.clone() }.into());
        }
        let now = self.clock.now();
        self.set_status(id, IssueStatus::Closed, Some(now), WalOp::Close)
    }

    /// Transitions a closed issue back to [`IssueStatus::Open`], clearing
    /// `closed_at`.
    pub fn reopen(&mut self, id: &IssueId) -> BeadsResult<()> {
        self.require_write_lock()?;
        let issue = self.store.get(id).ok_or_else(|| IssueError::IssueNotFound { id: id.clone() })?;
        if !matches!(issue.status, IssueStatus::Closed) {
            return Err(IssueError::NotClosed { id: id.clone() }.into());
        }
        self.store.get_mut(id)?.closed_at = None;
        self.set_status(id, IssueStatus::Open, None, WalOp::Reopen)
    }

    /// Transitions to [`IssueStatus::Blocked`].
    pub fn set_blocked(&mut self, id: &IssueId) -> BeadsResult<()> {
        self.set_status(id, IssueStatus::Blocked, None, WalOp::SetBlocked)
    }

    /// Transitions a blocked issue back to [`IssueStatus::Open`].
    pub fn unset_blocked(&mut self, id: &IssueId) -> BeadsResult<()> {
        self.set_status(id, IssueStatus::Open, None, WalOp::UnsetBlocked)
    }

    /// Transitions to [`IssueStatus::Deferred`] and sets `defer_until`. Not
    /// part of the closed WAL op vocabulary (§6), so it folds into `update`.
    pub fn defer(&mut self, id: &IssueId, until: Timestamp) -> BeadsResult<()> {
        self.require_write_lock()?;
        self.store.get_mut(id)?.defer_until = Some(until);
        self.set_status(id, IssueStatus::Deferred, None, WalOp::Update)
    }

    /// Clears `defer_until` and transitions back to [`IssueStatus::Open`].
    pub fn undefer(&mut self, id: &IssueId) -> BeadsResult<()> {
        self.require_write_lock()?;
        self.store.get_mut(id)?.defer_until = None;
        self.set_status(id, IssueStatus::Open, None, WalOp::Update)
    }

    /// Soft-deletes: transitions to [`IssueStatus::Tombstone`] (I1: the
    /// identifier is reserved permanently).
    pub fn delete(&mut self, id: &IssueId) -> BeadsResult<()> {
        self.require_write_lock()?;
        let issue = self.store.get(id).ok_or_else(|| IssueError::IssueNotFound { id: id.clone() })?;
        if issue.is_tombstone() {
            return Err(IssueError::AlreadyDeleted { id: id.clone() }.into());
        }
        let old = issue.status.clone();
        let now = self.clock.now();
        let actor = self.config.actor.clone();
        let issue = self.store.get_mut(id)?;
        issue.status = IssueStatus::Tombstone;
        issue.updated_at = now;
        record_event(
            issue,
            now,
            actor,
            crate::model::EventKind::StatusChanged,
            Some(serde_json::json!(old.as_str())),
            Some(serde_json::json!(IssueStatus::Tombstone.as_str())),
        );
        self.append(WalOp::Delete(id.clone()))
    }

    /// Adds a dependency edge (C7); see [`graph::add_edge`].
    pub fn dep_add(&mut self, from: &IssueId, to: &IssueId, kind: DependencyKind) -> BeadsResult<()> {
        self.require_write_lock()?;
        graph::add_edge(&mut self.store, from, to, kind.clone()).map_err(crate::error::BeadsError::from)?;
        let now = self.clock.now();
        let actor = self.config.actor.clone();
        let issue = self.store.get_mut(from)?;
        issue.updated_at = now;
        record_event(
            issue,
            now,
            actor,
            crate::model::EventKind::DependencyAdded,
            None,
            Some(serde_json::json!({ "to": to.as_str(), "kind": kind.as_str() })),
        );
        let snapshot = issue.clone();
        self.append(WalOp::Update(snapshot))
    }

    /// Removes a dependency edge.
    pub fn dep_remove(&mut self, from: &IssueId, to: &IssueId, kind: DependencyKind) -> BeadsResult<()> {
        self.require_write_lock()?;
        graph::remove_edge(&mut self.store, from, to, &kind).map_err(|e: GraphError| crate::error::BeadsError::from(e))?;
        let now = self.clock.now();
        let actor = self.config.actor.clone();
        let issue = self.store.get_mut(from)?;
        issue.updated_at = now;
        record_event(
            issue,
            now,
            actor,
            crate::model::EventKind::DependencyRemoved,
            Some(serde_json::json!({ "to": to.as_str(), "kind": kind.as_str() })),
            None,
        );
        let snapshot = issue.clone();
        self.append(WalOp::Update(snapshot))
    }

    /// Appends a comment.
    pub fn comment(&mut self, id: &IssueId, author: Option<String>, body: String) -> BeadsResult<()> {
        self.require_write_lock()?;
        let now = self.clock.now();
        let next_id = self.store.get(id).ok_or_else(|| IssueError::IssueNotFound { id: id.clone() })?.next_comment_id();
        let comment = Comment { id: next_id, author, body, created_at: now };
        let actor = self.config.actor.clone();
        let issue = self.store.get_mut(id)?;
        issue.comments.push(comment.clone());
        issue.updated_at = now;
        record_event(
            issue,
            now,
            actor,
            crate::model::EventKind::CommentAdded,
            None,
            Some(serde_json::json!({ "comment_id": comment.id })),
        );
        let snapshot = issue.clone();
        self.append(WalOp::Update(snapshot))
    }

    /// Imports an external snapshot, merging it into the store (C9). Refuses
    /// to read `path` when it resolves to one of this workspace's own
    /// internal files — importing `beads.jsonl`/`beads.wal`/`beads.lock`
    /// against themselves would corrupt the store mid-merge.
    pub fn import(&mut self, path: &Path, overwrite_empty_guard: bool) -> BeadsResult<ImportReport> {
        self.require_write_lock()?;
        self.reject_internal_path(path)?;
        let report = import::import_snapshot(&mut self.store, path, overwrite_empty_guard)?;

        let now = self.clock.now();
        let actor = self.config.actor.clone();
        let mut touched = Vec::new();
        for id in report.merged.iter().chain(report.inserted.iter()) {
            if let Ok(parsed) = id.parse::<IssueId>() {
                if let Ok(issue) = self.store.get_mut(&parsed) {
                    record_event(issue, now, actor.clone(), crate::model::EventKind::Imported, None, None);
                    touched.push(issue.clone());
                }
            }
        }
        for issue in touched {
            self.append(WalOp::Update(issue))?;
        }
        Ok(report)
    }

    fn reject_internal_path(&self, path: &Path) -> BeadsResult<()> {
        let Ok(candidate) = fs::canonicalize(path) else {
            return Ok(());
        };
        for internal in [&self.paths.canonical, &self.paths.wal, &self.paths.lock] {
            if fs::canonicalize(internal).map(|p| p == candidate).unwrap_or(false) {
                return Err(SyncError::ExternalPathNotAllowed {
                    path: path.display().to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Runs compaction now (C8).
    pub fn compact(&mut self) -> BeadsResult<()> {
        self.flush()
    }

    // -- read-only queries ----------------------------------------------------

    /// Looks up a single issue.
    #[must_use]
    pub fn get(&self, id: &IssueId) -> Option<&Issue> {
        self.store.get(id)
    }

    /// Filtered, sorted listing (§4.6).
    #[must_use]
    pub fn list(&self, filters: &ListFilters) -> Vec<&Issue> {
        self.store.list(filters, self.clock.now())
    }

    /// C10 `ready`.
    #[must_use]
    pub fn ready(&self) -> Vec<&Issue> {
        evaluator::ready(&self.store, self.clock.now())
    }

    /// C10 `blocked`.
    #[must_use]
    pub fn blocked(&self) -> Vec<&Issue> {
        evaluator::blocked(&self.store)
    }

    /// C10 `stale(days)`.
    #[must_use]
    pub fn stale(&self, days: i64) -> Vec<&Issue> {
        evaluator::stale(&self.store, self.clock.now(), days)
    }

    /// C10 `count_by(group)`.
    #[must_use]
    pub fn count_by(&self, group: GroupBy) -> std::collections::BTreeMap<String, usize> {
        evaluator::count_by(&self.store, group)
    }

    /// C7 `blockers`.
    #[must_use]
    pub fn blockers(&self, id: &IssueId) -> Vec<IssueId> {
        graph::blockers(&self.store, id)
    }

    /// C7 `dependents`.
    #[must_use]
    pub fn dependents(&self, id: &IssueId) -> Vec<IssueId> {
        graph::dependents(&self.store, id)
    }

    /// C7 `detect_cycles` (diagnostic).
    #[must_use]
    pub fn detect_cycles(&self) -> Vec<Vec<IssueId>> {
        graph::detect_cycles(&self.store)
    }

    /// C7 `tree(id, max_depth)`.
    #[must_use]
    pub fn tree(&self, id: &IssueId, max_depth: usize) -> graph::TreeNode {
        graph::tree(&self.store, id, max_depth)
    }
}

fn record_event(
    issue: &mut Issue,
    now: Timestamp,
    actor: String,
    kind: crate::model::EventKind,
    old_value: Option<serde_json::Value>,
    new_value: Option<serde_json::Value>,
) {
    let event_id = issue.next_event_id();
    issue.events.push(crate::model::Event {
        id: event_id,
        kind,
        actor: Some(actor),
        old_value,
        new_value,
        timestamp: now,
    });
}
