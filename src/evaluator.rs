//! Ready/blocked/stale/count_by evaluator (C10, §4.10).
//!
//! Pure functions over `(&IssueStore, now: Timestamp)`; the clock is
//! injected per §9 rather than read ambiently, so these are deterministic
//! under test.

use std::collections::BTreeMap;

use crate::model::{Issue, IssueStatus};
use crate::store::IssueStore;
use crate::time::Timestamp;

const SECONDS_PER_DAY: i64 = 86_400;

fn is_deferred(issue: &Issue, now: Timestamp) -> bool {
    issue
        .defer_until
        .map(|until| until.as_secs() > now.as_secs())
        .unwrap_or(false)
}

fn is_ready_status(issue: &Issue) -> bool {
    matches!(issue.status, IssueStatus::Open | IssueStatus::InProgress | IssueStatus::Pinned)
        || matches!(&issue.status, IssueStatus::Custom(label) if label == "ready")
}

/// Issues that are actionable right now: a ready-eligible status, not a
/// tombstone, not currently deferred, and with no outstanding `blocks` edge
/// to a not-yet-closed issue.
#[must_use]
pub fn ready<'a>(store: &'a IssueStore, now: Timestamp) -> Vec<&'a Issue> {
    store
        .all()
        .filter(|issue| {
            is_ready_status(issue)
                && !issue.is_tombstone()
                && !is_deferred(issue, now)
                && store.outstanding_blockers(&issue.id).is_empty()
        })
        .collect()
}

/// Issues that are open but have at least one outstanding `blocks` edge.
#[must_use]
pub fn blocked<'a>(store: &'a IssueStore) -> Vec<&'a Issue> {
    store
        .all()
        .filter(|issue| matches!(issue.status, IssueStatus::Open) && !store.outstanding_blockers(&issue.id).is_empty())
        .collect()
}

/// Issues neither closed nor tombstoned whose `updated_at` is at least
/// `days` old relative to `now`.
#[must_use]
pub fn stale<'a>(store: &'a IssueStore, now: Timestamp, days: i64) -> Vec<&'a Issue> {
    let threshold = days * SECONDS_PER_DAY;
    store
        .all()
        .filter(|issue| !issue.status.is_closed_or_tombstone() && now.seconds_since(issue.updated_at) >= threshold)
        .collect()
}

/// A grouping dimension for [`count_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// Group by [`crate::model::IssueStatus`].
    Status,
    /// Group by [`crate::model::Priority`].
    Priority,
    /// Group by [`crate::model::IssueType`].
    Type,
    /// Group by assignee (issues with no assignee are omitted).
    Assignee,
    /// Group by label (an issue with N labels contributes to N buckets).
    Label,
}

/// Counts non-tombstone issues by `group`, as an ordered map so output is
/// stable across runs.
#[must_use]
pub fn count_by(store: &IssueStore, group: GroupBy) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for issue in store.all().filter(|i| !i.is_tombstone()) {
        match group {
            GroupBy::Status => {
                *counts.entry(issue.status.as_str().to_string()).or_insert(0) += 1;
            }
            GroupBy::Priority => {
                *counts.entry(issue.priority.to_string()).or_insert(0) += 1;
            }
            GroupBy::Type => {
                *counts.entry(issue.issue_type.as_str().to_string()).or_insert(0) += 1;
            }
            GroupBy::Assignee => {
                if let Some(assignee) = &issue.assignee {
                    *counts.entry(assignee.clone()).or_insert(0) += 1;
                }
            }
            GroupBy::Label => {
                for label in &issue.labels {
                    *counts.entry(label.clone()).or_insert(0) += 1;
                }
            }
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::IssueId;
    use crate::model::{Dependency, DependencyKind, Issue, IssueType, Priority};

    fn issue(id: &str, status: IssueStatus) -> Issue {
        Issue {
            id: id.parse().unwrap(),
            fingerprint: format!("{id:0>64}"),
            title: "t".to_string(),
            description: None,
            design: None,
            acceptance_criteria: None,
            notes: None,
            status,
            priority: Priority::MEDIUM,
            issue_type: IssueType::Task,
            assignee: None,
            owner: None,
            creator: None,
            created_at: Timestamp::from_secs(1),
            updated_at: Timestamp::from_secs(1),
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
    fn ready_excludes_blocked_and_deferred() {
        let mut store = IssueStore::new();
        store.insert(issue("bd-blocker", IssueStatus::Open)).unwrap();
        let mut blocked_issue = issue("bd-blocked", IssueStatus::Open);
        blocked_issue.dependencies.push(Dependency {
            from: "bd-blocked".parse().unwrap(),
            to: "bd-blocker".parse::<IssueId>().unwrap(),
            kind: DependencyKind::Blocks,
        });
        store.insert(blocked_issue).unwrap();
        let mut deferred = issue("bd-deferred", IssueStatus::Open);
        deferred.defer_until = Some(Timestamp::from_secs(1000));
        store.insert(deferred).unwrap();

        let now = Timestamp::from_secs(100);
        let ready_ids: Vec<_> = ready(&store, now).iter().map(|i| i.id.as_str().to_string()).collect();
        assert_eq!(ready_ids, vec!["bd-blocker"]);
    }

    #[test]
    fn blocked_requires_open_status_and_outstanding_blocker() {
        let mut store = IssueStore::new();
        store.insert(issue("bd-blocker", IssueStatus::Open)).unwrap();
        let mut blocked_issue = issue("bd-blocked", IssueStatus::Open);
        blocked_issue.dependencies.push(Dependency {
            from: "bd-blocked".parse().unwrap(),
            to: "bd-blocker".parse::<IssueId>().unwrap(),
            kind: DependencyKind::Blocks,
        });
        store.insert(blocked_issue).unwrap();
        assert_eq!(blocked(&store).len(), 1);
    }

    #[test]
    fn stale_respects_threshold() {
        let mut store = IssueStore::new();
        store.insert(issue("bd-old", IssueStatus::Open)).unwrap();
        let now = Timestamp::from_secs(1 + 10 * SECONDS_PER_DAY);
        assert_eq!(stale(&store, now, 5).len(), 1);
        assert_eq!(stale(&store, now, 20).len(), 0);
    }

    #[test]
    fn count_by_status_tallies_non_tombstones() {
        let mut store = IssueStore::new();
        store.insert(issue("bd-a", IssueStatus::Open)).unwrap();
        store.insert(issue("bd-b", IssueStatus::Open)).unwrap();
        store.insert(issue("bd-c", IssueStatus::Tombstone)).unwrap();
        let counts = count_by(&store, GroupBy::Status);
        assert_eq!(counts.get("open"), Some(&2));
        assert!(!counts.contains_key("tombstone"));
    }
}
