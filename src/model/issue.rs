//! The principal entity (§3).

use serde::{Deserialize, Serialize};

use crate::id::IssueId;
use crate::model::comment::Comment;
use crate::model::dependency::Dependency;
use crate::model::event::Event;
use crate::model::issue_type::IssueType;
use crate::model::priority::Priority;
use crate::model::status::IssueStatus;
use crate::time::Timestamp;

/// An error produced while constructing or validating an [`Issue`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssueValidationError {
    /// Title was empty or exceeded 500 characters (§3).
    #[error("title must be 1-500 characters, got {0}")]
    InvalidTitleLength(usize),
}

/// The principal entity: an issue-tracker record, embedding its own
/// dependencies, comments, events, and labels (§3: "stored in the same JSON
/// line; not a separate table").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Opaque identifier; see [`crate::id`].
    pub id: IssueId,
    /// 64-hex-character SHA-256 content fingerprint; see [`crate::id::content_fingerprint`].
    pub fingerprint: String,

    /// 1-500 characters, required.
    pub title: String,
    /// Optional long-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional design notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design: Option<String>,
    /// Optional acceptance criteria.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Lifecycle state.
    pub status: IssueStatus,
    /// Urgency, 0 (critical) to 4 (backlog).
    pub priority: Priority,
    /// Classification.
    pub issue_type: IssueType,

    /// Who is assigned to work it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Who owns the decision to close it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Who created it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,

    /// When it was created.
    pub created_at: Timestamp,
    /// When it was last changed.
    pub updated_at: Timestamp,
    /// When it was closed, if it has been.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<Timestamp>,
    /// When it is due.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<Timestamp>,
    /// Deferred until this time (status [`IssueStatus::Deferred`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defer_until: Option<Timestamp>,

    /// Identifier in the originating external system, for import correlation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    /// Name of the originating external system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_system: Option<String>,

    /// Pinned for visibility independent of status.
    #[serde(default)]
    pub pinned: bool,
    /// Marks this issue as a template rather than real work.
    #[serde(default)]
    pub is_template: bool,

    /// Free-form labels.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Outgoing edges to other issues.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Comment thread, in insertion order.
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Audit trail, in insertion order.
    #[serde(default)]
    pub events: Vec<Event>,

    /// Unrecognized top-level fields, preserved verbatim across read/write
    /// (§6: "Unknown top-level fields are preserved").
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Issue {
    /// Validates the fields §3 calls out as constrained, independent of
    /// storage concerns.
    pub fn validate(&self) -> Result<(), IssueValidationError> {
        let len = self.title.chars().count();
        if len == 0 || len > 500 {
            return Err(IssueValidationError::InvalidTitleLength(len));
        }
        Ok(())
    }

    /// Next comment id for this issue (monotonic per-issue, §3).
    #[must_use]
    pub fn next_comment_id(&self) -> u64 {
        self.comments.iter().map(|c| c.id).max().map_or(0, |m| m + 1)
    }

    /// Next event id for this issue (monotonic per-issue, C11).
    #[must_use]
    pub fn next_event_id(&self) -> u64 {
        self.events.iter().map(|e| e.id).max().map_or(0, |m| m + 1)
    }

    /// True when excluded from normal queries and counts (§3 lifecycle note),
    /// i.e. soft-deleted.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.status.is_tombstone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_issue() -> Issue {
        Issue {
            id: "bd-abc".parse().unwrap(),
            fingerprint: "0".repeat(64),
            title: "Fix the thing".to_string(),
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
            created_at: Timestamp::from_secs(0),
            updated_at: Timestamp::from_secs(0),
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
    fn validate_rejects_empty_and_overlong_titles() {
        let mut issue = minimal_issue();
        issue.title = String::new();
        assert!(issue.validate().is_err());
        issue.title = "x".repeat(501);
        assert!(issue.validate().is_err());
        issue.title = "x".repeat(500);
        assert!(issue.validate().is_ok());
    }

    #[test]
    fn unknown_fields_round_trip_through_extra() {
        let mut issue = minimal_issue();
        issue
            .extra
            .insert("legacy_field".to_string(), serde_json::json!("keep me"));
        let json = serde_json::to_string(&issue).unwrap();
        assert!(json.contains("legacy_field"));
        let back: Issue = serde_json::from_str(&json).unwrap();
        assert_eq!(back.extra.get("legacy_field").unwrap(), "keep me");
    }

    #[test]
    fn comment_and_event_ids_are_monotonic_per_issue() {
        let issue = minimal_issue();
        assert_eq!(issue.next_comment_id(), 0);
        assert_eq!(issue.next_event_id(), 0);
    }
}
