//! Query filters accepted by [`super::IssueStore::list`] (§4.6).

use crate::model::{IssueStatus, IssueType, Priority};
use crate::time::Timestamp;

/// Recognized filter set for `list`. All fields are optional; an unset
/// field does not constrain the result.
#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    /// Only these statuses.
    pub status_set: Option<Vec<IssueStatus>>,
    /// Inclusive `[min, max]` priority range.
    pub priority_range: Option<(Priority, Priority)>,
    /// Only these issue types.
    pub type_set: Option<Vec<IssueType>>,
    /// Exact assignee match.
    pub assignee: Option<String>,
    /// Exact owner match.
    pub owner: Option<String>,
    /// At least one of these labels present.
    pub label_any_of: Option<Vec<String>>,
    /// All of these labels present.
    pub label_all_of: Option<Vec<String>>,
    /// Case-insensitive substring match against title/description.
    pub text_substring: Option<String>,
    /// Include tombstoned issues (excluded by default).
    pub include_tombstones: bool,
    /// Include issues deferred until on or before this time (excluded by
    /// default when `defer_until` is in the future relative to `now`).
    pub include_deferred_before: Option<Timestamp>,
}

impl ListFilters {
    /// An unconstrained filter set matching every non-tombstone issue.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }
}
