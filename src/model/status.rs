//! Issue status (§3): a tagged variant with an open-ended custom case.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an issue.
///
/// Per §9's "tagged variants for open-ended enums" note, unknown strings
/// round-trip through [`IssueStatus::Custom`] rather than being rejected,
/// the same way the teacher crate's `EntityType` preserves unrecognized
/// values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IssueStatus {
    /// Actionable, not blocked.
    Open,
    /// Actively being worked.
    InProgress,
    /// Explicitly marked blocked (independent of the dependency graph).
    Blocked,
    /// Deferred until a future date (`defer_until`).
    Deferred,
    /// Terminal: done.
    Closed,
    /// Terminal: soft-deleted. Retained for merge correctness (I1).
    Tombstone,
    /// Pinned for visibility; still actionable.
    Pinned,
    /// Any value not in the built-in set above.
    Custom(String),
}

impl IssueStatus {
    const OPEN: &'static str = "open";
    const IN_PROGRESS: &'static str = "in_progress";
    const BLOCKED: &'static str = "blocked";
    const DEFERRED: &'static str = "deferred";
    const CLOSED: &'static str = "closed";
    const TOMBSTONE: &'static str = "tombstone";
    const PINNED: &'static str = "pinned";

    /// Renders the wire/string form used both in JSON and in the content
    /// fingerprint.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => Self::OPEN,
            Self::InProgress => Self::IN_PROGRESS,
            Self::Blocked => Self::BLOCKED,
            Self::Deferred => Self::DEFERRED,
            Self::Closed => Self::CLOSED,
            Self::Tombstone => Self::TOMBSTONE,
            Self::Pinned => Self::PINNED,
            Self::Custom(s) => s,
        }
    }

    /// True for the two statuses treated as "done" throughout the spec
    /// (ready/blocked evaluation, cascading edge semantics).
    #[must_use]
    pub fn is_closed_or_tombstone(&self) -> bool {
        matches!(self, Self::Closed | Self::Tombstone)
    }

    /// True for [`Self::Tombstone`]; used to exclude soft-deleted issues
    /// from normal queries and counts while keeping them in the canonical
    /// file (I1, §9 Open Question a).
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone)
    }
}

impl From<&str> for IssueStatus {
    fn from(value: &str) -> Self {
        match value {
            Self::OPEN => Self::Open,
            Self::IN_PROGRESS => Self::InProgress,
            Self::BLOCKED => Self::Blocked,
            Self::DEFERRED => Self::Deferred,
            Self::CLOSED => Self::Closed,
            Self::TOMBSTONE => Self::Tombstone,
            Self::PINNED => Self::Pinned,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for IssueStatus {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<IssueStatus> for String {
    fn from(value: IssueStatus) -> Self {
        value.as_str().to_string()
    }
}

impl Serialize for IssueStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for IssueStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_variants_round_trip() {
        for s in ["open", "in_progress", "blocked", "deferred", "closed", "tombstone", "pinned"] {
            let status = IssueStatus::from(s);
            assert_eq!(status.as_str(), s);
            assert!(!matches!(status, IssueStatus::Custom(_)));
        }
    }

    #[test]
    fn unknown_value_round_trips_as_custom() {
        let status = IssueStatus::from("needs-triage");
        assert_eq!(status, IssueStatus::Custom("needs-triage".to_string()));
        assert_eq!(status.as_str(), "needs-triage");
    }

    #[test]
    fn json_round_trip_preserves_custom() {
        let status = IssueStatus::Custom("ready".to_string());
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"ready\"");
        let back: IssueStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }
}
