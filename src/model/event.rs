//! Audit events embedded on an issue (§3, C11).

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// The kind of state change an [`Event`] records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The issue was created.
    Created,
    /// A field was changed (see `old_value`/`new_value`).
    FieldChanged(String),
    /// `status` transitioned.
    StatusChanged,
    /// A dependency edge was added.
    DependencyAdded,
    /// A dependency edge was removed.
    DependencyRemoved,
    /// A comment was added.
    CommentAdded,
    /// The issue was imported/merged from an external source.
    Imported,
    /// Any value not in the built-in set above.
    Custom(String),
}

impl EventKind {
    /// Renders the wire/string form.
    #[must_use]
    pub fn as_str(&self) -> String {
        match self {
            Self::Created => "created".to_string(),
            Self::FieldChanged(field) => format!("field_changed:{field}"),
            Self::StatusChanged => "status_changed".to_string(),
            Self::DependencyAdded => "dependency_added".to_string(),
            Self::DependencyRemoved => "dependency_removed".to_string(),
            Self::CommentAdded => "comment_added".to_string(),
            Self::Imported => "imported".to_string(),
            Self::Custom(s) => s.clone(),
        }
    }
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        match value {
            "created" => Self::Created,
            "status_changed" => Self::StatusChanged,
            "dependency_added" => Self::DependencyAdded,
            "dependency_removed" => Self::DependencyRemoved,
            "comment_added" => Self::CommentAdded,
            "imported" => Self::Imported,
            other => other
                .strip_prefix("field_changed:")
                .map(|field| Self::FieldChanged(field.to_string()))
                .unwrap_or_else(|| Self::Custom(other.to_string())),
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}

/// A single audit-trail entry (C11: every mutating operation appends one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Sequence number, unique within the owning issue.
    pub id: u64,
    /// What happened.
    pub kind: EventKind,
    /// Who did it; `None` when unattributed (e.g. system-triggered compaction).
    pub actor: Option<String>,
    /// Prior value, for field/status changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<serde_json::Value>,
    /// New value, for field/status changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<serde_json::Value>,
    /// When it happened.
    pub timestamp: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_changed_round_trips_through_prefix_encoding() {
        let kind = EventKind::FieldChanged("priority".to_string());
        assert_eq!(kind.as_str(), "field_changed:priority");
        assert_eq!(EventKind::from("field_changed:priority"), kind);
    }

    #[test]
    fn unknown_value_round_trips_as_custom() {
        assert_eq!(EventKind::from("reopened"), EventKind::Custom("reopened".to_string()));
    }
}
