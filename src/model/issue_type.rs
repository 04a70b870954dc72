//! Issue type (§3): a tagged variant with an open-ended custom case,
//! mirroring [`crate::model::status::IssueStatus`]'s round-trip behavior.

use serde::{Deserialize, Serialize};

/// Classification of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IssueType {
    /// General work item.
    Task,
    /// Defect.
    Bug,
    /// New capability.
    Feature,
    /// Umbrella grouping child issues.
    Epic,
    /// Maintenance work.
    Chore,
    /// Documentation.
    Docs,
    /// Open question needing a decision.
    Question,
    /// Any value not in the built-in set above.
    Custom(String),
}

impl IssueType {
    const TASK: &'static str = "task";
    const BUG: &'static str = "bug";
    const FEATURE: &'static str = "feature";
    const EPIC: &'static str = "epic";
    const CHORE: &'static str = "chore";
    const DOCS: &'static str = "docs";
    const QUESTION: &'static str = "question";

    /// Renders the wire/string form used both in JSON and in the content
    /// fingerprint.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Task => Self::TASK,
            Self::Bug => Self::BUG,
            Self::Feature => Self::FEATURE,
            Self::Epic => Self::EPIC,
            Self::Chore => Self::CHORE,
            Self::Docs => Self::DOCS,
            Self::Question => Self::QUESTION,
            Self::Custom(s) => s,
        }
    }
}

impl From<&str> for IssueType {
    fn from(value: &str) -> Self {
        match value {
            Self::TASK => Self::Task,
            Self::BUG => Self::Bug,
            Self::FEATURE => Self::Feature,
            Self::EPIC => Self::Epic,
            Self::CHORE => Self::Chore,
            Self::DOCS => Self::Docs,
            Self::QUESTION => Self::Question,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for IssueType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<IssueType> for String {
    fn from(value: IssueType) -> Self {
        value.as_str().to_string()
    }
}

impl Default for IssueType {
    fn default() -> Self {
        Self::Task
    }
}

impl Serialize for IssueType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for IssueType {
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
        for s in ["task", "bug", "feature", "epic", "chore", "docs", "question"] {
            let ty = IssueType::from(s);
            assert_eq!(ty.as_str(), s);
            assert!(!matches!(ty, IssueType::Custom(_)));
        }
    }

    #[test]
    fn unknown_value_round_trips_as_custom() {
        let ty = IssueType::from("spike");
        assert_eq!(ty, IssueType::Custom("spike".to_string()));
    }
}
