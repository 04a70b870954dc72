//! Dependency edges embedded on each issue (§3, §7).

use serde::{Deserialize, Serialize};

use crate::id::IssueId;

/// The relationship a [`Dependency`] edge expresses between two issues.
///
/// Cycle detection (§7, C7) only walks `Blocks` and `ParentChild` edges;
/// the rest are informational.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// `from` cannot start until `to` is closed.
    Blocks,
    /// `from` is a subtask of `to`.
    ParentChild,
    /// `from` is conditionally blocked on `to` (softer than `Blocks`).
    ConditionalBlocks,
    /// `from` is waiting on `to` without a hard ordering requirement.
    WaitsFor,
    /// `from` is related to `to`, no ordering implied.
    Related,
    /// `from` is discovered-from `to`.
    DiscoveredFrom,
    /// `from` replies to `to` (e.g. a comment thread reference).
    RepliesTo,
    /// `from` relates to `to` only loosely.
    RelatesTo,
    /// `from` duplicates `to`.
    Duplicates,
    /// `from` supersedes `to`.
    Supersedes,
    /// `from` was caused by `to`.
    CausedBy,
    /// Any value not in the built-in set above.
    Custom(String),
}

impl DependencyKind {
    const BLOCKS: &'static str = "blocks";
    const PARENT_CHILD: &'static str = "parent_child";
    const CONDITIONAL_BLOCKS: &'static str = "conditional_blocks";
    const WAITS_FOR: &'static str = "waits_for";
    const RELATED: &'static str = "related";
    const DISCOVERED_FROM: &'static str = "discovered_from";
    const REPLIES_TO: &'static str = "replies_to";
    const RELATES_TO: &'static str = "relates_to";
    const DUPLICATES: &'static str = "duplicates";
    const SUPERSEDES: &'static str = "supersedes";
    const CAUSED_BY: &'static str = "caused_by";

    /// Renders the wire/string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Blocks => Self::BLOCKS,
            Self::ParentChild => Self::PARENT_CHILD,
            Self::ConditionalBlocks => Self::CONDITIONAL_BLOCKS,
            Self::WaitsFor => Self::WAITS_FOR,
            Self::Related => Self::RELATED,
            Self::DiscoveredFrom => Self::DISCOVERED_FROM,
            Self::RepliesTo => Self::REPLIES_TO,
            Self::RelatesTo => Self::RELATES_TO,
            Self::Duplicates => Self::DUPLICATES,
            Self::Supersedes => Self::SUPERSEDES,
            Self::CausedBy => Self::CAUSED_BY,
            Self::Custom(s) => s,
        }
    }

    /// True for the two kinds that cycle detection (C7) restricts itself to
    /// (spec §3 I3: "only blocks and parent_child affect ready/blocked
    /// evaluation").
    #[must_use]
    pub fn participates_in_cycle_check(&self) -> bool {
        matches!(self, Self::Blocks | Self::ParentChild)
    }
}

impl From<&str> for DependencyKind {
    fn from(value: &str) -> Self {
        match value {
            Self::BLOCKS => Self::Blocks,
            Self::PARENT_CHILD => Self::ParentChild,
            Self::CONDITIONAL_BLOCKS => Self::ConditionalBlocks,
            Self::WAITS_FOR => Self::WaitsFor,
            Self::RELATED => Self::Related,
            Self::DISCOVERED_FROM => Self::DiscoveredFrom,
            Self::REPLIES_TO => Self::RepliesTo,
            Self::RELATES_TO => Self::RelatesTo,
            Self::DUPLICATES => Self::Duplicates,
            Self::SUPERSEDES => Self::Supersedes,
            Self::CAUSED_BY => Self::CausedBy,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for DependencyKind {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<DependencyKind> for String {
    fn from(value: DependencyKind) -> Self {
        value.as_str().to_string()
    }
}

impl Serialize for DependencyKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DependencyKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw))
    }
}

/// A directed edge from one issue to another, embedded on the `from` issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// The issue this edge is attached to; kept for symmetry with the
    /// standalone `Dependency{from,to,kind}` shape described in the graph
    /// API, even though it's redundant with the owning [`crate::model::Issue::id`].
    pub from: IssueId,
    /// The issue being depended on.
    pub to: IssueId,
    /// The relationship kind.
    pub kind: DependencyKind,
}

impl Dependency {
    /// A key uniquely identifying this edge for dedupe/union purposes
    /// during import merge (§5).
    #[must_use]
    pub fn merge_key(&self) -> (IssueId, IssueId, String) {
        (self.from.clone(), self.to.clone(), self.kind.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_kinds_round_trip() {
        for s in [
            "blocks",
            "parent_child",
            "conditional_blocks",
            "waits_for",
            "related",
            "discovered_from",
            "replies_to",
            "relates_to",
            "duplicates",
            "supersedes",
            "caused_by",
        ] {
            let kind = DependencyKind::from(s);
            assert_eq!(kind.as_str(), s);
            assert!(!matches!(kind, DependencyKind::Custom(_)));
        }
    }

    #[test]
    fn only_blocks_and_parent_child_participate_in_cycle_check() {
        assert!(DependencyKind::Blocks.participates_in_cycle_check());
        assert!(DependencyKind::ParentChild.participates_in_cycle_check());
        assert!(!DependencyKind::Related.participates_in_cycle_check());
        assert!(!DependencyKind::from("custom-kind").participates_in_cycle_check());
    }
}
