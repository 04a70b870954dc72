//! Comment entries embedded on an issue (§3).

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// A single comment attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Sequence number, unique within the owning issue (not globally).
    pub id: u64,
    /// Who wrote it; `None` when the actor is unknown.
    pub author: Option<String>,
    /// Free-text body.
    pub body: String,
    /// When it was added.
    pub created_at: Timestamp,
}
