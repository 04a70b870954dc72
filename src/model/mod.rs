//! Entity model (C2, §3): the `Issue` record and its embedded types.

mod comment;
mod dependency;
mod event;
mod issue;
mod issue_type;
mod priority;
mod status;

pub use comment::Comment;
pub use dependency::{Dependency, DependencyKind};
pub use event::{Event, EventKind};
pub use issue::{Issue, IssueValidationError};
pub use issue_type::IssueType;
pub use priority::{ParsePriorityError, Priority, PriorityOutOfRange};
pub use status::IssueStatus;
