//! # beads-core
//!
//! The storage engine behind a local-first issue tracker: a single-node,
//! multi-writer, crash-safe persistence layer over a line-delimited JSON
//! canonical file and write-ahead log, an in-memory issue store with replay,
//! a dependency graph with cycle prevention, an import/merge engine, and an
//! adaptive collision-resistant identifier generator.
//!
//! This crate is the core library only: argument parsing, rendering,
//! configuration *loading*, packaging, and network sync are all the job of
//! an external command dispatcher built on top of it (§1/§13 of the design).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use beads_core::{Config, NewIssue, Workspace};
//!
//! let mut ws = Workspace::init(std::path::Path::new(".beads"), Config::default())?;
//! let id = ws.add(NewIssue { title: "Fix the bug".to_string(), ..Default::default() })?;
//! ws.close(&id)?;
//! # Ok::<(), beads_core::error::BeadsError>(())
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod evaluator;
pub mod graph;
pub mod id;
pub mod import;
pub mod model;
pub mod persistence;
pub mod store;
pub mod time;
pub mod workspace;

pub use config::Config;
pub use error::{BeadsError, BeadsResult, ExitStatus};
pub use evaluator::GroupBy;
pub use graph::TreeNode;
pub use id::IssueId;
pub use import::ImportReport;
pub use model::{
    Comment, Dependency, DependencyKind, Event, EventKind, Issue, IssueStatus, IssueType,
    Priority,
};
pub use store::ListFilters;
pub use time::{Clock, SystemClock, Timestamp};
pub use workspace::{NewIssue, Workspace};
