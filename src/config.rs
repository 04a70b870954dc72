//! Resolved configuration consumed by the core (§6).
//!
//! Loading the YAML config file itself is an external collaborator's job
//! (§1: "the core accepts a resolved configuration value"); this module only
//! defines the value type, its defaults, and the environment-variable
//! overlay (`BEADS_DIR`, `BEADS_PREFIX`, `BEADS_ACTOR`).

use std::env;

use serde::{Deserialize, Serialize};

/// Identifier-generation settings (`id.*` keys).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdConfig {
    /// `id.prefix`, default `"bd"`.
    pub prefix: String,
    /// `id.min_hash_length`, default 3.
    pub min_hash_length: u8,
    /// `id.max_hash_length`, default 8.
    pub max_hash_length: u8,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            prefix: "bd".to_string(),
            min_hash_length: 3,
            max_hash_length: 8,
        }
    }
}

/// Default values applied to new issues (`defaults.*` keys).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    /// `defaults.priority`, default 2.
    pub priority: u8,
    /// `defaults.issue_type`, default `"task"`.
    pub issue_type: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            priority: 2,
            issue_type: "task".to_string(),
        }
    }
}

/// Sync-related toggles (`sync.*` keys).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// `sync.auto_flush`, default true.
    pub auto_flush: bool,
    /// `sync.auto_import`, default true.
    pub auto_import: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_flush: true,
            auto_import: true,
        }
    }
}

/// The resolved configuration value the core operates against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// `id.*`
    pub id: IdConfig,
    /// `defaults.*`
    pub defaults: Defaults,
    /// `sync.*`
    pub sync: SyncConfig,
    /// `actor`, default the current-user name.
    pub actor: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: IdConfig::default(),
            defaults: Defaults::default(),
            sync: SyncConfig::default(),
            actor: default_actor(),
        }
    }
}

impl Config {
    /// Applies `BEADS_DIR`/`BEADS_PREFIX`/`BEADS_ACTOR` overrides on top of
    /// `self`, returning the overridden value and (if set) the workspace
    /// directory override from `BEADS_DIR`.
    ///
    /// `BEADS_DIR` doesn't belong on `Config` itself (the workspace path is
    /// a constructor argument, not a stored field), so it's returned
    /// alongside rather than folded in.
    #[must_use]
    pub fn with_env_overrides(mut self) -> (Self, Option<String>) {
        if let Ok(prefix) = env::var("BEADS_PREFIX") {
            if !prefix.is_empty() {
                self.id.prefix = prefix;
            }
        }
        if let Ok(actor) = env::var("BEADS_ACTOR") {
            if !actor.is_empty() {
                self.actor = actor;
            }
        }
        let dir = env::var("BEADS_DIR").ok().filter(|s| !s.is_empty());
        (self, dir)
    }
}

fn default_actor() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
