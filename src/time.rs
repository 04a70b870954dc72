//! Wall-clock abstraction and the wire/memory timestamp split (§4.2, §9).
//!
//! Per the design note in §9, the only process-wide state beyond the
//! resolved [`crate::config::Config`] is "the current wall-clock second",
//! and both are meant to be injected rather than looked up ambiently so that
//! tests can drive them deterministically. [`Clock`] is that injection seam.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A point in time, stored as whole seconds since the Unix epoch.
///
/// The wire (JSON) projection is an RFC-3339 UTC string; the in-memory form
/// used everywhere else in the crate is this integer-seconds newtype, per
/// §4.2 ("Timestamps in the wire projection are RFC-3339 UTC strings; the
/// in-memory form is integer seconds").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Wraps a raw Unix-seconds value.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Returns the whole-seconds Unix timestamp.
    #[must_use]
    pub const fn as_secs(&self) -> i64 {
        self.0
    }

    /// Whole seconds elapsed from `self` to `other` (may be negative).
    #[must_use]
    pub const fn seconds_since(&self, other: Self) -> i64 {
        self.0 - other.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::<Utc>::from_timestamp(self.0, 0) {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}", self.0),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let dt = DateTime::<Utc>::from_timestamp(self.0, 0)
            .ok_or_else(|| serde::ser::Error::custom("timestamp out of range"))?;
        serializer.serialize_str(&dt.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let dt = DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)?;
        Ok(Self(dt.with_timezone(&Utc).timestamp()))
    }
}

/// Injected source of "now", so evaluators and id generation stay
/// deterministic under test instead of reading `SystemTime::now()`
/// ambiently.
pub trait Clock: Send + Sync {
    /// Current wall-clock time, truncated to whole seconds.
    fn now(&self) -> Timestamp;

    /// Current wall-clock time at nanosecond granularity, used by
    /// [`crate::id::generate`] to diversify identifiers generated in the
    /// same process tick.
    fn now_nanos(&self) -> u128;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp(Utc::now().timestamp())
    }

    fn now_nanos(&self) -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default()
    }
}

/// A clock fixed to a single instant, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    secs: i64,
    nanos: u128,
}

impl FixedClock {
    /// Builds a fixed clock at the given Unix-seconds value.
    #[must_use]
    pub const fn new(secs: i64) -> Self {
        Self { secs, nanos: 0 }
    }

    /// Advances the clock by `secs` seconds, returning the new value.
    #[must_use]
    pub const fn advance(self, secs: i64) -> Self {
        Self {
            secs: self.secs + secs,
            nanos: self.nanos,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.secs)
    }

    fn now_nanos(&self) -> u128 {
        self.nanos + (self.secs as u128) * 1_000_000_000
    }
}
