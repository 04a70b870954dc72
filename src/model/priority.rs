//! Issue priority (§3): a small bounded integer with named levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Priority from 0 (critical) to 4 (backlog), lower is more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(u8);

impl Priority {
    /// Drop-everything.
    pub const CRITICAL: Self = Self(0);
    /// High urgency.
    pub const HIGH: Self = Self(1);
    /// Default priority (§6 `defaults.priority`).
    pub const MEDIUM: Self = Self(2);
    /// Low urgency.
    pub const LOW: Self = Self(3);
    /// No urgency, not currently scheduled.
    pub const BACKLOG: Self = Self(4);

    /// Highest valid raw value.
    pub const MAX: u8 = 4;

    /// Returns the raw 0..=4 value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::MEDIUM
    }
}

/// Raw value outside the valid `0..=4` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("priority {0} out of range (expected 0..=4)")]
pub struct PriorityOutOfRange(pub i64);

impl TryFrom<i64> for Priority {
    type Error = PriorityOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (0..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(PriorityOutOfRange(value))
        }
    }
}

/// Either a bare digit (`"0"`..`"4"`) or a named level
/// (`"critical"`, `"high"`, `"medium"`, `"low"`, `"backlog"`), case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid priority {0:?} (expected 0-4 or critical/high/medium/low/backlog)")]
pub struct ParsePriorityError(pub String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "critical" => return Ok(Self::CRITICAL),
            "high" => return Ok(Self::HIGH),
            "medium" => return Ok(Self::MEDIUM),
            "low" => return Ok(Self::LOW),
            "backlog" => return Ok(Self::BACKLOG),
            _ => {}
        }
        lower
            .parse::<i64>()
            .ok()
            .and_then(|n| Self::try_from(n).ok())
            .ok_or_else(|| ParsePriorityError(s.to_string()))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_levels_match_raw_values() {
        assert_eq!(Priority::CRITICAL.value(), 0);
        assert_eq!(Priority::BACKLOG.value(), 4);
        assert_eq!(Priority::default(), Priority::MEDIUM);
    }

    #[test]
    fn try_from_rejects_out_of_range() {
        assert!(Priority::try_from(5).is_err());
        assert!(Priority::try_from(-1).is_err());
        assert_eq!(Priority::try_from(3).unwrap(), Priority::LOW);
    }

    #[test]
    fn from_str_accepts_numeric_and_named() {
        assert_eq!("2".parse::<Priority>().unwrap(), Priority::MEDIUM);
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::HIGH);
        assert!("9".parse::<Priority>().is_err());
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn ordering_is_by_raw_value() {
        assert!(Priority::CRITICAL < Priority::HIGH);
        assert!(Priority::LOW < Priority::BACKLOG);
    }
}
