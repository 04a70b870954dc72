//! Identifier codec (C1): base-36 encode/decode, adaptive-length generation,
//! hierarchical child ids, and the content fingerprint used for import dedupe.
//!
//! Identifiers never encode ordering or time; they are opaque tokens of the
//! form `<prefix>-<base36-hash>(.<child-index>)*`, generated without
//! coordination between concurrent writers (see §4.1 of the spec).

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::IdentifierError;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_CHILD_DEPTH: usize = 2;

/// An issue identifier: `<prefix>-<hash>(.<index>)*`.
///
/// Cheap to clone (wraps a single `String`) and orders lexicographically,
/// which is exactly the canonical-file sort order required by I6.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(String);

impl IssueId {
    /// Borrows the identifier as a plain string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits this id into its parsed components.
    pub fn parse_parts(&self) -> Result<ParsedId, IdentifierError> {
        parse(&self.0)
    }

    /// True if this id already has two child segments (I4: depth <= 3).
    #[must_use]
    pub fn is_at_max_depth(&self) -> bool {
        self.parse_parts()
            .map(|p| p.children.len() >= MAX_CHILD_DEPTH)
            .unwrap_or(false)
    }

    /// Builds a child id by appending `.{index}`, enforcing I4.
    pub fn generate_child(&self, index: u32) -> Result<Self, IdentifierError> {
        generate_child(&self.0, index)
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for IssueId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)?;
        Ok(Self(s.to_string()))
    }
}

impl From<IssueId> for String {
    fn from(id: IssueId) -> Self {
        id.0
    }
}

/// The decomposed parts of an identifier, as produced by [`parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedId {
    /// The prefix before the first `-` (e.g. `"bd"`).
    pub prefix: String,
    /// The base-36 hash segment.
    pub hash: String,
    /// Child indices, in order, with at most [`MAX_CHILD_DEPTH`] entries.
    pub children: Vec<u32>,
}

impl fmt::Display for ParsedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.hash)?;
        for child in &self.children {
            write!(f, ".{child}")?;
        }
        Ok(())
    }
}

/// Encodes `value` as base-36 using the alphabet `0-9a-z`. Zero maps to `"0"`.
#[must_use]
pub fn encode(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::with_capacity(13);
    while value > 0 {
        let digit = (value % 36) as usize;
        digits.push(ALPHABET[digit]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).expect("alphabet is ASCII")
}

/// Decodes a base-36 string (case-insensitive) into a `u64`.
///
/// # Errors
/// Rejects empty input, any character outside the alphabet, and inputs that
/// would overflow 64 bits.
pub fn decode(s: &str) -> Result<u64, IdentifierError> {
    if s.is_empty() {
        return Err(IdentifierError::InvalidIssueId {
            value: s.to_string(),
            reason: "empty hash segment".to_string(),
        });
    }

    let mut value: u64 = 0;
    for ch in s.chars() {
        let digit = ch
            .to_ascii_lowercase()
            .to_digit(36)
            .ok_or_else(|| IdentifierError::InvalidIssueId {
                value: s.to_string(),
                reason: format!("character '{ch}' is not valid base-36"),
            })?;
        value = value
            .checked_mul(36)
            .and_then(|v| v.checked_add(u64::from(digit)))
            .ok_or_else(|| IdentifierError::InvalidIssueId {
                value: s.to_string(),
                reason: "value overflows 64 bits".to_string(),
            })?;
    }
    Ok(value)
}

/// Adaptive hash length based on how many issues already exist.
#[must_use]
pub fn adaptive_length(issue_count: usize) -> usize {
    if issue_count < 1_000 {
        3
    } else if issue_count < 50_000 {
        4
    } else if issue_count < 1_000_000 {
        5
    } else {
        6
    }
}

/// Generates a new top-level identifier: `"<prefix>-<hash>"`.
///
/// Mixes 16 random bytes with a nanosecond-granularity clock reading through
/// SHA-256, takes the leading 8 bytes as a big-endian `u64`, base-36 encodes
/// it, and truncates to [`adaptive_length`] characters for `issue_count`,
/// clamped to `[min_hash_length, max_hash_length]` (`id.*` config keys).
pub fn generate(
    rng: &mut dyn RngCore,
    now_nanos: u128,
    prefix: &str,
    issue_count: usize,
    min_hash_length: u8,
    max_hash_length: u8,
) -> IssueId {
    let mut random_bytes = [0u8; 16];
    rng.fill_bytes(&mut random_bytes);

    let mut hasher = Sha256::new();
    hasher.update(random_bytes);
    hasher.update(now_nanos.to_be_bytes());
    let digest = hasher.finalize();

    let mut high = [0u8; 8];
    high.copy_from_slice(&digest[..8]);
    let value = u64::from_be_bytes(high);

    let encoded = encode(value);
    let bounded = adaptive_length(issue_count).clamp(min_hash_length as usize, max_hash_length.max(min_hash_length) as usize);
    let length = bounded.min(encoded.len().max(1));
    let truncated = if encoded.len() >= length {
        &encoded[encoded.len() - length..]
    } else {
        &encoded[..]
    };

    IssueId(format!("{prefix}-{truncated}"))
}

/// Appends a child segment to `parent`, enforcing the three-level depth cap.
pub fn generate_child(parent: &str, index: u32) -> Result<IssueId, IdentifierError> {
    let parsed = parse(parent)?;
    if parsed.children.len() >= MAX_CHILD_DEPTH {
        return Err(IdentifierError::MaxHierarchyDepthExceeded {
            parent: parent.to_string(),
        });
    }
    Ok(IssueId(format!("{parent}.{index}")))
}

/// Decomposes an identifier string into prefix, hash, and child indices.
///
/// # Errors
/// Rejects an empty prefix, an empty hash segment, and dangling separators
/// (e.g. a trailing `.` or a child segment that doesn't parse as `u32`).
pub fn parse(s: &str) -> Result<ParsedId, IdentifierError> {
    let invalid = |reason: &str| IdentifierError::InvalidIssueId {
        value: s.to_string(),
        reason: reason.to_string(),
    };

    let (head, rest) = s.split_once('-').ok_or_else(|| invalid("missing '-' separator"))?;
    if head.is_empty() {
        return Err(invalid("empty prefix"));
    }
    if rest.is_empty() {
        return Err(invalid("empty hash segment"));
    }

    let mut segments = rest.split('.');
    let hash = segments.next().unwrap();
    if hash.is_empty() {
        return Err(invalid("empty hash segment"));
    }

    let mut children = Vec::new();
    for segment in segments {
        if segment.is_empty() {
            return Err(invalid("dangling '.' separator"));
        }
        let index: u32 = segment
            .parse()
            .map_err(|_| invalid(&format!("child segment '{segment}' is not a valid index")))?;
        children.push(index);
    }
    if children.len() > MAX_CHILD_DEPTH {
        return Err(invalid("hierarchy depth exceeds three segments"));
    }

    Ok(ParsedId {
        prefix: head.to_string(),
        hash: hash.to_string(),
        children,
    })
}

/// The fields, in order, that [`content_fingerprint`] hashes.
///
/// Exposed so callers assembling the input (e.g. the store, when deciding
/// whether an update actually changed content) can do so without duplicating
/// the field order.
#[derive(Debug, Clone, Copy)]
pub struct FingerprintInput<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub design: Option<&'a str>,
    pub acceptance_criteria: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub status: &'a str,
    pub priority: &'a str,
    pub issue_type: &'a str,
    pub assignee: Option<&'a str>,
    pub owner: Option<&'a str>,
    pub creator: Option<&'a str>,
    pub external_ref: Option<&'a str>,
    pub source_system: Option<&'a str>,
    pub pinned: bool,
    pub is_template: bool,
}

/// Computes the 64-hex-character SHA-256 content fingerprint (I5).
///
/// Fields are concatenated in the fixed order documented on
/// [`FingerprintInput`], each followed by a single `\0` separator (including
/// after the last field), so that no ambiguous concatenation of two
/// different field layouts can collide. Absent optional fields contribute
/// the empty string, not their field name, before the separator.
#[must_use]
pub fn content_fingerprint(input: &FingerprintInput<'_>) -> String {
    let mut hasher = Sha256::new();
    let mut push = |field: &str| {
        hasher.update(field.as_bytes());
        hasher.update([0u8]);
    };

    push(input.title);
    push(input.description.unwrap_or(""));
    push(input.design.unwrap_or(""));
    push(input.acceptance_criteria.unwrap_or(""));
    push(input.notes.unwrap_or(""));
    push(input.status);
    push(input.priority);
    push(input.issue_type);
    push(input.assignee.unwrap_or(""));
    push(input.owner.unwrap_or(""));
    push(input.creator.unwrap_or(""));
    push(input.external_ref.unwrap_or(""));
    push(input.source_system.unwrap_or(""));
    push(if input.pinned { "true" } else { "false" });
    push(if input.is_template { "true" } else { "false" });

    to_hex(&hasher.finalize())
}

/// Computes the content fingerprint directly from an [`crate::model::Issue`],
/// so callers don't have to re-derive [`FingerprintInput`]'s field order
/// themselves (I5: the fingerprint excludes the identifier and timestamps).
#[must_use]
pub fn issue_fingerprint(issue: &crate::model::Issue) -> String {
    let priority = issue.priority.to_string();
    content_fingerprint(&FingerprintInput {
        title: &issue.title,
        description: issue.description.as_deref(),
        design: issue.design.as_deref(),
        acceptance_criteria: issue.acceptance_criteria.as_deref(),
        notes: issue.notes.as_deref(),
        status: issue.status.as_str(),
        priority: &priority,
        issue_type: issue.issue_type.as_str(),
        assignee: issue.assignee.as_deref(),
        owner: issue.owner.as_deref(),
        creator: issue.creator.as_deref(),
        external_ref: issue.external_ref.as_deref(),
        source_system: issue.source_system.as_deref(),
        pinned: issue.pinned,
        is_template: issue.is_template,
    })
}

fn to_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
