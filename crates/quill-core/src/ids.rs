//! Collection identifiers
//!
//! Remote ids are UUIDs. Users paste them in several shapes: the bare
//! 32-hex form, the hyphenated form, or a full share URL whose last path
//! segment ends in the hex id (`https://host/workspace/Tasks-<hex>?v=...`).
//! Everything is canonicalised to the lowercase hyphenated form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from parsing a collection identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Identifier is empty")]
    Empty,

    #[error("'{0}' does not contain a 32-character collection id")]
    Malformed(String),
}

/// Canonical identifier of a remote collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(String);

impl CollectionId {
    /// Parse a bare id, hyphenated id, or URL into a canonical id
    pub fn parse(input: &str) -> Result<Self, IdError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(IdError::Empty);
        }

        if let Ok(uuid) = Uuid::try_parse(input) {
            return Ok(Self::from_uuid(uuid));
        }

        let candidate = last_path_segment(input)
            .and_then(trailing_hex_id)
            .ok_or_else(|| IdError::Malformed(input.to_string()))?;

        Uuid::try_parse(candidate)
            .map(Self::from_uuid)
            .map_err(|_| IdError::Malformed(input.to_string()))
    }

    fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid.hyphenated().to_string())
    }

    /// The canonical hyphenated form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CollectionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Last non-empty path segment, with query string and fragment removed
fn last_path_segment(input: &str) -> Option<&str> {
    let without_query = input.split(['?', '#']).next()?;
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

/// The 32 hex characters at the end of a segment like `Tasks-0123...cdef`
fn trailing_hex_id(segment: &str) -> Option<&str> {
    if segment.len() < 32 || !segment.is_char_boundary(segment.len() - 32) {
        return None;
    }
    let tail = &segment[segment.len() - 32..];
    if !tail.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let head = &segment[..segment.len() - 32];
    if head.is_empty() || head.ends_with('-') {
        Some(tail)
    } else {
        None
    }
}
