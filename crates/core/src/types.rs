//! Core identifier types for Quire
//!
//! This module defines the foundational types:
//! - DocumentId: Store-assigned document identifier
//! - SessionId: Unique identifier for a unit of work
//! - IndexKind: Discriminates map indexes from reduce indexes

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Store-assigned document identifier
///
/// Issued by the block id generator on the first save of a document.
/// Unique across the store and monotonically increasing; never reused
/// or reassigned once a document holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(i64);

impl DocumentId {
    /// Wrap a raw identifier value
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw identifier value as stored in the `Id` column
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for DocumentId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a session
///
/// A SessionId is a wrapper around a UUID v4. It carries no semantics
/// beyond correlating log events of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random SessionId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the raw bytes of this SessionId
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a declared index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    /// Entries are a pure per-document function, replaced on every change
    Map,
    /// Entries are aggregates merged across documents sharing a group key
    Reduce,
}

impl IndexKind {
    /// Human-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Map => "map",
            IndexKind::Reduce => "reduce",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
