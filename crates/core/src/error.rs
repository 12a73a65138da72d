//! Error types for Quire
//!
//! This module defines the error hierarchy used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! # Categories
//!
//! | Category | Variants | Retryable |
//! |----------|----------|-----------|
//! | Lookup | `NotFound` | no |
//! | Encoding | `Serialization` | no |
//! | Administration | `Schema` | no |
//! | Declaration | `Configuration` | no |
//! | Querying | `Query` | no |
//! | Contention | `ConcurrencyConflict` | only `LockContention` |
//! | Integrity | `Consistency` | no |
//! | Lifecycle | `SessionClosed` | no |
//! | Infrastructure | `InvalidInput`, `Storage`, `Io` | no |

use std::io;
use thiserror::Error;

/// Result type alias for Quire operations
pub type QuireResult<T> = std::result::Result<T, QuireError>;

/// Why a concurrency conflict was raised
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    /// The substrate's write lock could not be acquired in time
    LockContention,
    /// The stored document version moved since the session loaded it
    VersionMismatch {
        /// Version the session loaded
        expected: u64,
        /// Version found at commit time
        found: u64,
    },
}

/// Error types for Quire
#[derive(Debug, Error)]
pub enum QuireError {
    /// Missing document, row or table
    #[error("not found: {entity}")]
    NotFound {
        /// Description of the missing entity
        entity: String,
    },

    /// Payload or index row could not be encoded/decoded
    #[error("serialization error: {message}")]
    Serialization {
        /// Details
        message: String,
    },

    /// DDL failure not tolerated by the schema builder
    #[error("schema error: {message}")]
    Schema {
        /// Details
        message: String,
    },

    /// Invalid index declaration or store configuration
    #[error("configuration error: {message}")]
    Configuration {
        /// Details
        message: String,
    },

    /// Query references an unregistered index or unknown column
    #[error("query error: {message}")]
    Query {
        /// Details
        message: String,
    },

    /// Write contention or stale read detected at commit
    #[error("concurrency conflict: {message}")]
    ConcurrencyConflict {
        /// Details
        message: String,
        /// What kind of conflict occurred
        reason: ConflictReason,
    },

    /// A reduce step produced an impossible aggregate state
    #[error("consistency violation: {message}")]
    Consistency {
        /// Details
        message: String,
    },

    /// Operation attempted on a session that is no longer open
    #[error("session is {state}")]
    SessionClosed {
        /// State the session is in
        state: String,
    },

    /// Caller supplied an invalid argument
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Details
        message: String,
    },

    /// Substrate failure not covered by a more specific kind
    #[error("storage error: {message}")]
    Storage {
        /// Details
        message: String,
        /// Underlying error, if any
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O error (config files, data directory)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl QuireError {
    /// Create a not-found error
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a query error
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a lock-contention conflict
    pub fn lock_contention(message: impl Into<String>) -> Self {
        Self::ConcurrencyConflict {
            message: message.into(),
            reason: ConflictReason::LockContention,
        }
    }

    /// Create a version-mismatch conflict
    pub fn version_mismatch(entity: impl Into<String>, expected: u64, found: u64) -> Self {
        Self::ConcurrencyConflict {
            message: format!(
                "{} was modified concurrently (loaded version {}, stored version {})",
                entity.into(),
                expected,
                found
            ),
            reason: ConflictReason::VersionMismatch { expected, found },
        }
    }

    /// Create a consistency error
    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }

    /// Create a session-closed error
    pub fn session_closed(state: impl Into<String>) -> Self {
        Self::SessionClosed {
            state: state.into(),
        }
    }

    /// Create an invalid-input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a storage error without an underlying source
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Create a storage error wrapping its cause
    pub fn storage_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this is a concurrency conflict of any reason
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// Whether retrying the same unit of work can succeed
    ///
    /// Only lock contention is transient; a version mismatch needs the
    /// caller to reload the document first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict {
                reason: ConflictReason::LockContention,
                ..
            }
        )
    }

    /// Whether this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Stable error code for logs and assertions
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::Serialization { .. } => "Serialization",
            Self::Schema { .. } => "Schema",
            Self::Configuration { .. } => "Configuration",
            Self::Query { .. } => "Query",
            Self::ConcurrencyConflict { .. } => "ConcurrencyConflict",
            Self::Consistency { .. } => "Consistency",
            Self::SessionClosed { .. } => "SessionClosed",
            Self::InvalidInput { .. } => "InvalidInput",
            Self::Storage { .. } => "Storage",
            Self::Io(_) => "Io",
        }
    }
}

impl From<serde_json::Error> for QuireError {
    fn from(e: serde_json::Error) -> Self {
        QuireError::serialization(e.to_string())
    }
}
