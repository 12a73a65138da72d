//! Mapping of SQLite failures onto the Quire error hierarchy
//!
//! `SQLITE_BUSY` and `SQLITE_LOCKED` mean another connection holds the write
//! lock; they become retryable lock-contention conflicts. Everything else is
//! a storage error carrying the driver error as its source.

use quire_core::QuireError;
use rusqlite::ErrorCode;

/// Convert a driver error into a `QuireError`, prefixing `context`
pub fn map_sql_error(context: &str, err: rusqlite::Error) -> QuireError {
    if is_lock_error(&err) {
        return QuireError::lock_contention(format!("{}: {}", context, err));
    }
    QuireError::storage_with_source(context.to_string(), err)
}

/// Whether the driver error reports a held lock
pub fn is_lock_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => matches!(
            failure.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
        ),
        _ => false,
    }
}
