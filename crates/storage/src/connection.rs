//! Connections to the relational substrate
//!
//! # Locations
//!
//! - `Memory`: a single in-memory database. Every session shares the one
//!   connection; the mutex around it serializes their SQL work.
//! - `File`: a database file (`quire.db` inside the data directory) in WAL
//!   journal mode. Each session opens its own connection and write
//!   contention is arbitrated by SQLite's lock with a busy timeout.

use parking_lot::Mutex;
use quire_core::QuireResult;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::catalog::TableCatalog;
use crate::dialect::TableNames;
use crate::sql_error::map_sql_error;

/// File name of the database inside a data directory
pub const DATABASE_FILE: &str = "quire.db";

/// A connection shared between the store and its sessions
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// Private in-memory database
    Memory,
    /// Database file at the given path
    File(PathBuf),
}

impl StorageLocation {
    /// Location of the database file inside `dir`
    pub fn in_directory(dir: impl AsRef<Path>) -> Self {
        StorageLocation::File(dir.as_ref().join(DATABASE_FILE))
    }

    /// Whether this is an in-memory location
    pub fn is_memory(&self) -> bool {
        matches!(self, StorageLocation::Memory)
    }
}

/// Options applied to every opened connection
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// How long a connection waits for another writer's lock
    pub busy_timeout: Duration,
    /// Prefix applied to physical table names
    pub names: TableNames,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5000),
            names: TableNames::default(),
        }
    }
}

/// Handle to the substrate: connection factory plus shared catalog
///
/// Cheap to clone; clones share the anchor connection and the catalog.
#[derive(Clone)]
pub struct SqlStore {
    location: StorageLocation,
    options: ConnectionOptions,
    anchor: SharedConnection,
    catalog: Arc<TableCatalog>,
}

impl SqlStore {
    /// Open the database at `location`
    ///
    /// For file locations the anchor connection keeps the database open for
    /// the lifetime of the store and serves the identifier generator.
    pub fn open(location: StorageLocation, options: ConnectionOptions) -> QuireResult<Self> {
        let anchor = open_connection(&location, &options)?;
        debug!(target: "quire::store", location = ?location, "Opened substrate");
        Ok(Self {
            location,
            options,
            anchor: Arc::new(Mutex::new(anchor)),
            catalog: Arc::new(TableCatalog::new()),
        })
    }

    /// Connection for a new session
    ///
    /// In-memory stores hand out the anchor connection; file stores open a
    /// fresh connection.
    pub fn session_connection(&self) -> QuireResult<SharedConnection> {
        match &self.location {
            StorageLocation::Memory => Ok(Arc::clone(&self.anchor)),
            StorageLocation::File(_) => {
                let conn = open_connection(&self.location, &self.options)?;
                Ok(Arc::new(Mutex::new(conn)))
            }
        }
    }

    /// The long-lived anchor connection
    pub fn anchor(&self) -> &SharedConnection {
        &self.anchor
    }

    /// Shared table catalog
    pub fn catalog(&self) -> &Arc<TableCatalog> {
        &self.catalog
    }

    /// Physical table naming
    pub fn names(&self) -> &TableNames {
        &self.options.names
    }

    /// Database location
    pub fn location(&self) -> &StorageLocation {
        &self.location
    }
}

impl std::fmt::Debug for SqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlStore")
            .field("location", &self.location)
            .field("prefix", &self.options.names.prefix())
            .finish()
    }
}

fn open_connection(
    location: &StorageLocation,
    options: &ConnectionOptions,
) -> QuireResult<Connection> {
    let conn = match location {
        StorageLocation::Memory => Connection::open_in_memory()
            .map_err(|e| map_sql_error("open in-memory database", e))?,
        StorageLocation::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Connection::open(path).map_err(|e| map_sql_error("open database file", e))?
        }
    };
    conn.busy_timeout(options.busy_timeout)
        .map_err(|e| map_sql_error("set busy timeout", e))?;
    if !location.is_memory() {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })
        .map_err(|e| map_sql_error("enable WAL journal", e))?;
    }
    Ok(conn)
}
