//! Table catalog
//!
//! Caches the column layout of physical tables as reported by
//! `pragma_table_info`. Lookups are lock-free reads through a `DashMap`;
//! the schema builder invalidates entries after each DDL statement.

use dashmap::DashMap;
use quire_core::{ColumnType, QuireError, QuireResult};
use rusqlite::Connection;
use std::sync::Arc;

use crate::dialect::{DOCUMENT_ID_COLUMN, ID_COLUMN};
use crate::sql_error::map_sql_error;

/// One column of a physical table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Declared type, resolved to a `ColumnType`
    pub ty: ColumnType,
}

/// Column layout of a physical table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Physical table name
    pub name: String,
    /// Columns in declaration order
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    /// Look up a column by exact name
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether the table has a column named `name`
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Columns carrying index values (everything but `Id` and `DocumentId`)
    pub fn value_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns
            .iter()
            .filter(|c| c.name != ID_COLUMN && c.name != DOCUMENT_ID_COLUMN)
    }
}

/// Cache of table layouts
#[derive(Debug, Default)]
pub struct TableCatalog {
    tables: DashMap<String, Arc<TableSchema>>,
}

impl TableCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout of `table`, read through `conn` on a cache miss
    ///
    /// Returns `NotFound` when the table does not exist. Missing tables are
    /// not cached, so a later `CREATE TABLE` is picked up without
    /// invalidation.
    pub fn get(&self, conn: &Connection, table: &str) -> QuireResult<Arc<TableSchema>> {
        if let Some(schema) = self.tables.get(table) {
            return Ok(Arc::clone(schema.value()));
        }
        let schema = Arc::new(read_table_schema(conn, table)?);
        self.tables.insert(table.to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Whether `table` exists
    pub fn exists(&self, conn: &Connection, table: &str) -> QuireResult<bool> {
        match self.get(conn, table) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Drop the cached layout of `table`
    pub fn invalidate(&self, table: &str) {
        self.tables.remove(table);
    }

    /// Drop every cached layout
    pub fn clear(&self) {
        self.tables.clear();
    }

    /// Number of cached layouts
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn read_table_schema(conn: &Connection, table: &str) -> QuireResult<TableSchema> {
    let mut stmt = conn
        .prepare("SELECT name, type FROM pragma_table_info(?1)")
        .map_err(|e| map_sql_error("read table info", e))?;
    let columns = stmt
        .query_map([table], |row| {
            let name: String = row.get(0)?;
            let declared: String = row.get(1)?;
            Ok(ColumnInfo {
                name,
                ty: ColumnType::from_declared(&declared),
            })
        })
        .map_err(|e| map_sql_error("read table info", e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| map_sql_error("read table info", e))?;

    if columns.is_empty() {
        return Err(QuireError::not_found(format!("table {}", table)));
    }
    Ok(TableSchema {
        name: table.to_string(),
        columns,
    })
}
