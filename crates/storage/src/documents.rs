//! Document table access
//!
//! Rows of `{prefix}Document` are `(Id, Type, Content, Version)`. The
//! version starts at 1 and is bumped on every update; it backs the
//! optional optimistic concurrency check of sessions.

use quire_core::{DocumentId, QuireError, QuireResult};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value as JsonValue;

use crate::content::ContentSerializer;
use crate::dialect::{quote_ident, TableNames};
use crate::mapping::{from_sql, to_sql};
use crate::sql_error::map_sql_error;

/// Number of columns produced by [`DocumentTable::select_list`]
pub const DOCUMENT_COLUMN_COUNT: usize = 4;

/// A document row as stored
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Document identifier
    pub id: DocumentId,
    /// Type tag
    pub type_name: String,
    /// Decoded content
    pub content: JsonValue,
    /// Row version
    pub version: u64,
}

impl StoredDocument {
    /// Decode a document from `row`, whose columns start at `offset` in the
    /// order of [`DocumentTable::select_list`]
    pub fn from_row(row: &Row<'_>, offset: usize) -> QuireResult<Self> {
        let read = |e: rusqlite::Error| QuireError::storage_with_source("read document row", e);
        let id: i64 = row.get(offset).map_err(read)?;
        let type_name: String = row.get(offset + 1).map_err(read)?;
        let content: SqlValue = row.get(offset + 2).map_err(read)?;
        let version: i64 = row.get(offset + 3).map_err(read)?;
        Ok(Self {
            id: DocumentId::new(id),
            type_name,
            content: ContentSerializer::decode(from_sql(content))?,
            version: version.max(0) as u64,
        })
    }
}

/// Accessor for the document table on one connection
pub struct DocumentTable<'c> {
    conn: &'c Connection,
    table: String,
    serializer: ContentSerializer,
}

impl<'c> DocumentTable<'c> {
    /// Bind the document table of `names` to `conn`
    pub fn new(
        conn: &'c Connection,
        names: &TableNames,
        serializer: ContentSerializer,
    ) -> QuireResult<Self> {
        Ok(Self {
            conn,
            table: quote_ident(&names.document())?,
            serializer,
        })
    }

    /// Quoted physical table name
    pub fn quoted_name(&self) -> &str {
        &self.table
    }

    /// Column list selecting a full document row through `alias`
    pub fn select_list(alias: &str) -> String {
        format!(
            "{a}.\"Id\", {a}.\"Type\", {a}.\"Content\", {a}.\"Version\"",
            a = alias
        )
    }

    /// Load one document by id, of any type
    pub fn load(&self, id: DocumentId) -> QuireResult<Option<StoredDocument>> {
        let sql = format!(
            "SELECT {} FROM {} d WHERE d.\"Id\" = ?1",
            Self::select_list("d"),
            self.table
        );
        let raw = self
            .conn
            .query_row(&sql, params![id.as_i64()], |row| {
                Ok(StoredDocument::from_row(row, 0))
            })
            .optional()
            .map_err(|e| map_sql_error("load document", e))?;
        raw.transpose()
    }

    /// Insert a new document at version 1
    pub fn insert(&self, id: DocumentId, type_name: &str, content: &JsonValue) -> QuireResult<()> {
        let encoded = self.serializer.encode(content)?;
        let sql = format!(
            "INSERT INTO {} (\"Id\", \"Type\", \"Content\", \"Version\") VALUES (?1, ?2, ?3, 1)",
            self.table
        );
        self.conn
            .execute(&sql, params![id.as_i64(), type_name, to_sql(&encoded)])
            .map_err(|e| map_sql_error("insert document", e))?;
        Ok(())
    }

    /// Replace the content of a document, returning its new version
    pub fn update(&self, id: DocumentId, content: &JsonValue) -> QuireResult<u64> {
        let encoded = self.serializer.encode(content)?;
        let sql = format!(
            "UPDATE {} SET \"Content\" = ?1, \"Version\" = \"Version\" + 1 \
             WHERE \"Id\" = ?2 RETURNING \"Version\"",
            self.table
        );
        let version: Option<i64> = self
            .conn
            .query_row(&sql, params![to_sql(&encoded), id.as_i64()], |row| row.get(0))
            .optional()
            .map_err(|e| map_sql_error("update document", e))?;
        version
            .map(|v| v.max(0) as u64)
            .ok_or_else(|| QuireError::not_found(format!("document {}", id)))
    }

    /// Delete a document row
    pub fn delete(&self, id: DocumentId) -> QuireResult<()> {
        let sql = format!("DELETE FROM {} WHERE \"Id\" = ?1", self.table);
        let affected = self
            .conn
            .execute(&sql, params![id.as_i64()])
            .map_err(|e| map_sql_error("delete document", e))?;
        if affected == 0 {
            return Err(QuireError::not_found(format!("document {}", id)));
        }
        Ok(())
    }

    /// Number of stored documents of `type_name`
    pub fn count_of_type(&self, type_name: &str) -> QuireResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE \"Type\" = ?1", self.table);
        let count: i64 = self
            .conn
            .query_row(&sql, params![type_name], |row| row.get(0))
            .map_err(|e| map_sql_error("count documents", e))?;
        Ok(count.max(0) as u64)
    }
}
