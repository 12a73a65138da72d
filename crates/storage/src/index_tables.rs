//! Index table access
//!
//! Map tables hold `(Id, DocumentId, values…)` rows owned by one document.
//! Reduce tables hold `(Id, values…)` aggregates; the bridge table
//! `{Index}_Document` records which documents contribute to each aggregate
//! so that document queries can join through it.

use quire_core::{ColumnValue, DocumentId, QuireError, QuireResult};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::catalog::{TableCatalog, TableSchema};
use crate::dialect::{quote_ident, TableNames, ID_COLUMN};
use crate::mapping::{object_to_columns, row_to_object, to_sql};
use crate::sql_error::map_sql_error;

/// An index row read back from storage
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRow {
    /// Row identifier
    pub id: i64,
    /// Owning document (map rows only)
    pub document_id: Option<DocumentId>,
    /// Value columns as a JSON object
    pub values: JsonValue,
}

fn load_schema(
    conn: &Connection,
    catalog: &TableCatalog,
    table: &str,
    index: &str,
) -> QuireResult<Arc<TableSchema>> {
    catalog.get(conn, table).map_err(|e| {
        if e.is_not_found() {
            QuireError::schema(format!(
                "index table {} for {} does not exist",
                table, index
            ))
        } else {
            e
        }
    })
}

fn insert_sql(table: &str, columns: &[(String, ColumnValue)], extra: &[&str]) -> QuireResult<String> {
    let mut names = extra
        .iter()
        .map(|c| quote_ident(c))
        .collect::<QuireResult<Vec<_>>>()?;
    for (name, _) in columns {
        names.push(quote_ident(name)?);
    }
    if names.is_empty() {
        return Ok(format!("INSERT INTO {} DEFAULT VALUES", table));
    }
    let placeholders = (1..=names.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        names.join(", "),
        placeholders
    ))
}

/// Accessor for one map index table
pub struct MapIndexTable<'c> {
    conn: &'c Connection,
    table: String,
    schema: Arc<TableSchema>,
}

impl<'c> MapIndexTable<'c> {
    /// Bind the table of map index `index`
    ///
    /// A missing table is a `Schema` error.
    pub fn open(
        conn: &'c Connection,
        catalog: &TableCatalog,
        names: &TableNames,
        index: &str,
    ) -> QuireResult<Self> {
        let physical = names.index(index);
        let schema = load_schema(conn, catalog, &physical, index)?;
        Ok(Self {
            conn,
            table: quote_ident(&physical)?,
            schema,
        })
    }

    /// Remove every row owned by `document`
    pub fn delete_for_document(&self, document: DocumentId) -> QuireResult<usize> {
        let sql = format!("DELETE FROM {} WHERE \"DocumentId\" = ?1", self.table);
        self.conn
            .execute(&sql, params![document.as_i64()])
            .map_err(|e| map_sql_error("delete map index rows", e))
    }

    /// Insert one row owned by `document`
    pub fn insert(&self, document: DocumentId, record: &JsonValue) -> QuireResult<()> {
        let columns = object_to_columns(&self.schema, record)?;
        let sql = insert_sql(&self.table, &columns, &["DocumentId"])?;
        let values = std::iter::once(rusqlite::types::Value::Integer(document.as_i64()))
            .chain(columns.iter().map(|(_, v)| to_sql(v)));
        self.conn
            .execute(&sql, params_from_iter(values))
            .map_err(|e| map_sql_error("insert map index row", e))?;
        Ok(())
    }

    /// Rows owned by `document`, in insertion order
    pub fn rows_for_document(&self, document: DocumentId) -> QuireResult<Vec<IndexRow>> {
        let value_columns = self
            .schema
            .value_columns()
            .map(|c| quote_ident(&c.name))
            .collect::<QuireResult<Vec<_>>>()?;
        let mut select = vec!["\"Id\"".to_string(), "\"DocumentId\"".to_string()];
        select.extend(value_columns);
        let sql = format!(
            "SELECT {} FROM {} WHERE \"DocumentId\" = ?1 ORDER BY \"Id\"",
            select.join(", "),
            self.table
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| map_sql_error("read map index rows", e))?;
        let rows = stmt
            .query_map(params![document.as_i64()], |row| {
                let id: i64 = row.get(0)?;
                let doc: i64 = row.get(1)?;
                Ok((id, doc, row_to_object(&self.schema, row, 2)))
            })
            .map_err(|e| map_sql_error("read map index rows", e))?;

        let mut out = Vec::new();
        for row in rows {
            let (id, doc, values) = row.map_err(|e| map_sql_error("read map index rows", e))?;
            out.push(IndexRow {
                id,
                document_id: Some(DocumentId::new(doc)),
                values: values?,
            });
        }
        Ok(out)
    }
}

/// Accessor for one reduce index table and its bridge
pub struct ReduceIndexTable<'c> {
    conn: &'c Connection,
    table: String,
    bridge: String,
    bridge_column: String,
    schema: Arc<TableSchema>,
}

impl<'c> ReduceIndexTable<'c> {
    /// Bind the tables of reduce index `index`
    pub fn open(
        conn: &'c Connection,
        catalog: &TableCatalog,
        names: &TableNames,
        index: &str,
    ) -> QuireResult<Self> {
        let physical = names.index(index);
        let schema = load_schema(conn, catalog, &physical, index)?;
        load_schema(conn, catalog, &names.bridge(index), index)?;
        Ok(Self {
            conn,
            table: quote_ident(&physical)?,
            bridge: quote_ident(&names.bridge(index))?,
            bridge_column: quote_ident(&names.bridge_column(index))?,
            schema,
        })
    }

    /// Layout of the aggregate table
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Aggregate row whose `column` equals `key` (NULL-safe)
    pub fn find_by_group(&self, column: &str, key: &ColumnValue) -> QuireResult<Option<IndexRow>> {
        if !self.schema.has_column(column) {
            return Err(QuireError::schema(format!(
                "table {} has no group column {}",
                self.schema.name, column
            )));
        }
        let mut select = vec![quote_ident(ID_COLUMN)?];
        for c in self.schema.value_columns() {
            select.push(quote_ident(&c.name)?);
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE {} IS ?1 ORDER BY \"Id\" LIMIT 1",
            select.join(", "),
            self.table,
            quote_ident(column)?
        );
        let found = self
            .conn
            .query_row(&sql, params![to_sql(key)], |row| {
                let id: i64 = row.get(0)?;
                Ok((id, row_to_object(&self.schema, row, 1)))
            })
            .optional()
            .map_err(|e| map_sql_error("read aggregate", e))?;
        match found {
            Some((id, values)) => Ok(Some(IndexRow {
                id,
                document_id: None,
                values: values?,
            })),
            None => Ok(None),
        }
    }

    /// Insert a new aggregate, returning its row id
    pub fn insert(&self, record: &JsonValue) -> QuireResult<i64> {
        let columns = object_to_columns(&self.schema, record)?;
        let sql = insert_sql(&self.table, &columns, &[])?;
        self.conn
            .execute(&sql, params_from_iter(columns.iter().map(|(_, v)| to_sql(v))))
            .map_err(|e| map_sql_error("insert aggregate", e))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Overwrite the value columns of an aggregate
    pub fn update(&self, id: i64, record: &JsonValue) -> QuireResult<()> {
        let columns = object_to_columns(&self.schema, record)?;
        if columns.is_empty() {
            return Ok(());
        }
        let assignments = columns
            .iter()
            .enumerate()
            .map(|(i, (name, _))| Ok(format!("{} = ?{}", quote_ident(name)?, i + 1)))
            .collect::<QuireResult<Vec<_>>>()?;
        let sql = format!(
            "UPDATE {} SET {} WHERE \"Id\" = ?{}",
            self.table,
            assignments.join(", "),
            columns.len() + 1
        );
        let values = columns
            .iter()
            .map(|(_, v)| to_sql(v))
            .chain(std::iter::once(rusqlite::types::Value::Integer(id)));
        let affected = self
            .conn
            .execute(&sql, params_from_iter(values))
            .map_err(|e| map_sql_error("update aggregate", e))?;
        if affected == 0 {
            return Err(QuireError::not_found(format!(
                "aggregate {} in {}",
                id, self.schema.name
            )));
        }
        Ok(())
    }

    /// Delete an aggregate and its bridge rows
    pub fn delete(&self, id: i64) -> QuireResult<()> {
        let unlink = format!("DELETE FROM {} WHERE {} = ?1", self.bridge, self.bridge_column);
        self.conn
            .execute(&unlink, params![id])
            .map_err(|e| map_sql_error("delete aggregate links", e))?;
        let sql = format!("DELETE FROM {} WHERE \"Id\" = ?1", self.table);
        self.conn
            .execute(&sql, params![id])
            .map_err(|e| map_sql_error("delete aggregate", e))?;
        Ok(())
    }

    /// Record that `document` contributes to aggregate `id`
    pub fn link(&self, id: i64, document: DocumentId) -> QuireResult<()> {
        let sql = format!(
            "INSERT OR IGNORE INTO {} ({}, \"DocumentId\") VALUES (?1, ?2)",
            self.bridge, self.bridge_column
        );
        self.conn
            .execute(&sql, params![id, document.as_i64()])
            .map_err(|e| map_sql_error("link aggregate", e))?;
        Ok(())
    }

    /// Remove the link between aggregate `id` and `document`
    pub fn unlink(&self, id: i64, document: DocumentId) -> QuireResult<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1 AND \"DocumentId\" = ?2",
            self.bridge, self.bridge_column
        );
        self.conn
            .execute(&sql, params![id, document.as_i64()])
            .map_err(|e| map_sql_error("unlink aggregate", e))?;
        Ok(())
    }

    /// Documents linked to aggregate `id`, ascending
    pub fn linked_documents(&self, id: i64) -> QuireResult<Vec<DocumentId>> {
        let sql = format!(
            "SELECT \"DocumentId\" FROM {} WHERE {} = ?1 ORDER BY \"DocumentId\"",
            self.bridge, self.bridge_column
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| map_sql_error("read aggregate links", e))?;
        let ids = stmt
            .query_map(params![id], |row| row.get::<_, i64>(0))
            .map_err(|e| map_sql_error("read aggregate links", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sql_error("read aggregate links", e))?;
        Ok(ids.into_iter().map(DocumentId::new).collect())
    }
}
