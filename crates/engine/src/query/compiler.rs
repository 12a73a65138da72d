//! Query compiler
//!
//! Document queries join the document table with one index table per
//! `with` clause:
//!
//! ```sql
//! SELECT d."Id", d."Type", d."Content", d."Version"
//! FROM "Document" d
//! INNER JOIN "PostByAuthor" i0 ON i0."DocumentId" = d."Id"
//! INNER JOIN "PostByMonth_Document" b1 ON b1."DocumentId" = d."Id"
//! INNER JOIN "PostByMonth" i1 ON i1."Id" = b1."PostByMonthId"
//! WHERE d."Type" = ? AND (i0."Author" = ?) AND (i1."PublishedMonth" = ?)
//! GROUP BY d."Id"
//! ORDER BY d."Id"
//! ```
//!
//! Each clause filters its own join, so several clauses intersect.
//! Grouping by document id collapses the duplicates produced by one-to-many
//! map indexes. Index queries read one index table directly.

use quire_core::{ColumnValue, DocumentId, IndexKind, QuireError, QuireResult};
use quire_storage::mapping::{row_to_object, to_sql};
use quire_storage::{
    map_sql_error, quote_ident, DocumentTable, IndexRow, StoredDocument, TableCatalog,
    TableNames, TableSchema,
};
use rusqlite::{params_from_iter, Connection};
use std::sync::Arc;
use tracing::debug;

use super::predicate::Predicate;
use crate::registry::IndexRegistry;

/// One index joined into a document query
#[derive(Debug, Clone)]
pub struct JoinClause {
    /// Index name
    pub index: &'static str,
    /// Filter on the joined rows; `None` only requires a row to exist
    pub predicate: Option<Predicate>,
}

/// Sort key on a joined index column
#[derive(Debug, Clone)]
pub struct OrderTerm {
    /// Position of the join in [`DocumentQuerySpec::joins`]
    pub join: usize,
    /// Column of that index
    pub column: String,
    /// Descending order
    pub descending: bool,
}

/// Paging window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Paging {
    /// Rows to skip
    pub skip: Option<u64>,
    /// Maximum rows to return
    pub take: Option<u64>,
}

impl Paging {
    fn to_sql(self, params: &mut Vec<ColumnValue>) -> String {
        let clamp = |n: u64| ColumnValue::Integer(i64::try_from(n).unwrap_or(i64::MAX));
        match (self.take, self.skip) {
            (None, None) => String::new(),
            (Some(take), None) => {
                params.push(clamp(take));
                " LIMIT ?".to_string()
            }
            (None, Some(skip)) => {
                params.push(clamp(skip));
                " LIMIT -1 OFFSET ?".to_string()
            }
            (Some(take), Some(skip)) => {
                params.push(clamp(take));
                params.push(clamp(skip));
                " LIMIT ? OFFSET ?".to_string()
            }
        }
    }
}

/// Declarative document query
#[derive(Debug, Clone)]
pub struct DocumentQuerySpec {
    /// Document type tag
    pub document_type: &'static str,
    /// Joined indexes
    pub joins: Vec<JoinClause>,
    /// Sort keys, applied before the implicit id order
    pub order: Vec<OrderTerm>,
    /// Paging window
    pub paging: Paging,
}

impl DocumentQuerySpec {
    /// Query every document of `document_type`
    pub fn new(document_type: &'static str) -> Self {
        Self {
            document_type,
            joins: Vec::new(),
            order: Vec::new(),
            paging: Paging::default(),
        }
    }

    /// Position of the first join on `index`, if any
    pub fn join_position(&self, index: &str) -> Option<usize> {
        self.joins.iter().position(|j| j.index == index)
    }
}

/// Sort key on an index column
#[derive(Debug, Clone)]
pub struct IndexOrder {
    /// Column name
    pub column: String,
    /// Descending order
    pub descending: bool,
}

/// Declarative index query
#[derive(Debug, Clone)]
pub struct IndexQuerySpec {
    /// Index name
    pub index: &'static str,
    /// Row filter
    pub predicate: Option<Predicate>,
    /// Sort keys, applied before the implicit row id order
    pub order: Vec<IndexOrder>,
    /// Paging window
    pub paging: Paging,
}

impl IndexQuerySpec {
    /// Query every row of `index`
    pub fn new(index: &'static str) -> Self {
        Self {
            index,
            predicate: None,
            order: Vec::new(),
            paging: Paging::default(),
        }
    }
}

/// SQL text with its bound operands
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// Statement with anonymous placeholders
    pub sql: String,
    /// Operands in placeholder order
    pub params: Vec<ColumnValue>,
}

/// Compiled index query plus what is needed to decode its rows
#[derive(Debug, Clone)]
pub struct CompiledIndexQuery {
    /// Statement and operands
    pub query: CompiledQuery,
    /// Layout of the index table
    pub schema: Arc<TableSchema>,
    /// Whether rows carry a `DocumentId` column (map indexes)
    pub has_document_id: bool,
}

/// Translates query specs into SQL against one connection's tables
pub struct QueryCompiler<'a> {
    conn: &'a Connection,
    catalog: &'a TableCatalog,
    names: &'a TableNames,
    registry: &'a IndexRegistry,
}

struct ResolvedJoin {
    alias: String,
    schema: Arc<TableSchema>,
}

impl<'a> QueryCompiler<'a> {
    /// Create a compiler
    pub fn new(
        conn: &'a Connection,
        catalog: &'a TableCatalog,
        names: &'a TableNames,
        registry: &'a IndexRegistry,
    ) -> Self {
        Self {
            conn,
            catalog,
            names,
            registry,
        }
    }

    fn index_schema(&self, index: &str) -> QuireResult<Arc<TableSchema>> {
        let table = self.names.index(index);
        self.catalog.get(self.conn, &table).map_err(|e| {
            if e.is_not_found() {
                QuireError::query(format!("index table {} does not exist", table))
            } else {
                e
            }
        })
    }

    fn from_clause(
        &self,
        spec: &DocumentQuerySpec,
        params: &mut Vec<ColumnValue>,
    ) -> QuireResult<(String, Vec<ResolvedJoin>)> {
        let mut sql = format!("FROM {} d", quote_ident(&self.names.document())?);
        let mut filters = vec!["d.\"Type\" = ?".to_string()];
        params.push(ColumnValue::Text(spec.document_type.to_string()));
        let mut resolved = Vec::with_capacity(spec.joins.len());

        for (n, join) in spec.joins.iter().enumerate() {
            let descriptor = self
                .registry
                .descriptor(spec.document_type, join.index)
                .ok_or_else(|| {
                    QuireError::query(format!(
                        "index {} is not registered for {}",
                        join.index, spec.document_type
                    ))
                })?;
            let schema = self.index_schema(join.index)?;
            let alias = format!("i{}", n);
            let table = quote_ident(&self.names.index(join.index))?;

            match descriptor.kind() {
                IndexKind::Map => {
                    sql.push_str(&format!(
                        " INNER JOIN {t} {a} ON {a}.\"DocumentId\" = d.\"Id\"",
                        t = table,
                        a = alias
                    ));
                }
                IndexKind::Reduce => {
                    let bridge_alias = format!("b{}", n);
                    sql.push_str(&format!(
                        " INNER JOIN {bt} {b} ON {b}.\"DocumentId\" = d.\"Id\" \
                         INNER JOIN {t} {a} ON {a}.\"Id\" = {b}.{bc}",
                        bt = quote_ident(&self.names.bridge(join.index))?,
                        b = bridge_alias,
                        t = table,
                        a = alias,
                        bc = quote_ident(&self.names.bridge_column(join.index))?,
                    ));
                }
            }
            resolved.push(ResolvedJoin { alias, schema });
        }

        for (join, r) in spec.joins.iter().zip(&resolved) {
            if let Some(predicate) = &join.predicate {
                filters.push(format!("({})", predicate.to_sql(&r.alias, &r.schema, params)?));
            }
        }
        sql.push_str(" WHERE ");
        sql.push_str(&filters.join(" AND "));
        Ok((sql, resolved))
    }

    /// Compile a query returning full document rows
    pub fn documents(&self, spec: &DocumentQuerySpec) -> QuireResult<CompiledQuery> {
        let mut params = Vec::new();
        let (from, joins) = self.from_clause(spec, &mut params)?;

        let mut order = Vec::with_capacity(spec.order.len() + 1);
        for term in &spec.order {
            let join = joins.get(term.join).ok_or_else(|| {
                QuireError::query(format!("order term refers to missing join {}", term.join))
            })?;
            if !join.schema.has_column(&term.column) {
                return Err(QuireError::query(format!(
                    "{} has no column {}",
                    join.schema.name, term.column
                )));
            }
            let column = format!("{}.{}", join.alias, quote_ident(&term.column)?);
            // One-to-many joins yield several values per document; sort on
            // the smallest (ascending) or largest (descending).
            order.push(if term.descending {
                format!("MAX({}) DESC", column)
            } else {
                format!("MIN({}) ASC", column)
            });
        }
        order.push("d.\"Id\"".to_string());

        let mut sql = format!(
            "SELECT {} {} GROUP BY d.\"Id\" ORDER BY {}",
            DocumentTable::select_list("d"),
            from,
            order.join(", ")
        );
        sql.push_str(&spec.paging.to_sql(&mut params));
        debug!(target: "quire::query", sql = %sql, params = params.len(), "Compiled document query");
        Ok(CompiledQuery { sql, params })
    }

    /// Compile a query counting matching documents
    ///
    /// Ordering and paging are ignored.
    pub fn count_documents(&self, spec: &DocumentQuerySpec) -> QuireResult<CompiledQuery> {
        let mut params = Vec::new();
        let (from, _) = self.from_clause(spec, &mut params)?;
        let sql = format!("SELECT COUNT(DISTINCT d.\"Id\") {}", from);
        debug!(target: "quire::query", sql = %sql, "Compiled document count");
        Ok(CompiledQuery { sql, params })
    }

    fn index_from(
        &self,
        spec: &IndexQuerySpec,
        params: &mut Vec<ColumnValue>,
    ) -> QuireResult<(String, Arc<TableSchema>, IndexKind)> {
        let kind = self.registry.kind_of(spec.index).ok_or_else(|| {
            QuireError::query(format!("index {} is not registered", spec.index))
        })?;
        let schema = self.index_schema(spec.index)?;
        let mut sql = format!("FROM {} i", quote_ident(&self.names.index(spec.index))?);
        if let Some(predicate) = &spec.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate.to_sql("i", &schema, params)?);
        }
        Ok((sql, schema, kind))
    }

    /// Compile a query returning index rows
    pub fn index_rows(&self, spec: &IndexQuerySpec) -> QuireResult<CompiledIndexQuery> {
        let mut params = Vec::new();
        let (from, schema, kind) = self.index_from(spec, &mut params)?;
        let has_document_id = kind == IndexKind::Map;

        let mut select = vec!["i.\"Id\"".to_string()];
        if has_document_id {
            select.push("i.\"DocumentId\"".to_string());
        }
        for column in schema.value_columns() {
            select.push(format!("i.{}", quote_ident(&column.name)?));
        }

        let mut order = Vec::with_capacity(spec.order.len() + 1);
        for term in &spec.order {
            if !schema.has_column(&term.column) {
                return Err(QuireError::query(format!(
                    "{} has no column {}",
                    schema.name, term.column
                )));
            }
            order.push(format!(
                "i.{} {}",
                quote_ident(&term.column)?,
                if term.descending { "DESC" } else { "ASC" }
            ));
        }
        order.push("i.\"Id\"".to_string());

        let mut sql = format!(
            "SELECT {} {} ORDER BY {}",
            select.join(", "),
            from,
            order.join(", ")
        );
        sql.push_str(&spec.paging.to_sql(&mut params));
        debug!(target: "quire::query", sql = %sql, params = params.len(), "Compiled index query");
        Ok(CompiledIndexQuery {
            query: CompiledQuery { sql, params },
            schema,
            has_document_id,
        })
    }

    /// Compile a query counting matching index rows
    pub fn count_index_rows(&self, spec: &IndexQuerySpec) -> QuireResult<CompiledQuery> {
        let mut params = Vec::new();
        let (from, _, _) = self.index_from(spec, &mut params)?;
        let sql = format!("SELECT COUNT(*) {}", from);
        debug!(target: "quire::query", sql = %sql, "Compiled index count");
        Ok(CompiledQuery { sql, params })
    }
}

/// Run a compiled document query
pub fn fetch_documents(conn: &Connection, query: &CompiledQuery) -> QuireResult<Vec<StoredDocument>> {
    let mut stmt = conn
        .prepare(&query.sql)
        .map_err(|e| map_sql_error("prepare document query", e))?;
    let rows = stmt
        .query_map(params_from_iter(query.params.iter().map(to_sql)), |row| {
            Ok(StoredDocument::from_row(row, 0))
        })
        .map_err(|e| map_sql_error("run document query", e))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_error("read document query", e))??);
    }
    Ok(out)
}

/// Run a compiled index query
pub fn fetch_index_rows(conn: &Connection, compiled: &CompiledIndexQuery) -> QuireResult<Vec<IndexRow>> {
    let query = &compiled.query;
    let mut stmt = conn
        .prepare(&query.sql)
        .map_err(|e| map_sql_error("prepare index query", e))?;
    let offset = if compiled.has_document_id { 2 } else { 1 };
    let rows = stmt
        .query_map(params_from_iter(query.params.iter().map(to_sql)), |row| {
            let id: i64 = row.get(0)?;
            let document_id = if compiled.has_document_id {
                Some(DocumentId::new(row.get::<_, i64>(1)?))
            } else {
                None
            };
            Ok((id, document_id, row_to_object(&compiled.schema, row, offset)))
        })
        .map_err(|e| map_sql_error("run index query", e))?;

    let mut out = Vec::new();
    for row in rows {
        let (id, document_id, values) = row.map_err(|e| map_sql_error("read index query", e))?;
        out.push(IndexRow {
            id,
            document_id,
            values: values?,
        });
    }
    Ok(out)
}

/// Run a compiled count query
pub fn fetch_count(conn: &Connection, query: &CompiledQuery) -> QuireResult<u64> {
    let count: i64 = conn
        .query_row(&query.sql, params_from_iter(query.params.iter().map(to_sql)), |row| {
            row.get(0)
        })
        .map_err(|e| map_sql_error("run count query", e))?;
    Ok(count.max(0) as u64)
}
