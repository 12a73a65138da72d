//! Schema builder
//!
//! Issues DDL for document, identifier and index tables on one connection.
//!
//! ```ignore
//! session
//!     .schema()
//!     .tolerate_errors(true)
//!     .drop_map_index_table("BlogPostByAuthor")?
//!     .create_map_index_table("BlogPostByAuthor", |table| {
//!         table.column("Author", ColumnType::Text);
//!         table.column("Title", ColumnType::Text);
//!     })?;
//! ```
//!
//! Tables are created with plain `CREATE TABLE` and dropped with plain
//! `DROP TABLE`, so creating an existing table or dropping a missing one is
//! a `Schema` error unless failures are tolerated, in which case they are
//! logged at `warn` and the builder moves on to the next statement.

use quire_core::{ColumnType, ColumnValue, QuireError, QuireResult};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::TableCatalog;
use crate::connection::SharedConnection;
use crate::dialect::{quote_ident, sql_literal, TableNames, DOCUMENT_ID_COLUMN, ID_COLUMN};

/// Declaration of a single column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    name: String,
    ty: ColumnType,
    not_null: bool,
    unique: bool,
    default: Option<ColumnValue>,
}

impl ColumnSpec {
    fn new(name: &str, ty: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            not_null: false,
            unique: false,
            default: None,
        }
    }

    /// Reject NULL values
    pub fn not_null(&mut self) -> &mut Self {
        self.not_null = true;
        self
    }

    /// Add a UNIQUE constraint
    pub fn unique(&mut self) -> &mut Self {
        self.unique = true;
        self
    }

    /// Default applied when an insert omits the column
    pub fn default_value(&mut self, value: impl Into<ColumnValue>) -> &mut Self {
        self.default = Some(value.into());
        self
    }

    fn to_sql(&self) -> QuireResult<String> {
        let mut sql = format!("{} {}", quote_ident(&self.name)?, self.ty.sql_name());
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&sql_literal(default));
        }
        Ok(sql)
    }
}

/// Column list of a table being created
#[derive(Debug, Default)]
pub struct TableBuilder {
    columns: Vec<ColumnSpec>,
}

impl TableBuilder {
    /// Declare a column
    pub fn column(&mut self, name: &str, ty: ColumnType) -> &mut ColumnSpec {
        self.columns.push(ColumnSpec::new(name, ty));
        let last = self.columns.len() - 1;
        &mut self.columns[last]
    }

    fn column_sql(&self) -> QuireResult<Vec<String>> {
        self.columns.iter().map(ColumnSpec::to_sql).collect()
    }
}

#[derive(Debug)]
enum AlterOp {
    Add(usize),
    Drop(String),
}

/// Column changes applied to an existing table
#[derive(Debug, Default)]
pub struct AlterTableBuilder {
    added: Vec<ColumnSpec>,
    ops: Vec<AlterOp>,
}

impl AlterTableBuilder {
    /// Add a column
    pub fn add_column(&mut self, name: &str, ty: ColumnType) -> &mut ColumnSpec {
        self.added.push(ColumnSpec::new(name, ty));
        let last = self.added.len() - 1;
        self.ops.push(AlterOp::Add(last));
        &mut self.added[last]
    }

    /// Drop a column
    pub fn drop_column(&mut self, name: &str) -> &mut Self {
        self.ops.push(AlterOp::Drop(name.to_string()));
        self
    }
}

/// DDL issuer bound to one connection
#[derive(Debug)]
pub struct SchemaBuilder {
    conn: SharedConnection,
    names: TableNames,
    catalog: Arc<TableCatalog>,
    tolerate_errors: bool,
}

impl SchemaBuilder {
    /// Create a builder issuing DDL on `conn`
    pub fn new(conn: SharedConnection, names: TableNames, catalog: Arc<TableCatalog>) -> Self {
        Self {
            conn,
            names,
            catalog,
            tolerate_errors: false,
        }
    }

    /// Log failed statements at `warn` instead of returning them
    pub fn tolerate_errors(&mut self, tolerate: bool) -> &mut Self {
        self.tolerate_errors = tolerate;
        self
    }

    /// Create a plain table with the declared columns
    pub fn create_table(
        &mut self,
        name: &str,
        columns: impl FnOnce(&mut TableBuilder),
    ) -> QuireResult<&mut Self> {
        let table = self.names.table(name);
        let mut builder = TableBuilder::default();
        columns(&mut builder);
        let sql = format!(
            "CREATE TABLE {} ({})",
            quote_ident(&table)?,
            builder.column_sql()?.join(", ")
        );
        self.run(vec![sql], &[table])?;
        Ok(self)
    }

    /// Drop a plain table
    pub fn drop_table(&mut self, name: &str) -> QuireResult<&mut Self> {
        let table = self.names.table(name);
        let sql = format!("DROP TABLE {}", quote_ident(&table)?);
        self.run(vec![sql], &[table])?;
        Ok(self)
    }

    /// Create a map index table
    ///
    /// The table gets an auto-increment `Id` and a `DocumentId` column
    /// (with an SQL index) ahead of the declared value columns.
    pub fn create_map_index_table(
        &mut self,
        index: &str,
        columns: impl FnOnce(&mut TableBuilder),
    ) -> QuireResult<&mut Self> {
        let table = self.names.index(index);
        let quoted = quote_ident(&table)?;
        let mut builder = TableBuilder::default();
        columns(&mut builder);

        let mut defs = vec![
            format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote_ident(ID_COLUMN)?),
            format!("{} INTEGER NOT NULL", quote_ident(DOCUMENT_ID_COLUMN)?),
        ];
        defs.extend(builder.column_sql()?);

        let statements = vec![
            format!("CREATE TABLE {} ({})", quoted, defs.join(", ")),
            format!(
                "CREATE INDEX {} ON {} ({})",
                quote_ident(&format!("IDX_{}_{}", table, DOCUMENT_ID_COLUMN))?,
                quoted,
                quote_ident(DOCUMENT_ID_COLUMN)?
            ),
        ];
        self.run(statements, &[table])?;
        Ok(self)
    }

    /// Drop a map index table
    pub fn drop_map_index_table(&mut self, index: &str) -> QuireResult<&mut Self> {
        let table = self.names.index(index);
        let sql = format!("DROP TABLE {}", quote_ident(&table)?);
        self.run(vec![sql], &[table])?;
        Ok(self)
    }

    /// Create a reduce index table and its document bridge table
    pub fn create_reduce_index_table(
        &mut self,
        index: &str,
        columns: impl FnOnce(&mut TableBuilder),
    ) -> QuireResult<&mut Self> {
        let table = self.names.index(index);
        let bridge = self.names.bridge(index);
        let bridge_column = quote_ident(&self.names.bridge_column(index))?;
        let document_column = quote_ident(DOCUMENT_ID_COLUMN)?;
        let mut builder = TableBuilder::default();
        columns(&mut builder);

        let mut defs = vec![format!(
            "{} INTEGER PRIMARY KEY AUTOINCREMENT",
            quote_ident(ID_COLUMN)?
        )];
        defs.extend(builder.column_sql()?);

        let statements = vec![
            format!("CREATE TABLE {} ({})", quote_ident(&table)?, defs.join(", ")),
            format!(
                "CREATE TABLE {} ({} INTEGER NOT NULL, {} INTEGER NOT NULL, PRIMARY KEY ({}, {}))",
                quote_ident(&bridge)?,
                bridge_column,
                document_column,
                bridge_column,
                document_column
            ),
            format!(
                "CREATE INDEX {} ON {} ({})",
                quote_ident(&format!("IDX_{}_{}", bridge, DOCUMENT_ID_COLUMN))?,
                quote_ident(&bridge)?,
                document_column
            ),
        ];
        self.run(statements, &[table, bridge])?;
        Ok(self)
    }

    /// Drop a reduce index table and its bridge table
    pub fn drop_reduce_index_table(&mut self, index: &str) -> QuireResult<&mut Self> {
        let table = self.names.index(index);
        let bridge = self.names.bridge(index);
        let statements = vec![
            format!("DROP TABLE {}", quote_ident(&bridge)?),
            format!("DROP TABLE {}", quote_ident(&table)?),
        ];
        self.run(statements, &[table, bridge])?;
        Ok(self)
    }

    /// Add or drop columns of an existing table
    pub fn alter_table(
        &mut self,
        name: &str,
        changes: impl FnOnce(&mut AlterTableBuilder),
    ) -> QuireResult<&mut Self> {
        let table = self.names.table(name);
        let quoted = quote_ident(&table)?;
        let mut builder = AlterTableBuilder::default();
        changes(&mut builder);

        let statements = builder
            .ops
            .iter()
            .map(|op| match op {
                AlterOp::Add(i) => Ok(format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    quoted,
                    builder.added[*i].to_sql()?
                )),
                AlterOp::Drop(column) => Ok(format!(
                    "ALTER TABLE {} DROP COLUMN {}",
                    quoted,
                    quote_ident(column)?
                )),
            })
            .collect::<QuireResult<Vec<_>>>()?;
        self.run(statements, &[table])?;
        Ok(self)
    }

    /// Create an SQL index over columns of a table
    pub fn create_index(
        &mut self,
        table: &str,
        index_name: &str,
        columns: &[&str],
    ) -> QuireResult<&mut Self> {
        if columns.is_empty() {
            return Err(QuireError::invalid_input(format!(
                "index {} needs at least one column",
                index_name
            )));
        }
        let physical = self.names.table(table);
        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<QuireResult<Vec<_>>>()?
            .join(", ");
        let sql = format!(
            "CREATE INDEX {} ON {} ({})",
            quote_ident(&self.names.table(index_name))?,
            quote_ident(&physical)?,
            column_list
        );
        self.run(vec![sql], &[])?;
        Ok(self)
    }

    /// Drop an SQL index
    pub fn drop_index(&mut self, index_name: &str) -> QuireResult<&mut Self> {
        let sql = format!("DROP INDEX {}", quote_ident(&self.names.table(index_name))?);
        self.run(vec![sql], &[])?;
        Ok(self)
    }

    /// Create the document table
    pub fn create_document_table(&mut self) -> QuireResult<&mut Self> {
        let table = self.names.document();
        let quoted = quote_ident(&table)?;
        let statements = vec![
            format!(
                "CREATE TABLE {} (\"Id\" INTEGER PRIMARY KEY, \"Type\" TEXT NOT NULL, \
                 \"Content\", \"Version\" INTEGER NOT NULL DEFAULT 1)",
                quoted
            ),
            format!(
                "CREATE INDEX {} ON {} (\"Type\")",
                quote_ident(&format!("IDX_{}_Type", table))?,
                quoted
            ),
        ];
        self.run(statements, &[table])?;
        Ok(self)
    }

    /// Create the identifier allocation table
    pub fn create_identifiers_table(&mut self) -> QuireResult<&mut Self> {
        let table = self.names.identifiers();
        let sql = format!(
            "CREATE TABLE {} (\"Dimension\" TEXT PRIMARY KEY, \"NextVal\" INTEGER NOT NULL)",
            quote_ident(&table)?
        );
        self.run(vec![sql], &[table])?;
        Ok(self)
    }

    fn run(&mut self, statements: Vec<String>, touched: &[String]) -> QuireResult<()> {
        let mut result = Ok(());
        {
            let conn = self.conn.lock();
            for sql in &statements {
                debug!(target: "quire::schema", sql = %sql, "Executing DDL");
                if let Err(e) = conn.execute_batch(sql) {
                    if self.tolerate_errors {
                        warn!(target: "quire::schema", sql = %sql, error = %e, "Ignoring failed DDL");
                        continue;
                    }
                    result = Err(QuireError::schema(format!("{} failed: {}", sql, e)));
                    break;
                }
            }
        }
        for table in touched {
            self.catalog.invalidate(table);
        }
        result
    }
}
