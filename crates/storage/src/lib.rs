//! Relational substrate for Quire
//!
//! This crate wraps SQLite (through `rusqlite`) with:
//! - SqlStore: connection factory for in-memory and file-backed databases
//! - SchemaBuilder: DDL for document, identifier and index tables
//! - TableCatalog: cached column layouts, invalidated on DDL
//! - DocumentTable / MapIndexTable / ReduceIndexTable: row access
//! - ContentSerializer: JSON or MessagePack document content
//! - LinearBlockIdGenerator: block-reserved document identifiers
//!
//! Everything here is synchronous; the engine moves calls onto blocking
//! threads.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod connection;
pub mod content;
pub mod dialect;
pub mod documents;
pub mod ids;
pub mod index_tables;
pub mod mapping;
pub mod schema;
pub mod sql_error;

pub use catalog::{ColumnInfo, TableCatalog, TableSchema};
pub use connection::{ConnectionOptions, SharedConnection, SqlStore, StorageLocation, DATABASE_FILE};
pub use content::ContentSerializer;
pub use dialect::{quote_ident, TableNames, DOCUMENT_ID_COLUMN, ID_COLUMN};
pub use documents::{DocumentTable, StoredDocument, DOCUMENT_COLUMN_COUNT};
pub use ids::{LinearBlockIdGenerator, DOCUMENT_DIMENSION};
pub use index_tables::{IndexRow, MapIndexTable, ReduceIndexTable};
pub use schema::{AlterTableBuilder, ColumnSpec, SchemaBuilder, TableBuilder};
pub use sql_error::map_sql_error;
