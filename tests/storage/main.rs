//! Storage integration tests
//!
//! The relational substrate on its own: document rows, identifier blocks
//! and index tables, against in-memory and file databases.

#[path = "../common/mod.rs"]
mod common;

mod documents;
mod identifiers;
mod index_tables;

use quire_storage::{ConnectionOptions, SchemaBuilder, SqlStore, StorageLocation, TableNames};
use std::path::Path;
use std::sync::Arc;

/// Open a substrate with the document and identifier tables created
pub fn open_substrate(location: StorageLocation, prefix: &str) -> SqlStore {
    common::init_tracing();
    let options = ConnectionOptions {
        names: TableNames::new(prefix).expect("valid prefix"),
        ..ConnectionOptions::default()
    };
    let sql = SqlStore::open(location, options).expect("open substrate");
    let mut schema = schema_of(&sql);
    schema.tolerate_errors(true);
    schema
        .create_document_table()
        .unwrap()
        .create_identifiers_table()
        .unwrap();
    sql
}

pub fn open_file_substrate(dir: &Path) -> SqlStore {
    open_substrate(StorageLocation::in_directory(dir), "")
}

pub fn schema_of(sql: &SqlStore) -> SchemaBuilder {
    SchemaBuilder::new(
        Arc::clone(sql.anchor()),
        sql.names().clone(),
        Arc::clone(sql.catalog()),
    )
}
