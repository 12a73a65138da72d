//! Map and reduce index tables: layout, row access and bridge links.

use crate::{open_substrate, schema_of};
use quire_core::{ColumnType, ColumnValue, DocumentId, QuireError};
use quire_storage::{MapIndexTable, ReduceIndexTable, SqlStore, StorageLocation};
use serde_json::json;

fn blog_substrate() -> SqlStore {
    let sql = open_substrate(StorageLocation::Memory, "");
    schema_of(&sql)
        .create_map_index_table("BlogPostByAuthor", |t| {
            t.column("Author", ColumnType::Text);
            t.column("Title", ColumnType::Text);
        })
        .unwrap()
        .create_reduce_index_table("BlogPostByMonth", |t| {
            t.column("PublishedMonth", ColumnType::Text);
            t.column("Count", ColumnType::Integer);
        })
        .unwrap();
    sql
}

#[test]
fn map_table_layout_and_rows() {
    let sql = blog_substrate();
    let conn = sql.anchor().lock();

    let schema = sql.catalog().get(&conn, "BlogPostByAuthor").unwrap();
    let names: Vec<&str> = schema.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Id", "DocumentId", "Author", "Title"]);

    let table = MapIndexTable::open(&conn, sql.catalog(), sql.names(), "BlogPostByAuthor").unwrap();
    let doc = DocumentId::new(3);
    table
        .insert(doc, &json!({"Author": "Bob Jones", "Title": "First"}))
        .unwrap();
    table
        .insert(doc, &json!({"Author": "Bob Jones", "Title": "Second"}))
        .unwrap();
    table
        .insert(DocumentId::new(4), &json!({"Author": "Amy", "Title": "Other"}))
        .unwrap();

    let rows = table.rows_for_document(doc).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].values["Title"], json!("First"));
    assert_eq!(rows[1].document_id, Some(doc));

    assert_eq!(table.delete_for_document(doc).unwrap(), 2);
    assert!(table.rows_for_document(doc).unwrap().is_empty());
    assert_eq!(table.rows_for_document(DocumentId::new(4)).unwrap().len(), 1);
}

#[test]
fn map_rows_reject_unknown_and_reserved_columns() {
    let sql = blog_substrate();
    let conn = sql.anchor().lock();
    let table = MapIndexTable::open(&conn, sql.catalog(), sql.names(), "BlogPostByAuthor").unwrap();

    let err = table
        .insert(DocumentId::new(1), &json!({"Author": "Bob", "Rating": 5}))
        .unwrap_err();
    assert!(matches!(err, QuireError::Schema { .. }), "got {:?}", err);

    let err = table
        .insert(DocumentId::new(1), &json!({"DocumentId": 9}))
        .unwrap_err();
    assert!(matches!(err, QuireError::Schema { .. }), "got {:?}", err);
}

#[test]
fn missing_index_table_is_schema_error() {
    let sql = open_substrate(StorageLocation::Memory, "");
    let conn = sql.anchor().lock();
    let err = MapIndexTable::open(&conn, sql.catalog(), sql.names(), "Nope")
        .err()
        .unwrap();
    assert!(matches!(err, QuireError::Schema { .. }), "got {:?}", err);
}

#[test]
fn reduce_aggregates_and_bridge_links() {
    let sql = blog_substrate();
    let conn = sql.anchor().lock();
    let table =
        ReduceIndexTable::open(&conn, sql.catalog(), sql.names(), "BlogPostByMonth").unwrap();

    let key = ColumnValue::from("201701");
    assert!(table.find_by_group("PublishedMonth", &key).unwrap().is_none());

    let id = table
        .insert(&json!({"PublishedMonth": "201701", "Count": 1}))
        .unwrap();
    table.link(id, DocumentId::new(10)).unwrap();
    table.link(id, DocumentId::new(11)).unwrap();
    table.link(id, DocumentId::new(11)).unwrap();
    table
        .update(id, &json!({"PublishedMonth": "201701", "Count": 2}))
        .unwrap();

    let found = table.find_by_group("PublishedMonth", &key).unwrap().unwrap();
    assert_eq!(found.id, id);
    assert_eq!(found.document_id, None);
    assert_eq!(found.values, json!({"PublishedMonth": "201701", "Count": 2}));
    assert_eq!(
        table.linked_documents(id).unwrap(),
        vec![DocumentId::new(10), DocumentId::new(11)]
    );

    table.unlink(id, DocumentId::new(10)).unwrap();
    assert_eq!(table.linked_documents(id).unwrap(), vec![DocumentId::new(11)]);

    table.delete(id).unwrap();
    assert!(table.find_by_group("PublishedMonth", &key).unwrap().is_none());
    assert!(table.linked_documents(id).unwrap().is_empty());
}

#[test]
fn null_group_keys_match_null() {
    let sql = blog_substrate();
    let conn = sql.anchor().lock();
    let table =
        ReduceIndexTable::open(&conn, sql.catalog(), sql.names(), "BlogPostByMonth").unwrap();

    let id = table
        .insert(&json!({"PublishedMonth": null, "Count": 4}))
        .unwrap();
    let found = table
        .find_by_group("PublishedMonth", &ColumnValue::Null)
        .unwrap()
        .unwrap();
    assert_eq!(found.id, id);
    assert_eq!(found.values["Count"], json!(4));
}

#[test]
fn update_of_missing_aggregate_is_not_found() {
    let sql = blog_substrate();
    let conn = sql.anchor().lock();
    let table =
        ReduceIndexTable::open(&conn, sql.catalog(), sql.names(), "BlogPostByMonth").unwrap();

    let err = table
        .update(77, &json!({"PublishedMonth": "201702", "Count": 1}))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn catalog_sees_altered_tables() {
    let sql = blog_substrate();
    {
        let conn = sql.anchor().lock();
        let schema = sql.catalog().get(&conn, "BlogPostByAuthor").unwrap();
        assert!(!schema.has_column("Rating"));
    }

    schema_of(&sql)
        .alter_table("BlogPostByAuthor", |t| {
            t.add_column("Rating", ColumnType::Integer);
        })
        .unwrap();

    let conn = sql.anchor().lock();
    let schema = sql.catalog().get(&conn, "BlogPostByAuthor").unwrap();
    assert_eq!(schema.column("Rating").unwrap().ty, ColumnType::Integer);
}
