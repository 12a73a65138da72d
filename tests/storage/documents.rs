//! Document table rows: encoding, versions and not-found handling.

use crate::open_substrate;
use quire_core::{DocumentId, QuireError};
use quire_storage::{ContentSerializer, DocumentTable, StorageLocation};
use serde_json::json;

#[test]
fn insert_load_update_delete() {
    let sql = open_substrate(StorageLocation::Memory, "");
    let conn = sql.anchor().lock();
    let table = DocumentTable::new(&conn, sql.names(), ContentSerializer::Json).unwrap();
    let id = DocumentId::new(1);

    table
        .insert(id, "BlogPost", &json!({"Title": "Hello", "Tags": ["Foo"]}))
        .unwrap();
    let stored = table.load(id).unwrap().unwrap();
    assert_eq!(stored.type_name, "BlogPost");
    assert_eq!(stored.version, 1);
    assert_eq!(stored.content["Tags"], json!(["Foo"]));

    assert_eq!(table.update(id, &json!({"Title": "Bye"})).unwrap(), 2);
    assert_eq!(table.update(id, &json!({"Title": "Again"})).unwrap(), 3);
    let stored = table.load(id).unwrap().unwrap();
    assert_eq!(stored.content, json!({"Title": "Again"}));
    assert_eq!(stored.version, 3);

    assert_eq!(table.count_of_type("BlogPost").unwrap(), 1);
    table.delete(id).unwrap();
    assert!(table.load(id).unwrap().is_none());
    assert_eq!(table.count_of_type("BlogPost").unwrap(), 0);
}

#[test]
fn update_and_delete_of_missing_row_are_not_found() {
    let sql = open_substrate(StorageLocation::Memory, "");
    let conn = sql.anchor().lock();
    let table = DocumentTable::new(&conn, sql.names(), ContentSerializer::Json).unwrap();

    assert!(table
        .update(DocumentId::new(5), &json!({}))
        .unwrap_err()
        .is_not_found());
    assert!(table.delete(DocumentId::new(5)).unwrap_err().is_not_found());
}

#[test]
fn duplicate_insert_is_storage_error() {
    let sql = open_substrate(StorageLocation::Memory, "");
    let conn = sql.anchor().lock();
    let table = DocumentTable::new(&conn, sql.names(), ContentSerializer::Json).unwrap();

    table.insert(DocumentId::new(1), "A", &json!({})).unwrap();
    let err = table.insert(DocumentId::new(1), "A", &json!({})).unwrap_err();
    assert!(matches!(err, QuireError::Storage { .. }), "got {:?}", err);
}

#[test]
fn content_column_type_follows_serializer() {
    let sql = open_substrate(StorageLocation::Memory, "");
    let conn = sql.anchor().lock();
    let content = json!({"Title": "Mixed", "Published": "2017-01-05", "Count": 3});

    let json_table = DocumentTable::new(&conn, sql.names(), ContentSerializer::Json).unwrap();
    json_table.insert(DocumentId::new(1), "Doc", &content).unwrap();
    let msgpack_table =
        DocumentTable::new(&conn, sql.names(), ContentSerializer::MessagePack).unwrap();
    msgpack_table.insert(DocumentId::new(2), "Doc", &content).unwrap();

    let kinds: Vec<String> = {
        let mut stmt = conn
            .prepare("SELECT typeof(\"Content\") FROM \"Document\" ORDER BY \"Id\"")
            .unwrap();
        let rows = stmt.query_map([], |row| row.get::<_, String>(0)).unwrap();
        rows.collect::<Result<_, _>>().unwrap()
    };
    assert_eq!(kinds, vec!["text", "blob"]);

    // either encoding is readable whatever the configured serializer
    assert_eq!(json_table.load(DocumentId::new(2)).unwrap().unwrap().content, content);
    assert_eq!(
        msgpack_table.load(DocumentId::new(1)).unwrap().unwrap().content,
        content
    );
}

#[test]
fn prefixed_document_table() {
    let sql = open_substrate(StorageLocation::Memory, "blog_");
    let conn = sql.anchor().lock();
    let table = DocumentTable::new(&conn, sql.names(), ContentSerializer::Json).unwrap();
    assert_eq!(table.quoted_name(), "\"blog_Document\"");

    table.insert(DocumentId::new(9), "Doc", &json!({"A": 1})).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM \"blog_Document\"", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}
