//! Schema administration through a session's schema builder.

use crate::common::*;

#[tokio::test]
async fn drops_of_missing_tables_are_tolerated_when_asked() {
    let test_store = TestStore::in_memory().await;
    let session = test_store.session();

    let mut schema = session.schema().unwrap();
    schema.tolerate_errors(true);
    schema
        .drop_map_index_table("BlogPostByNothing")
        .unwrap()
        .drop_reduce_index_table("BlogPostByNothing")
        .unwrap()
        .drop_table("Nothing")
        .unwrap();
}

#[tokio::test]
async fn drops_of_missing_tables_fail_by_default() {
    let test_store = TestStore::in_memory().await;
    let session = test_store.session();

    let err = session
        .schema()
        .unwrap()
        .drop_map_index_table("BlogPostByNothing")
        .unwrap_err();
    assert!(matches!(err, QuireError::Schema { .. }), "got {:?}", err);
}

#[tokio::test]
async fn creating_an_existing_index_table_is_schema_error() {
    let test_store = TestStore::in_memory().await;
    let session = test_store.session();

    let err = create_blog_schema(&session).unwrap_err();
    assert!(matches!(err, QuireError::Schema { .. }), "got {:?}", err);

    let mut schema = session.schema().unwrap();
    schema.tolerate_errors(true);
    schema
        .create_map_index_table("BlogPostByTag", |t| {
            t.column("Tag", ColumnType::Text);
        })
        .unwrap();
}

#[tokio::test]
async fn reset_and_rebuild_like_a_fresh_start() {
    let test_store = TestStore::in_memory().await;
    test_store.save_all(sample_posts(6)).await;

    let session = test_store.session();
    let mut schema = session.schema().unwrap();
    schema.tolerate_errors(true);
    schema
        .drop_map_index_table("BlogPostByAuthor")
        .unwrap()
        .drop_map_index_table("BlogPostByTag")
        .unwrap()
        .drop_reduce_index_table("BlogPostByMonth")
        .unwrap()
        .drop_table("Document")
        .unwrap()
        .drop_table("Identifiers")
        .unwrap();
    drop(session);

    test_store.store.initialize().await.unwrap();
    create_blog_schema(&test_store.session()).unwrap();

    let posts = test_store.save_all(sample_posts(4)).await;
    let mut session = test_store.session();
    assert_eq!(session.query::<BlogPost>().count().await.unwrap(), 4);
    assert_eq!(test_store.month_counts().await, expected_month_counts(&posts));
}

#[tokio::test]
async fn alter_table_adds_queryable_column() {
    let test_store = TestStore::in_memory().await;
    let session = test_store.session();

    session
        .schema()
        .unwrap()
        .alter_table("BlogPostByAuthor", |t| {
            t.add_column("Rating", ColumnType::Integer).default_value(0);
        })
        .unwrap();

    let count = session
        .query_index::<BlogPostByAuthor>()
        .filter(col("Rating").eq(0))
        .count()
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn sql_indexes_can_be_created_and_dropped() {
    let test_store = TestStore::in_memory().await;
    let session = test_store.session();

    session
        .schema()
        .unwrap()
        .create_index("BlogPostByAuthor", "IDX_BlogPostByAuthor_Author", &["Author", "Title"])
        .unwrap()
        .drop_index("IDX_BlogPostByAuthor_Author")
        .unwrap();

    let err = session
        .schema()
        .unwrap()
        .create_index("BlogPostByAuthor", "IDX_Empty", &[])
        .unwrap_err();
    assert!(matches!(err, QuireError::InvalidInput { .. }));
}

#[tokio::test]
async fn invalid_identifiers_are_rejected() {
    let test_store = TestStore::in_memory().await;
    let session = test_store.session();

    let err = session
        .schema()
        .unwrap()
        .create_table("Bad; DROP TABLE Document", |t| {
            t.column("X", ColumnType::Text);
        })
        .unwrap_err();
    assert!(matches!(err, QuireError::InvalidInput { .. }), "got {:?}", err);
}

#[tokio::test]
async fn plain_tables_with_column_options() {
    let test_store = TestStore::in_memory().await;
    let session = test_store.session();

    session
        .schema()
        .unwrap()
        .create_table("Settings", |t| {
            t.column("Name", ColumnType::Text).not_null().unique();
            t.column("Enabled", ColumnType::Boolean).default_value(true);
            t.column("Weight", ColumnType::Real);
        })
        .unwrap()
        .drop_table("Settings")
        .unwrap();
}
