//! Map index maintenance: rows always equal the mapping of the current
//! document content.

use crate::common::*;

async fn author_rows(test_store: &TestStore, id: DocumentId) -> Vec<BlogPostByAuthor> {
    let session = test_store.session();
    session
        .query_index::<BlogPostByAuthor>()
        .filter(col("DocumentId").eq(id))
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.value)
        .collect()
}

#[tokio::test]
async fn save_writes_one_row_per_mapped_entry() {
    let test_store = TestStore::in_memory().await;
    let post = BlogPost::new("Tagged", "Bob Jones", date(2017, 1, 9), &["Foo", "Bar", "Baz"]);
    let id = test_store.save_all(vec![post]).await[0].id.unwrap();

    assert_eq!(test_store.tags_of(id).await, vec!["Bar", "Baz", "Foo"]);
    assert_eq!(
        author_rows(&test_store, id).await,
        vec![BlogPostByAuthor {
            author: "Bob Jones".into(),
            title: "Tagged".into(),
        }]
    );
}

#[tokio::test]
async fn document_without_entries_has_no_rows() {
    let test_store = TestStore::in_memory().await;
    let post = BlogPost::new("Untagged", "Mary Peters", date(2017, 4, 1), &[]);
    let id = test_store.save_all(vec![post]).await[0].id.unwrap();

    assert!(test_store.tags_of(id).await.is_empty());
    assert_eq!(author_rows(&test_store, id).await.len(), 1);
}

#[tokio::test]
async fn duplicate_entries_are_stored_once() {
    let test_store = TestStore::in_memory().await;
    let post = BlogPost::new("Echo", "Bob Jones", date(2017, 1, 9), &["Foo", "Foo", "Bar"]);
    let id = test_store.save_all(vec![post]).await[0].id.unwrap();

    assert_eq!(test_store.tags_of(id).await, vec!["Bar", "Foo"]);
}

#[tokio::test]
async fn update_replaces_stale_rows() {
    let test_store = TestStore::in_memory().await;
    let mut post = test_store
        .save_all(vec![BlogPost::new("Tags", "Bob Jones", date(2017, 1, 9), &["Foo", "Bar"])])
        .await
        .remove(0);
    let id = post.id.unwrap();

    post.tags = vec!["Bar".into(), "Bat".into()];
    post.author = "Jim Smith".into();
    let mut session = test_store.session();
    session.save(&mut post).await.unwrap();
    session.commit().await.unwrap();

    assert_eq!(test_store.tags_of(id).await, vec!["Bar", "Bat"]);
    let authors = author_rows(&test_store, id).await;
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].author, "Jim Smith");
}

#[tokio::test]
async fn resave_with_unchanged_content_is_idempotent() {
    let test_store = TestStore::in_memory().await;
    let mut post = test_store
        .save_all(vec![BlogPost::new("Same", "Bob Jones", date(2017, 1, 9), &["Foo", "Bar"])])
        .await
        .remove(0);
    let id = post.id.unwrap();

    for _ in 0..3 {
        let mut session = test_store.session();
        session.save(&mut post).await.unwrap();
        session.commit().await.unwrap();
    }

    assert_eq!(test_store.tags_of(id).await, vec!["Bar", "Foo"]);
    assert_eq!(author_rows(&test_store, id).await.len(), 1);
    assert_eq!(test_store.month_counts().await.get("201701"), Some(&1));
}

#[tokio::test]
async fn delete_removes_all_rows_of_document() {
    let test_store = TestStore::in_memory().await;
    let saved = test_store
        .save_all(vec![
            BlogPost::new("A", "Bob Jones", date(2017, 1, 9), &["Foo", "Bar"]),
            BlogPost::new("B", "Bob Jones", date(2017, 1, 10), &["Foo"]),
        ])
        .await;
    let a = saved[0].id.unwrap();
    let b = saved[1].id.unwrap();

    let mut session = test_store.session();
    session.delete::<BlogPost>(a).unwrap();
    session.commit().await.unwrap();

    assert!(test_store.tags_of(a).await.is_empty());
    assert!(author_rows(&test_store, a).await.is_empty());
    assert_eq!(test_store.tags_of(b).await, vec!["Foo"]);
}

#[tokio::test]
async fn commit_summary_counts_map_writes() {
    let test_store = TestStore::in_memory().await;
    let mut session = test_store.session();
    let mut post = BlogPost::new("Count", "Bob Jones", date(2017, 1, 9), &["Foo", "Bar"]);
    session.save(&mut post).await.unwrap();
    let summary = session.commit().await.unwrap();

    // one author row plus two tag rows
    assert_eq!(summary.index.map_rows_inserted, 3);
    assert_eq!(summary.index.aggregates_inserted, 1);
}
