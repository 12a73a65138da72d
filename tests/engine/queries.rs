//! Document and index queries: joins, predicates, ordering and paging.

use crate::common::*;
use quire::Predicate;
use serde::{Deserialize, Serialize};

fn titles(posts: &[BlogPost]) -> Vec<&str> {
    posts.iter().map(|p| p.title.as_str()).collect()
}

async fn intersection_store() -> TestStore {
    let test_store = TestStore::in_memory().await;
    test_store
        .save_all(vec![
            BlogPost::new("A", "Bob", date(2017, 1, 3), &["Foo"]),
            BlogPost::new("B", "Bob", date(2017, 2, 3), &["Foo", "Bar"]),
            BlogPost::new("C", "Amy", date(2017, 1, 4), &["Bar"]),
        ])
        .await;
    test_store
}

#[tokio::test]
async fn query_all_documents_of_type() {
    let test_store = TestStore::in_memory().await;
    let saved = test_store.save_all(sample_posts(12)).await;

    let mut session = test_store.session();
    let posts = session.query::<BlogPost>().list().await.unwrap();
    assert_eq!(posts, saved);
    assert_eq!(session.query::<BlogPost>().count().await.unwrap(), 12);
}

#[tokio::test]
async fn query_by_map_index() {
    let test_store = intersection_store().await;
    let mut session = test_store.session();

    let posts = session
        .query_for::<BlogPost, BlogPostByAuthor>(col("Author").eq("Bob"))
        .list()
        .await
        .unwrap();
    assert_eq!(titles(&posts), vec!["A", "B"]);
}

#[tokio::test]
async fn author_and_month_intersection_returns_exactly_one() {
    let test_store = intersection_store().await;
    let mut session = test_store.session();

    let posts = session
        .query::<BlogPost>()
        .with::<BlogPostByAuthor>(col("Author").eq("Bob"))
        .with::<BlogPostByMonth>(col("PublishedMonth").eq("201701"))
        .list()
        .await
        .unwrap();
    assert_eq!(titles(&posts), vec!["A"]);
}

#[tokio::test]
async fn author_and_tag_intersection() {
    let test_store = intersection_store().await;
    let mut session = test_store.session();

    let posts = session
        .query::<BlogPost>()
        .with::<BlogPostByAuthor>(col("Author").eq("Bob"))
        .with::<BlogPostByTag>(col("Tag").eq("Bar"))
        .list()
        .await
        .unwrap();
    assert_eq!(titles(&posts), vec!["B"]);
}

#[tokio::test]
async fn one_to_many_index_does_not_duplicate_documents() {
    let test_store = intersection_store().await;
    let mut session = test_store.session();

    let query = || col("Tag").is_in(vec!["Foo", "Bar"]);
    let posts = session
        .query_for::<BlogPost, BlogPostByTag>(query())
        .list()
        .await
        .unwrap();
    assert_eq!(titles(&posts), vec!["A", "B", "C"]);

    let count = session
        .query_for::<BlogPost, BlogPostByTag>(query())
        .count()
        .await
        .unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn predicate_combinators() {
    let test_store = intersection_store().await;
    let mut session = test_store.session();

    let not_bob = session
        .query_for::<BlogPost, BlogPostByAuthor>(Predicate::not(col("Author").eq("Bob")))
        .list()
        .await
        .unwrap();
    assert_eq!(titles(&not_bob), vec!["C"]);

    let either = session
        .query_for::<BlogPost, BlogPostByAuthor>(
            col("Title").eq("A").or(col("Title").eq("C")),
        )
        .list()
        .await
        .unwrap();
    assert_eq!(titles(&either), vec!["A", "C"]);

    let prefixed = session
        .query_for::<BlogPost, BlogPostByAuthor>(col("Author").starts_with("Bo"))
        .count()
        .await
        .unwrap();
    assert_eq!(prefixed, 2);

    let suffixed = session
        .query_for::<BlogPost, BlogPostByAuthor>(col("Author").ends_with("my"))
        .count()
        .await
        .unwrap();
    assert_eq!(suffixed, 1);

    let range = session
        .query_for::<BlogPost, BlogPostByMonth>(
            col("PublishedMonth").ge("201701").and(col("PublishedMonth").lt("201702")),
        )
        .list()
        .await
        .unwrap();
    assert_eq!(titles(&range), vec!["A", "C"]);
}

#[tokio::test]
async fn pattern_operators_treat_wildcards_literally() {
    let test_store = TestStore::in_memory().await;
    test_store
        .save_all(vec![
            BlogPost::new("100% Rust", "Bob Jones", date(2017, 1, 1), &[]),
            BlogPost::new("1000 Ways", "Bob Jones", date(2017, 1, 2), &[]),
        ])
        .await;

    let mut session = test_store.session();
    let posts = session
        .query_for::<BlogPost, BlogPostByAuthor>(col("Title").contains("0%"))
        .list()
        .await
        .unwrap();
    assert_eq!(titles(&posts), vec!["100% Rust"]);
}

#[tokio::test]
async fn order_and_page_documents() {
    let test_store = TestStore::in_memory().await;
    test_store
        .save_all(vec![
            BlogPost::new("Delta", "Bob Jones", date(2017, 1, 1), &[]),
            BlogPost::new("Alpha", "Bob Jones", date(2017, 1, 2), &[]),
            BlogPost::new("Charlie", "Bob Jones", date(2017, 1, 3), &[]),
            BlogPost::new("Bravo", "Bob Jones", date(2017, 1, 4), &[]),
        ])
        .await;

    let mut session = test_store.session();
    let ascending = session
        .query::<BlogPost>()
        .order_by::<BlogPostByAuthor>("Title")
        .list()
        .await
        .unwrap();
    assert_eq!(titles(&ascending), vec!["Alpha", "Bravo", "Charlie", "Delta"]);

    let page = session
        .query::<BlogPost>()
        .order_by_desc::<BlogPostByAuthor>("Title")
        .skip(1)
        .take(2)
        .list()
        .await
        .unwrap();
    assert_eq!(titles(&page), vec!["Charlie", "Bravo"]);

    let first = session
        .query::<BlogPost>()
        .order_by::<BlogPostByAuthor>("Title")
        .first()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.title, "Alpha");

    let counted = session
        .query::<BlogPost>()
        .with_index::<BlogPostByAuthor>()
        .skip(3)
        .take(1)
        .count()
        .await
        .unwrap();
    assert_eq!(counted, 4);
}

#[tokio::test]
async fn empty_result_and_missing_first() {
    let test_store = intersection_store().await;
    let mut session = test_store.session();

    let none = session
        .query_for::<BlogPost, BlogPostByAuthor>(col("Author").eq("Nobody"))
        .first()
        .await
        .unwrap();
    assert!(none.is_none());

    let nothing = session
        .query_for::<BlogPost, BlogPostByTag>(col("Tag").is_in(Vec::<String>::new()))
        .list()
        .await
        .unwrap();
    assert!(nothing.is_empty());
}

#[tokio::test]
async fn index_query_returns_raw_rows() {
    let test_store = intersection_store().await;
    let session = test_store.session();

    let rows = session
        .query_index::<BlogPostByAuthor>()
        .filter(col("Author").eq("Bob"))
        .order_by("Title")
        .list()
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].value.title, "A");
    assert_eq!(rows[1].value.title, "B");
    assert!(rows.iter().all(|r| r.document_id.is_some()));

    let count = session
        .query_index::<BlogPostByTag>()
        .filter(col("Tag").eq("Foo"))
        .count()
        .await
        .unwrap();
    assert_eq!(count, 2);

    let newest = session
        .query_index::<BlogPostByMonth>()
        .order_by_desc("PublishedMonth")
        .first()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(newest.value.published_month, "201702");
    assert_eq!(newest.value.count, 1);
}

#[tokio::test]
async fn queries_see_committed_state_only() {
    let test_store = intersection_store().await;
    let mut session = test_store.session();
    let mut pending = BlogPost::new("Pending", "Bob", date(2017, 1, 9), &[]);
    session.save(&mut pending).await.unwrap();

    let posts = session
        .query_for::<BlogPost, BlogPostByAuthor>(col("Author").eq("Bob"))
        .list()
        .await
        .unwrap();
    assert_eq!(titles(&posts), vec!["A", "B"]);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BlogPostByWordCount {
    words: i64,
}

impl Index for BlogPostByWordCount {
    const NAME: &'static str = "BlogPostByWordCount";
}
impl MapIndex for BlogPostByWordCount {}

#[tokio::test]
async fn unregistered_index_is_query_error() {
    let test_store = intersection_store().await;
    let mut session = test_store.session();

    let err = session
        .query_for::<BlogPost, BlogPostByWordCount>(col("Words").gt(100))
        .list()
        .await
        .unwrap_err();
    assert!(matches!(err, QuireError::Query { .. }), "got {:?}", err);

    let err = session
        .query_index::<BlogPostByWordCount>()
        .list()
        .await
        .unwrap_err();
    assert!(matches!(err, QuireError::Query { .. }), "got {:?}", err);
}

#[tokio::test]
async fn unknown_column_is_query_error() {
    let test_store = intersection_store().await;
    let mut session = test_store.session();

    let err = session
        .query_for::<BlogPost, BlogPostByAuthor>(col("Publisher").eq("Acme"))
        .list()
        .await
        .unwrap_err();
    assert!(matches!(err, QuireError::Query { .. }), "got {:?}", err);
    assert!(err.to_string().contains("Publisher"));
}
