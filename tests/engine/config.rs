//! Store configuration: `quire.toml` handling, table prefixes and the
//! MessagePack content encoding.

use crate::common::*;
use quire::{ContentSerializer, RetryConfig, StorageLocation, CONFIG_FILE_NAME};

#[tokio::test]
async fn default_config_file_written_on_first_open() {
    let test_store = TestStore::on_disk().await;
    let dir = test_store.dir.as_ref().unwrap().path();

    let path = dir.join(CONFIG_FILE_NAME);
    assert!(path.exists());
    let written = StoreConfig::from_file(&path).unwrap();
    assert_eq!(written, StoreConfig::default());
    assert_eq!(test_store.store.config(), &StoreConfig::default());
    assert_eq!(
        test_store.store.location(),
        &StorageLocation::in_directory(dir)
    );
}

#[tokio::test]
async fn edited_config_file_is_read_on_reopen() {
    let test_store = TestStore::on_disk().await;
    let dir = test_store.dir.as_ref().unwrap().path();

    let edited = StoreConfig::default()
        .with_id_block_size(5)
        .with_check_concurrency(true)
        .with_retry(RetryConfig::new().with_max_retries(7));
    edited.write_to_file(&dir.join(CONFIG_FILE_NAME)).unwrap();

    let reopened = test_store.reopen();
    assert_eq!(reopened.config(), &edited);
}

#[tokio::test]
async fn documents_survive_reopen() {
    let test_store = TestStore::on_disk().await;
    let saved = test_store.save_all(sample_posts(10)).await;
    let dir = test_store.dir.as_ref().unwrap().path().to_path_buf();
    let TestStore { store, dir: temp } = test_store;
    drop(store);

    let reopened = open_in(&dir);
    reopened.initialize().await.unwrap();
    let mut session = reopened.create_session().unwrap();
    let posts = session.query::<BlogPost>().list().await.unwrap();
    assert_eq!(posts, saved);

    let mut extra = BlogPost::new("After reopen", "Bob Jones", date(2017, 1, 1), &[]);
    session.save(&mut extra).await.unwrap();
    session.commit().await.unwrap();
    assert!(saved.iter().all(|p| p.id < extra.id));
    drop(temp);
}

#[tokio::test]
async fn invalid_config_file_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "content_serializer = \"yaml\"\n",
    )
    .unwrap();

    let err = Store::builder().path(dir.path()).open().unwrap_err();
    assert!(matches!(err, QuireError::Configuration { .. }), "got {:?}", err);

    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "id_block_size = 0\n").unwrap();
    let err = Store::builder().path(dir.path()).open().unwrap_err();
    assert!(matches!(err, QuireError::Configuration { .. }), "got {:?}", err);
}

#[tokio::test]
async fn table_prefix_applies_to_every_table() {
    let config = StoreConfig::default().with_table_prefix("blog_");
    let test_store = TestStore::on_disk_with(config).await;
    let posts = test_store.save_all(sample_posts(8)).await;

    assert_eq!(test_store.month_counts().await, expected_month_counts(&posts));

    let mut session = test_store.session();
    let bob = session
        .query_for::<BlogPost, BlogPostByAuthor>(col("Author").eq("Bob Jones"))
        .count()
        .await
        .unwrap();
    assert_eq!(bob, 2);

    let mut schema = session.schema().unwrap();
    schema.drop_map_index_table("BlogPostByTag").unwrap();
    let err = schema.drop_map_index_table("BlogPostByTag").unwrap_err();
    assert!(matches!(err, QuireError::Schema { .. }));
}

#[tokio::test]
async fn invalid_table_prefix_is_configuration_error() {
    let err = Store::builder()
        .in_memory()
        .config(StoreConfig::default().with_table_prefix("blog-"))
        .open()
        .unwrap_err();
    assert!(matches!(err, QuireError::Configuration { .. }), "got {:?}", err);
}

#[tokio::test]
async fn msgpack_content_round_trips() {
    let config = StoreConfig::default().with_content_serializer(ContentSerializer::MessagePack);
    let test_store = TestStore::in_memory_with(config).await;
    let saved = test_store.save_all(sample_posts(9)).await;

    let mut session = test_store.session();
    let loaded: BlogPost = session.get(saved[4].id.unwrap()).await.unwrap();
    assert_eq!(loaded, saved[4]);

    let posts = session
        .query_for::<BlogPost, BlogPostByTag>(col("Tag").eq("Foo"))
        .list()
        .await
        .unwrap();
    let expected: Vec<BlogPost> = saved
        .iter()
        .filter(|p| p.tags.iter().any(|t| t == "Foo"))
        .cloned()
        .collect();
    assert_eq!(posts, expected);
    assert_eq!(test_store.month_counts().await, expected_month_counts(&saved));
}

#[tokio::test]
async fn small_id_blocks_still_issue_increasing_ids() {
    let config = StoreConfig::default().with_id_block_size(3);
    let test_store = TestStore::in_memory_with(config).await;

    let first = test_store.save_all(sample_posts(7)).await;
    let second = test_store.save_all(sample_posts(5)).await;
    let ids: Vec<i64> = first
        .iter()
        .chain(second.iter())
        .map(|p| p.id.unwrap().as_i64())
        .collect();
    let expected: Vec<i64> = (1..=12).collect();
    assert_eq!(ids, expected);
}
