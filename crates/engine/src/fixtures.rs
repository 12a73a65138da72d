//! Document and index types shared by the engine's unit tests

use quire_core::{
    ColumnType, Document, DocumentId, Index, MapIndex, QuireError, ReduceIndex,
};
use quire_storage::{SchemaBuilder, SharedConnection, TableCatalog, TableNames};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

use crate::registry::{DescribeContext, IndexProvider, ReduceDescriptor, Reduced};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Post {
    pub id: Option<DocumentId>,
    pub author: String,
    pub published_month: String,
    pub tags: Vec<String>,
}

impl Post {
    pub fn new(author: &str, month: &str, tags: &[&str]) -> Self {
        Self {
            id: None,
            author: author.into(),
            published_month: month.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl Document for Post {
    const TYPE_NAME: &'static str = "Post";

    fn id(&self) -> Option<DocumentId> {
        self.id
    }

    fn set_id(&mut self, id: DocumentId) {
        self.id = Some(id);
    }
}

pub fn post(author: &str, month: &str, tags: &[&str]) -> JsonValue {
    json!({
        "Id": null,
        "Author": author,
        "PublishedMonth": month,
        "Tags": tags,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PostByAuthor {
    pub author: String,
}

impl Index for PostByAuthor {
    const NAME: &'static str = "PostByAuthor";
}
impl MapIndex for PostByAuthor {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PostByTag {
    pub tag: String,
}

impl Index for PostByTag {
    const NAME: &'static str = "PostByTag";
}
impl MapIndex for PostByTag {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PostCountByMonth {
    pub published_month: String,
    pub count: i64,
}

impl Index for PostCountByMonth {
    const NAME: &'static str = "PostCountByMonth";
}
impl ReduceIndex for PostCountByMonth {}

pub struct PostIndexes;

impl IndexProvider for PostIndexes {
    type Document = Post;

    fn describe(&self, context: &mut DescribeContext<Post>) {
        context
            .map(|post: &Post| {
                Some(PostByAuthor {
                    author: post.author.clone(),
                })
            })
            .map(|post: &Post| {
                post.tags
                    .iter()
                    .map(|tag| PostByTag { tag: tag.clone() })
                    .collect::<Vec<_>>()
            })
            .reduce(
                ReduceDescriptor::map(|post: &Post| {
                    Some(PostCountByMonth {
                        published_month: post.published_month.clone(),
                        count: 1,
                    })
                })
                .group_by("PublishedMonth", |e: &PostCountByMonth| {
                    e.published_month.clone()
                })
                .reduce(|entries: &[PostCountByMonth]| PostCountByMonth {
                    published_month: entries[0].published_month.clone(),
                    count: entries.iter().map(|e| e.count).sum(),
                })
                .delete(|mut current, removed| {
                    current.count -= removed.iter().map(|e| e.count).sum::<i64>();
                    match current.count {
                        n if n > 0 => Ok(Reduced::Updated(current)),
                        0 => Ok(Reduced::Removed),
                        n => Err(QuireError::consistency(format!(
                            "negative count {} for {}",
                            n, current.published_month
                        ))),
                    }
                }),
            );
    }
}

/// Create the index tables used by `PostIndexes`
pub fn create_post_index_tables(schema: &mut SchemaBuilder) {
    schema
        .create_map_index_table("PostByAuthor", |t| {
            t.column("Author", ColumnType::Text);
        })
        .unwrap()
        .create_map_index_table("PostByTag", |t| {
            t.column("Tag", ColumnType::Text);
        })
        .unwrap()
        .create_reduce_index_table("PostCountByMonth", |t| {
            t.column("PublishedMonth", ColumnType::Text);
            t.column("Count", ColumnType::Integer);
        })
        .unwrap();
}

/// Create the document, identifier and index tables on a bare connection
pub fn create_post_schema(conn: SharedConnection, names: &TableNames, catalog: Arc<TableCatalog>) {
    let mut schema = SchemaBuilder::new(conn, names.clone(), catalog);
    schema
        .create_document_table()
        .unwrap()
        .create_identifiers_table()
        .unwrap();
    create_post_index_tables(&mut schema);
}
