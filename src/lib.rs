//! Quire - embedded document store with map and reduce indexes
//!
//! Documents are serialized into a single document table of an SQLite
//! database. Indexes are ordinary tables maintained on every commit:
//! map indexes hold rows derived from one document, reduce indexes hold
//! aggregates across all documents sharing a group key. Queries filter
//! documents by joining the index tables.
//!
//! # Quick Start
//!
//! ```ignore
//! use quire::{col, ColumnType, Store};
//!
//! let store = Store::builder()
//!     .in_memory()
//!     .register_indexes(BlogPostIndexProvider)?
//!     .open()?;
//! store.initialize().await?;
//!
//! let mut session = store.create_session()?;
//! session.schema()?.create_map_index_table("BlogPostByAuthor", |t| {
//!     t.column("Author", ColumnType::Text);
//! })?;
//!
//! let mut post = BlogPost::new("Bill", "Hello Quire");
//! session.save(&mut post).await?;
//! session.commit().await?;
//!
//! let mut session = store.create_session()?;
//! let posts = session
//!     .query_for::<BlogPost, BlogPostByAuthor>(col("Author").eq("Bill"))
//!     .list()
//!     .await?;
//! ```
//!
//! # Architecture
//!
//! - `quire-core`: identifiers, errors, column values, declaration traits
//! - `quire-storage`: SQLite connections, DDL, table access
//! - `quire-concurrency`: unit-of-work bookkeeping and commit retry
//! - `quire-engine`: store, sessions, index maintenance, queries

pub use quire_concurrency::{RetryConfig, SessionStatus};
pub use quire_core::{
    ColumnType, ColumnValue, ConflictReason, Document, DocumentId, Index, IndexKind, MapIndex,
    QuireError, QuireResult, ReduceIndex, SessionId,
};
pub use quire_engine::*;
pub use quire_storage::{
    ContentSerializer, SchemaBuilder, StorageLocation, TableBuilder, DATABASE_FILE,
};
