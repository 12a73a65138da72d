//! Fluent query builders
//!
//! ```ignore
//! let posts: Vec<BlogPost> = session
//!     .query::<BlogPost>()
//!     .with::<BlogPostByAuthor>(col("Author").eq("Bill"))
//!     .with::<BlogPostByMonth>(col("PublishedMonth").eq("201701"))
//!     .list()
//!     .await?;
//!
//! let months = session
//!     .query_index::<BlogPostByMonth>()
//!     .order_by_desc("PublishedMonth")
//!     .list()
//!     .await?;
//! ```

use quire_core::{Document, DocumentId, Index, QuireError, QuireResult};
use std::marker::PhantomData;

use super::compiler::{
    fetch_count, fetch_documents, fetch_index_rows, DocumentQuerySpec, IndexOrder,
    IndexQuerySpec, JoinClause, OrderTerm, QueryCompiler,
};
use super::predicate::Predicate;
use crate::session::{decode_stored, Session};

/// Query over documents of type `D`
///
/// Built from [`Session::query`]. Every `with` clause joins its own index
/// table, so clauses intersect.
pub struct DocumentQuery<'s, D> {
    session: &'s mut Session,
    spec: DocumentQuerySpec,
    _doc: PhantomData<fn() -> D>,
}

impl<'s, D: Document> DocumentQuery<'s, D> {
    pub(crate) fn new(session: &'s mut Session) -> Self {
        Self {
            session,
            spec: DocumentQuerySpec::new(D::TYPE_NAME),
            _doc: PhantomData,
        }
    }

    /// Keep documents with at least one `I` entry matching `predicate`
    pub fn with<I: Index>(mut self, predicate: Predicate) -> Self {
        self.spec.joins.push(JoinClause {
            index: I::NAME,
            predicate: Some(predicate),
        });
        self
    }

    /// Keep documents with at least one `I` entry
    pub fn with_index<I: Index>(mut self) -> Self {
        self.spec.joins.push(JoinClause {
            index: I::NAME,
            predicate: None,
        });
        self
    }

    fn order<I: Index>(mut self, column: &str, descending: bool) -> Self {
        let join = match self.spec.join_position(I::NAME) {
            Some(position) => position,
            None => {
                self.spec.joins.push(JoinClause {
                    index: I::NAME,
                    predicate: None,
                });
                self.spec.joins.len() - 1
            }
        };
        self.spec.order.push(OrderTerm {
            join,
            column: column.to_string(),
            descending,
        });
        self
    }

    /// Sort by a column of index `I`, ascending
    ///
    /// Joins `I` if no clause did, which restricts the result to documents
    /// having an `I` entry.
    pub fn order_by<I: Index>(self, column: &str) -> Self {
        self.order::<I>(column, false)
    }

    /// Sort by a column of index `I`, descending
    pub fn order_by_desc<I: Index>(self, column: &str) -> Self {
        self.order::<I>(column, true)
    }

    /// Skip the first `n` results
    pub fn skip(mut self, n: u64) -> Self {
        self.spec.paging.skip = Some(n);
        self
    }

    /// Return at most `n` results
    pub fn take(mut self, n: u64) -> Self {
        self.spec.paging.take = Some(n);
        self
    }

    /// Matching documents, ordered by the sort keys then by id
    pub async fn list(self) -> QuireResult<Vec<D>> {
        self.session.uow.ensure_open()?;
        let spec = self.spec;
        let rows = self
            .session
            .run_blocking(move |conn, store| {
                let compiler =
                    QueryCompiler::new(conn, store.sql.catalog(), store.sql.names(), &store.registry);
                let query = compiler.documents(&spec)?;
                fetch_documents(conn, &query)
            })
            .await?;

        let mut documents = Vec::with_capacity(rows.len());
        for stored in &rows {
            self.session.uow.record_read(stored.id, stored.version);
            documents.push(decode_stored::<D>(stored)?);
        }
        Ok(documents)
    }

    /// First matching document
    pub async fn first(self) -> QuireResult<Option<D>> {
        Ok(self.take(1).list().await?.into_iter().next())
    }

    /// Number of matching documents; paging is ignored
    pub async fn count(self) -> QuireResult<u64> {
        self.session.uow.ensure_open()?;
        let spec = self.spec;
        self.session
            .run_blocking(move |conn, store| {
                let compiler =
                    QueryCompiler::new(conn, store.sql.catalog(), store.sql.names(), &store.registry);
                let query = compiler.count_documents(&spec)?;
                fetch_count(conn, &query)
            })
            .await
    }
}

/// A row of index `I`
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord<I> {
    /// Row id in the index table
    pub id: i64,
    /// Source document, for map indexes
    pub document_id: Option<DocumentId>,
    /// Row content
    pub value: I,
}

/// Query over the rows of index `I`
pub struct IndexQuery<'s, I> {
    session: &'s Session,
    spec: IndexQuerySpec,
    _index: PhantomData<fn() -> I>,
}

impl<'s, I: Index> IndexQuery<'s, I> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self {
            session,
            spec: IndexQuerySpec::new(I::NAME),
            _index: PhantomData,
        }
    }

    /// Keep rows matching `predicate`; repeated calls are combined with AND
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.spec.predicate = Some(match self.spec.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Sort by `column`, ascending
    pub fn order_by(mut self, column: &str) -> Self {
        self.spec.order.push(IndexOrder {
            column: column.to_string(),
            descending: false,
        });
        self
    }

    /// Sort by `column`, descending
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.spec.order.push(IndexOrder {
            column: column.to_string(),
            descending: true,
        });
        self
    }

    /// Skip the first `n` rows
    pub fn skip(mut self, n: u64) -> Self {
        self.spec.paging.skip = Some(n);
        self
    }

    /// Return at most `n` rows
    pub fn take(mut self, n: u64) -> Self {
        self.spec.paging.take = Some(n);
        self
    }

    /// Matching rows, ordered by the sort keys then by row id
    pub async fn list(self) -> QuireResult<Vec<IndexRecord<I>>> {
        self.session.uow.ensure_open()?;
        let spec = self.spec;
        let rows = self
            .session
            .run_blocking(move |conn, store| {
                let compiler =
                    QueryCompiler::new(conn, store.sql.catalog(), store.sql.names(), &store.registry);
                let query = compiler.index_rows(&spec)?;
                fetch_index_rows(conn, &query)
            })
            .await?;

        rows.into_iter()
            .map(|row| {
                let value: I = serde::Deserialize::deserialize(&row.values).map_err(|e| {
                    QuireError::serialization(format!("{} row {}: {}", I::NAME, row.id, e))
                })?;
                Ok(IndexRecord {
                    id: row.id,
                    document_id: row.document_id,
                    value,
                })
            })
            .collect()
    }

    /// First matching row
    pub async fn first(self) -> QuireResult<Option<IndexRecord<I>>> {
        Ok(self.take(1).list().await?.into_iter().next())
    }

    /// Number of matching rows; paging is ignored
    pub async fn count(self) -> QuireResult<u64> {
        self.session.uow.ensure_open()?;
        let spec = self.spec;
        self.session
            .run_blocking(move |conn, store| {
                let compiler =
                    QueryCompiler::new(conn, store.sql.catalog(), store.sql.names(), &store.registry);
                let query = compiler.count_index_rows(&spec)?;
                fetch_count(conn, &query)
            })
            .await
    }
}
