//! Sessions
//!
//! A session is one unit of work. Saves and deletes are buffered in its
//! [`UnitOfWork`]; `commit` writes them and maintains every affected index
//! inside a single `BEGIN IMMEDIATE` transaction. Dropping a session that was
//! never committed discards its pending work.
//!
//! Reads through `get` / `find` see the session's own pending changes.
//! Queries run against committed state.

use quire_concurrency::{
    retry_on_contention, ChangeOp, PendingChange, PendingOperations, SessionStatus, UnitOfWork,
};
use quire_core::{Document, DocumentId, Index, QuireError, QuireResult, SessionId};
use quire_storage::{
    map_sql_error, DocumentTable, SchemaBuilder, SharedConnection, StoredDocument,
    DOCUMENT_DIMENSION,
};
use rusqlite::{Connection, TransactionBehavior};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::maintenance::{self, DocumentChange, MaintenanceStats};
use crate::query::{DocumentQuery, IndexQuery, Predicate};
use crate::store::StoreInner;

/// Outcome of a successful commit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitSummary {
    /// Documents inserted
    pub inserted: usize,
    /// Documents updated
    pub updated: usize,
    /// Documents deleted
    pub deleted: usize,
    /// Index writes performed
    pub index: MaintenanceStats,
    /// Time from session start to commit
    pub elapsed: Duration,
}

impl CommitSummary {
    /// Documents written in total
    pub fn documents(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}

#[derive(Debug, Clone)]
struct StagedChange {
    id: DocumentId,
    change: PendingChange,
    read_version: Option<u64>,
}

/// One unit of work against a [`Store`](crate::Store)
pub struct Session {
    pub(crate) store: Arc<StoreInner>,
    conn: SharedConnection,
    pub(crate) uow: UnitOfWork,
}

fn decode<D: Document>(id: DocumentId, content: &JsonValue) -> QuireResult<D> {
    let mut document: D = serde::Deserialize::deserialize(content).map_err(|e| {
        QuireError::serialization(format!("document {} as {}: {}", id, D::TYPE_NAME, e))
    })?;
    document.set_id(id);
    Ok(document)
}

/// Decode a stored row as `D`
pub(crate) fn decode_stored<D: Document>(stored: &StoredDocument) -> QuireResult<D> {
    decode(stored.id, &stored.content)
}

impl Session {
    pub(crate) fn new(store: Arc<StoreInner>, conn: SharedConnection) -> Self {
        let uow = UnitOfWork::new(SessionId::new());
        store.coordinator.record_open();
        debug!(target: "quire::session", session_id = %uow.id(), "Session opened");
        Self { store, conn, uow }
    }

    /// Session identifier, for log correlation
    pub fn id(&self) -> SessionId {
        self.uow.id()
    }

    /// Current lifecycle status
    pub fn status(&self) -> &SessionStatus {
        self.uow.status()
    }

    /// Whether the session accepts operations
    pub fn is_open(&self) -> bool {
        self.uow.is_open()
    }

    /// Counts of buffered inserts, updates and deletes
    pub fn pending_operations(&self) -> PendingOperations {
        self.uow.pending_operations()
    }

    /// Stage `document` for insert or update
    ///
    /// A document without an id gets the next identifier of the store, which
    /// is written back through [`Document::set_id`]. The content is captured
    /// now; later changes to `document` need another `save`.
    ///
    /// Only suspends when the store's identifier block is used up and a new
    /// one has to be reserved in the database.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrencyConflict` if the reservation still meets lock
    /// contention once the retry budget is spent.
    pub async fn save<D: Document>(&mut self, document: &mut D) -> QuireResult<DocumentId> {
        self.uow.ensure_open()?;
        let id = match document.id() {
            Some(id) => id,
            None => {
                let id = self.next_document_id().await?;
                document.set_id(id);
                self.uow.record_created(id)?;
                id
            }
        };
        let content = serde_json::to_value(&*document).map_err(|e| {
            QuireError::serialization(format!("document {} as {}: {}", id, D::TYPE_NAME, e))
        })?;
        self.uow.stage_save(id, D::TYPE_NAME, content)?;
        Ok(id)
    }

    /// Stage the deletion of document `id` of type `D`
    pub fn delete<D: Document>(&mut self, id: DocumentId) -> QuireResult<()> {
        self.uow.stage_delete(id, D::TYPE_NAME)
    }

    /// Load document `id` as `D`, or `None` if absent or of another type
    pub async fn find<D: Document>(&mut self, id: DocumentId) -> QuireResult<Option<D>> {
        self.uow.ensure_open()?;
        if let Some(change) = self.uow.pending(id) {
            if change.type_name != D::TYPE_NAME {
                return Ok(None);
            }
            return match change.content() {
                Some(content) => decode(id, content).map(Some),
                None => Ok(None),
            };
        }
        if self.uow.is_created(id) {
            // Created and deleted in this session
            return Ok(None);
        }

        let stored = self
            .run_blocking(move |conn, store| {
                DocumentTable::new(conn, store.sql.names(), store.serializer)?.load(id)
            })
            .await?;
        match stored {
            Some(stored) if stored.type_name == D::TYPE_NAME => {
                self.uow.record_read(id, stored.version);
                decode_stored(&stored).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Load document `id` as `D`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no document of type `D` has this id.
    pub async fn get<D: Document>(&mut self, id: DocumentId) -> QuireResult<D> {
        self.find(id).await?.ok_or_else(|| {
            QuireError::not_found(format!("{} {}", D::TYPE_NAME, id))
        })
    }

    /// Query documents of type `D`
    pub fn query<D: Document>(&mut self) -> DocumentQuery<'_, D> {
        DocumentQuery::new(self)
    }

    /// Query documents of type `D` having an `I` entry matching `predicate`
    pub fn query_for<D: Document, I: Index>(&mut self, predicate: Predicate) -> DocumentQuery<'_, D> {
        DocumentQuery::new(self).with::<I>(predicate)
    }

    /// Query the rows of index `I`
    pub fn query_index<I: Index>(&self) -> IndexQuery<'_, I> {
        IndexQuery::new(self)
    }

    /// Schema builder running on this session's connection
    pub fn schema(&self) -> QuireResult<SchemaBuilder> {
        self.uow.ensure_open()?;
        Ok(SchemaBuilder::new(
            Arc::clone(&self.conn),
            self.store.sql.names().clone(),
            Arc::clone(self.store.sql.catalog()),
        ))
    }

    /// Write every pending change and maintain the affected indexes
    ///
    /// Runs under one immediate transaction, retried on lock contention as
    /// configured. On error nothing is written and the session is closed.
    ///
    /// # Errors
    ///
    /// - `NotFound` when updating or deleting a document that is not stored
    /// - `ConcurrencyConflict` when the retry budget is exhausted, or when
    ///   `check_concurrency` is on and a loaded document changed since
    /// - `Configuration` / `Consistency` from reduce index maintenance
    pub async fn commit(&mut self) -> QuireResult<CommitSummary> {
        self.uow.mark_committing()?;
        let ops = self.uow.pending_operations();
        let staged: Arc<Vec<StagedChange>> = Arc::new(
            self.uow
                .changes()
                .iter()
                .map(|(id, change)| StagedChange {
                    id: *id,
                    change: change.clone(),
                    read_version: self.uow.read_version(*id),
                })
                .collect(),
        );

        let result = if staged.is_empty() {
            Ok(MaintenanceStats::default())
        } else {
            let retry = self.store.config.retry.clone();
            retry_on_contention(&retry, |attempt| {
                let staged = Arc::clone(&staged);
                let conn = Arc::clone(&self.conn);
                let store = Arc::clone(&self.store);
                async move {
                    tokio::task::spawn_blocking(move || {
                        let mut conn = conn.lock();
                        run_commit(&mut conn, &store, &staged, attempt)
                    })
                    .await
                    .map_err(|e| QuireError::storage(format!("commit task failed: {}", e)))?
                }
            })
            .await
        };

        match result {
            Ok(index) => {
                let summary = CommitSummary {
                    inserted: ops.inserts,
                    updated: ops.updates,
                    deleted: ops.deletes,
                    index,
                    elapsed: self.uow.elapsed(),
                };
                self.uow.mark_committed()?;
                self.store
                    .coordinator
                    .record_commit(summary.documents() as u64);
                info!(
                    target: "quire::session",
                    session_id = %self.uow.id(),
                    inserted = summary.inserted,
                    updated = summary.updated,
                    deleted = summary.deleted,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "Session committed"
                );
                Ok(summary)
            }
            Err(e) => {
                warn!(
                    target: "quire::session",
                    session_id = %self.uow.id(),
                    error = %e,
                    code = e.error_code(),
                    "Commit failed, unit of work rolled back"
                );
                self.uow.mark_failed(e.to_string())?;
                self.store.coordinator.record_failure();
                Err(e)
            }
        }
    }

    /// Discard pending work and close the session
    pub fn rollback(&mut self) -> QuireResult<PendingOperations> {
        let discarded = self.uow.rollback()?;
        self.store.coordinator.record_rollback();
        debug!(
            target: "quire::session",
            session_id = %self.uow.id(),
            discarded = discarded.total(),
            "Session rolled back"
        );
        Ok(discarded)
    }

    async fn next_document_id(&self) -> QuireResult<DocumentId> {
        if let Some(id) = self.store.ids.try_next_id(DOCUMENT_DIMENSION) {
            return Ok(DocumentId::new(id));
        }
        let id = retry_on_contention(&self.store.config.retry, |_| {
            let store = Arc::clone(&self.store);
            async move {
                tokio::task::spawn_blocking(move || store.ids.next_id(DOCUMENT_DIMENSION))
                    .await
                    .map_err(|e| QuireError::storage(format!("id reservation task failed: {}", e)))?
            }
        })
        .await?;
        Ok(DocumentId::new(id))
    }

    /// Run `f` on this session's connection on a blocking thread
    pub(crate) async fn run_blocking<T, F>(&self, f: F) -> QuireResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &StoreInner) -> QuireResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn, &store)
        })
        .await
        .map_err(|e| QuireError::storage(format!("session task failed: {}", e)))?
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        match self.uow.status().clone() {
            SessionStatus::Open => {
                if let Err(e) = self.rollback() {
                    warn!(target: "quire::session", error = %e, "Rollback on drop failed");
                }
            }
            SessionStatus::Committing => {
                // commit future dropped mid-flight; its transaction may still finish
                warn!(
                    target: "quire::session",
                    session_id = %self.uow.id(),
                    "Commit abandoned before completion"
                );
                if self.uow.mark_failed("commit abandoned".to_string()).is_ok() {
                    self.store.coordinator.record_failure();
                }
            }
            _ => {}
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.uow.id())
            .field("status", self.uow.status())
            .field("pending", &self.uow.pending_operations())
            .finish()
    }
}

fn check_version(store: &StoreInner, staged: &StagedChange, stored: &StoredDocument) -> QuireResult<()> {
    if !store.config.check_concurrency {
        return Ok(());
    }
    match staged.read_version {
        Some(expected) if expected != stored.version => Err(QuireError::version_mismatch(
            format!("document {}", staged.id),
            expected,
            stored.version,
        )),
        _ => Ok(()),
    }
}

fn run_commit(
    conn: &mut Connection,
    store: &StoreInner,
    staged: &[StagedChange],
    attempt: usize,
) -> QuireResult<MaintenanceStats> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| map_sql_error("begin commit", e))?;
    if attempt > 0 {
        debug!(target: "quire::session", attempt, "Acquired write lock on retry");
    }

    let names = store.sql.names();
    let documents = DocumentTable::new(&tx, names, store.serializer)?;
    let mut changes = Vec::with_capacity(staged.len());

    for item in staged {
        let id = item.id;
        let type_name = item.change.type_name.as_str();
        let stored = documents.load(id)?;
        let old = match (&item.change.op, stored) {
            (ChangeOp::Save { content, is_new: true }, None) => {
                documents.insert(id, type_name, content)?;
                None
            }
            (ChangeOp::Save { is_new: true, .. }, Some(_)) => {
                return Err(QuireError::consistency(format!(
                    "newly assigned document id {} is already stored",
                    id
                )));
            }
            (ChangeOp::Save { content, is_new: false }, Some(stored))
                if stored.type_name == type_name =>
            {
                check_version(store, item, &stored)?;
                documents.update(id, content)?;
                Some(stored.content)
            }
            (ChangeOp::Delete, Some(stored)) if stored.type_name == type_name => {
                check_version(store, item, &stored)?;
                documents.delete(id)?;
                Some(stored.content)
            }
            _ => {
                return Err(QuireError::not_found(format!("{} {}", type_name, id)));
            }
        };
        changes.push(DocumentChange {
            id,
            type_name: type_name.to_string(),
            old,
            new: item.change.content().cloned(),
        });
    }

    let plan = maintenance::plan(&store.registry, &changes)?;
    let stats = maintenance::apply(&tx, store.sql.catalog(), names, &plan)?;
    tx.commit().map_err(|e| map_sql_error("commit", e))?;
    Ok(stats)
}
