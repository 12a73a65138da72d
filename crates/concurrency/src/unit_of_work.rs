//! Unit of work for a session
//!
//! Tracks everything a session buffers before commit:
//! - the pending change set, one entry per document id
//! - ids assigned within the session (new documents)
//! - the read set: the stored version of each document the session loaded
//!
//! Nothing here touches storage. The engine drains the change set in a
//! single maintenance pass at commit time.

use quire_core::{DocumentId, QuireError, QuireResult, SessionId};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

/// Status of a session in its lifecycle
///
/// State transitions:
/// - `Open` → `Committing` → `Committed`
/// - `Open` → `Committing` → `Failed` (commit error, nothing written)
/// - `Open` → `RollingBack` → `RolledBack`
///
/// Terminal states: `Committed`, `RolledBack`, `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Accepting saves, deletes and queries
    Open,
    /// Commit in progress
    Committing,
    /// Discarding pending work
    RollingBack,
    /// Commit succeeded
    Committed,
    /// Pending work was discarded
    RolledBack,
    /// Commit failed and was rolled back
    Failed {
        /// Error that ended the commit
        reason: String,
    },
}

impl SessionStatus {
    /// Whether the session reached a terminal state
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            SessionStatus::Committed | SessionStatus::RolledBack | SessionStatus::Failed { .. }
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Open => f.write_str("open"),
            SessionStatus::Committing => f.write_str("committing"),
            SessionStatus::RollingBack => f.write_str("rolling back"),
            SessionStatus::Committed => f.write_str("committed"),
            SessionStatus::RolledBack => f.write_str("rolled back"),
            SessionStatus::Failed { reason } => write!(f, "failed ({})", reason),
        }
    }
}

/// Buffered operation on one document
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeOp {
    /// Insert or update with the given content
    Save {
        /// Serialized document
        content: JsonValue,
        /// Whether the id was assigned in this session
        is_new: bool,
    },
    /// Remove the stored document
    Delete,
}

/// A pending change with the type of the document it applies to
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange {
    /// Document type tag
    pub type_name: String,
    /// Operation to apply
    pub op: ChangeOp,
}

impl PendingChange {
    /// Whether this change removes the document
    pub fn is_delete(&self) -> bool {
        matches!(self.op, ChangeOp::Delete)
    }

    /// Content to be written, if any
    pub fn content(&self) -> Option<&JsonValue> {
        match &self.op {
            ChangeOp::Save { content, .. } => Some(content),
            ChangeOp::Delete => None,
        }
    }
}

/// Summary of pending operations that would be discarded on rollback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingOperations {
    /// Documents created in this session
    pub inserts: usize,
    /// Stored documents being updated
    pub updates: usize,
    /// Stored documents being deleted
    pub deletes: usize,
}

impl PendingOperations {
    /// Total number of pending operations
    pub fn total(&self) -> usize {
        self.inserts + self.updates + self.deletes
    }

    /// Check if there are no pending operations
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Buffered state of one session
#[derive(Debug)]
pub struct UnitOfWork {
    id: SessionId,
    status: SessionStatus,
    changes: BTreeMap<DocumentId, PendingChange>,
    created: HashSet<DocumentId>,
    read_set: HashMap<DocumentId, u64>,
    start_time: Instant,
}

impl UnitOfWork {
    /// Start an empty unit of work
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            status: SessionStatus::Open,
            changes: BTreeMap::new(),
            created: HashSet::new(),
            read_set: HashMap::new(),
            start_time: Instant::now(),
        }
    }

    /// Session identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current status
    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Whether operations are accepted
    pub fn is_open(&self) -> bool {
        matches!(self.status, SessionStatus::Open)
    }

    /// Time since the session started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Fail with `SessionClosed` unless the session is open
    pub fn ensure_open(&self) -> QuireResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(QuireError::session_closed(self.status.to_string()))
        }
    }

    /// Record that `id` was assigned to a new document in this session
    pub fn record_created(&mut self, id: DocumentId) -> QuireResult<()> {
        self.ensure_open()?;
        self.created.insert(id);
        Ok(())
    }

    /// Whether `id` was assigned in this session
    pub fn is_created(&self, id: DocumentId) -> bool {
        self.created.contains(&id)
    }

    /// Buffer a save; the latest content for an id wins
    pub fn stage_save(
        &mut self,
        id: DocumentId,
        type_name: &str,
        content: JsonValue,
    ) -> QuireResult<()> {
        self.ensure_open()?;
        let is_new = self.created.contains(&id);
        self.changes.insert(
            id,
            PendingChange {
                type_name: type_name.to_string(),
                op: ChangeOp::Save { content, is_new },
            },
        );
        Ok(())
    }

    /// Buffer a delete
    ///
    /// Deleting a document created in this session cancels its pending
    /// insert instead; nothing reaches storage for it.
    pub fn stage_delete(&mut self, id: DocumentId, type_name: &str) -> QuireResult<()> {
        self.ensure_open()?;
        if self.created.contains(&id) {
            self.changes.remove(&id);
            return Ok(());
        }
        self.changes.insert(
            id,
            PendingChange {
                type_name: type_name.to_string(),
                op: ChangeOp::Delete,
            },
        );
        Ok(())
    }

    /// Pending change for `id`, if any
    pub fn pending(&self, id: DocumentId) -> Option<&PendingChange> {
        self.changes.get(&id)
    }

    /// All pending changes in id order
    pub fn changes(&self) -> &BTreeMap<DocumentId, PendingChange> {
        &self.changes
    }

    /// Record the stored version of a loaded document
    ///
    /// The first observed version is kept; later reads in the same session
    /// do not move it.
    pub fn record_read(&mut self, id: DocumentId, version: u64) {
        self.read_set.entry(id).or_insert(version);
    }

    /// Version the session loaded for `id`
    pub fn read_version(&self, id: DocumentId) -> Option<u64> {
        self.read_set.get(&id).copied()
    }

    /// Number of tracked reads
    pub fn read_count(&self) -> usize {
        self.read_set.len()
    }

    /// Get summary of pending operations
    pub fn pending_operations(&self) -> PendingOperations {
        let mut ops = PendingOperations::default();
        for change in self.changes.values() {
            match &change.op {
                ChangeOp::Save { is_new: true, .. } => ops.inserts += 1,
                ChangeOp::Save { is_new: false, .. } => ops.updates += 1,
                ChangeOp::Delete => ops.deletes += 1,
            }
        }
        ops
    }

    /// Transition to `Committing`
    ///
    /// # State Transition
    /// `Open` → `Committing`
    pub fn mark_committing(&mut self) -> QuireResult<()> {
        self.ensure_open()?;
        self.status = SessionStatus::Committing;
        Ok(())
    }

    /// Transition to `Committed` and drop the buffered work
    ///
    /// # State Transition
    /// `Committing` → `Committed`
    pub fn mark_committed(&mut self) -> QuireResult<()> {
        match self.status {
            SessionStatus::Committing => {
                self.status = SessionStatus::Committed;
                self.clear();
                Ok(())
            }
            _ => Err(QuireError::session_closed(self.status.to_string())),
        }
    }

    /// Transition to `Failed` and drop the buffered work
    ///
    /// # State Transition
    /// `Committing` → `Failed`
    pub fn mark_failed(&mut self, reason: String) -> QuireResult<()> {
        match self.status {
            SessionStatus::Committing => {
                self.status = SessionStatus::Failed { reason };
                self.clear();
                Ok(())
            }
            _ => Err(QuireError::session_closed(self.status.to_string())),
        }
    }

    /// Discard pending work
    ///
    /// # State Transition
    /// `Open` → `RollingBack` → `RolledBack`
    pub fn rollback(&mut self) -> QuireResult<PendingOperations> {
        self.ensure_open()?;
        self.status = SessionStatus::RollingBack;
        let discarded = self.pending_operations();
        self.clear();
        self.status = SessionStatus::RolledBack;
        Ok(discarded)
    }

    fn clear(&mut self) {
        self.changes.clear();
        self.created.clear();
        self.read_set.clear();
    }
}
