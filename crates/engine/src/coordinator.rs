//! Session coordinator
//!
//! Tracks session lifecycle metrics for a store: sessions opened, committed,
//! rolled back and failed, plus the number currently open.
//!
//! # Memory Ordering
//!
//! All counters use Relaxed ordering. They are observational only and do
//! not synchronize any other memory.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle counters shared by every session of a store
#[derive(Debug, Default)]
pub struct SessionCoordinator {
    active_count: AtomicU64,
    total_opened: AtomicU64,
    total_committed: AtomicU64,
    total_rolled_back: AtomicU64,
    total_failed: AtomicU64,
    documents_written: AtomicU64,
}

impl SessionCoordinator {
    /// Create a coordinator with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session being opened
    pub fn record_open(&self) {
        self.active_count.fetch_add(1, Ordering::Relaxed);
        self.total_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful commit that wrote `documents` documents
    pub fn record_commit(&self, documents: u64) {
        self.close_one();
        self.total_committed.fetch_add(1, Ordering::Relaxed);
        self.documents_written.fetch_add(documents, Ordering::Relaxed);
    }

    /// Record an explicit or implicit rollback
    pub fn record_rollback(&self) {
        self.close_one();
        self.total_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed commit
    pub fn record_failure(&self) {
        self.close_one();
        self.total_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn close_one(&self) {
        // saturating decrement
        let _ = self
            .active_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |x| {
                Some(x.saturating_sub(1))
            });
    }

    /// Snapshot of the counters
    pub fn metrics(&self) -> StoreMetrics {
        let opened = self.total_opened.load(Ordering::Relaxed);
        let committed = self.total_committed.load(Ordering::Relaxed);
        StoreMetrics {
            active_sessions: self.active_count.load(Ordering::Relaxed),
            total_opened: opened,
            total_committed: committed,
            total_rolled_back: self.total_rolled_back.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            documents_written: self.documents_written.load(Ordering::Relaxed),
            commit_rate: if opened > 0 {
                committed as f64 / opened as f64
            } else {
                0.0
            },
        }
    }
}

/// Session metrics
#[derive(Debug, Clone, PartialEq)]
pub struct StoreMetrics {
    /// Sessions currently open
    pub active_sessions: u64,
    /// Sessions ever opened
    pub total_opened: u64,
    /// Sessions committed
    pub total_committed: u64,
    /// Sessions rolled back, explicitly or by drop
    pub total_rolled_back: u64,
    /// Sessions whose commit failed
    pub total_failed: u64,
    /// Documents inserted, updated or deleted by committed sessions
    pub documents_written: u64,
    /// Committed / opened
    pub commit_rate: f64,
}

impl StoreMetrics {
    /// Sessions that reached a terminal state
    pub fn total_closed(&self) -> u64 {
        self.total_committed + self.total_rolled_back + self.total_failed
    }
}
