//! Document store engine for Quire
//!
//! This crate orchestrates the lower layers:
//! - Store / StoreBuilder: open, configure and initialize a store
//! - IndexRegistry: map and reduce index descriptors per document type
//! - Session: unit of work with buffered writes and atomic commit
//! - Maintenance: map replacement and incremental reduce on commit
//! - Query: predicate compilation to joins over index tables
//! - SessionCoordinator: lifecycle metrics
//!
//! The engine is the only component that knows about:
//! - Index semantics (storage only sees tables and rows)
//! - Transaction scoping of a commit
//! - Retrying on write-lock contention

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod maintenance;
pub mod query;
pub mod registry;
pub mod session;
pub mod store;

#[cfg(test)]
mod fixtures;

pub use config::{StoreConfig, CONFIG_FILE_NAME};
pub use coordinator::{SessionCoordinator, StoreMetrics};
pub use maintenance::MaintenanceStats;
pub use query::{col, DocumentQuery, IndexQuery, IndexRecord, Predicate};
pub use registry::{
    DescribeContext, IndexDescriptor, IndexProvider, IndexRegistry, ReduceDescriptor, Reduced,
};
pub use session::{CommitSummary, Session};
pub use store::{Store, StoreBuilder};
