//! Index maintenance
//!
//! Runs once per commit: [`plan`] diffs the old and new snapshot of every
//! changed document against the registered descriptors, [`apply`] writes the
//! resulting map replacements and aggregate changes inside the commit
//! transaction.

pub mod apply;
pub mod diff;

pub use apply::{apply, MaintenanceStats};
pub use diff::{plan, DocumentChange, GroupDelta, MaintenancePlan, MapUpdate, ReduceUpdate};
