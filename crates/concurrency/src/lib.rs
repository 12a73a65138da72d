//! Unit-of-work bookkeeping for Quire sessions
//!
//! This crate implements:
//! - UnitOfWork: pending change set, created ids and read set of a session
//! - SessionStatus: lifecycle state machine
//! - RetryConfig: exponential backoff for commits hitting lock contention

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod retry;
pub mod unit_of_work;

pub use retry::{retry_on_contention, RetryConfig};
pub use unit_of_work::{ChangeOp, PendingChange, PendingOperations, SessionStatus, UnitOfWork};
