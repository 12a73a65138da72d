//! Core types and traits for Quire
//!
//! This crate defines the foundational types used throughout the system:
//! - DocumentId: Store-assigned document identifier
//! - SessionId: Unit-of-work identifier used for log correlation
//! - IndexKind: Map vs reduce index discriminator
//! - ColumnType / ColumnValue: Scalars exchanged with the relational substrate
//! - Error: Error type hierarchy
//! - Traits: Document and Index declarations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;
pub mod value;

pub use error::{ConflictReason, QuireError, QuireResult};
pub use traits::{Document, Index, MapIndex, ReduceIndex};
pub use types::{DocumentId, IndexKind, SessionId};
pub use value::{ColumnType, ColumnValue};
