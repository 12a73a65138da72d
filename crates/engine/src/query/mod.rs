//! Query compilation and execution
//!
//! - [`predicate`]: column predicates (`col("Author").eq("Bill")`)
//! - [`compiler`]: translation to SQL joins over index and document tables
//! - [`builder`]: fluent document and index queries bound to a session

pub mod builder;
pub mod compiler;
pub mod predicate;

pub use builder::{DocumentQuery, IndexQuery, IndexRecord};
pub use compiler::{CompiledQuery, DocumentQuerySpec, IndexQuerySpec, Paging, QueryCompiler};
pub use predicate::{col, ColumnRef, Filter, Operator, Predicate};
