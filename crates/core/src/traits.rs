//! Core trait definitions
//!
//! - `Document`: a typed record persisted in the document table
//! - `Index`: a typed row persisted in an index table
//! - `MapIndex` / `ReduceIndex`: marker traits selecting the index kind
//!
//! Column names are the serialized field names of the index type, so an
//! index declared with `#[serde(rename_all = "PascalCase")]` produces the
//! same physical schema as its struct field names in PascalCase.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::DocumentId;

/// A typed record stored in the document table
///
/// # Example
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct BlogPost {
///     id: Option<DocumentId>,
///     title: String,
/// }
///
/// impl Document for BlogPost {
///     const TYPE_NAME: &'static str = "BlogPost";
///     fn id(&self) -> Option<DocumentId> { self.id }
///     fn set_id(&mut self, id: DocumentId) { self.id = Some(id) }
/// }
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Type tag written to the `Type` column
    const TYPE_NAME: &'static str;

    /// Identifier assigned by the store, `None` before the first save
    fn id(&self) -> Option<DocumentId>;

    /// Called by the session when an identifier is assigned or loaded
    fn set_id(&mut self, id: DocumentId);
}

/// A typed row of an index table
pub trait Index: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Index type name, used verbatim as the table name
    const NAME: &'static str;
}

/// An index whose entries are replaced per document on every change
pub trait MapIndex: Index {}

/// An index whose entries are aggregates across documents
pub trait ReduceIndex: Index {}
