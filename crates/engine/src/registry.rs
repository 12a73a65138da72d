//! Index provider registry
//!
//! Index declarations are typed at the edges and erased in the middle:
//! providers describe map and reduce descriptors over concrete document and
//! index types; the registry stores them behind [`IndexDescriptor`], which
//! speaks `serde_json::Value` so that the maintenance engine and the query
//! compiler can treat every index uniformly.
//!
//! ```ignore
//! struct BlogPostIndexProvider;
//!
//! impl IndexProvider for BlogPostIndexProvider {
//!     type Document = BlogPost;
//!
//!     fn describe(&self, context: &mut DescribeContext<BlogPost>) {
//!         context.map(|post: &BlogPost| {
//!             Some(BlogPostByAuthor { author: post.author.clone(), title: post.title.clone() })
//!         });
//!         context.reduce(
//!             ReduceDescriptor::map(|post: &BlogPost| {
//!                 Some(BlogPostByMonth { published_month: post.month(), count: 1 })
//!             })
//!             .group_by("PublishedMonth", |entry: &BlogPostByMonth| entry.published_month.clone())
//!             .reduce(|entries: &[BlogPostByMonth]| BlogPostByMonth {
//!                 published_month: entries[0].published_month.clone(),
//!                 count: entries.iter().map(|e| e.count).sum(),
//!             })
//!             .delete(|mut current, removed| {
//!                 current.count -= removed.iter().map(|e| e.count).sum::<i64>();
//!                 match current.count {
//!                     n if n > 0 => Ok(Reduced::Updated(current)),
//!                     0 => Ok(Reduced::Removed),
//!                     n => Err(QuireError::consistency(format!("negative count {}", n))),
//!                 }
//!             }),
//!         );
//!     }
//! }
//! ```

use quire_core::{ColumnValue, Document, IndexKind, MapIndex, QuireError, QuireResult, ReduceIndex};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

type MapFn<D, I> = Arc<dyn Fn(&D) -> Vec<I> + Send + Sync>;
type GroupFn<I> = Arc<dyn Fn(&I) -> ColumnValue + Send + Sync>;
type ReduceFn<I> = Arc<dyn Fn(&[I]) -> I + Send + Sync>;
type DeleteFn<I> = Arc<dyn Fn(I, &[I]) -> QuireResult<Reduced<I>> + Send + Sync>;

/// Outcome of removing entries from an aggregate
#[derive(Debug, Clone, PartialEq)]
pub enum Reduced<I> {
    /// The aggregate still has contributors; persist the new state
    Updated(I),
    /// The aggregate is exhausted; delete its row
    Removed,
}

impl<I> Reduced<I> {
    /// Apply `f` to an updated aggregate
    pub fn map<T>(self, f: impl FnOnce(I) -> T) -> Reduced<T> {
        match self {
            Reduced::Updated(value) => Reduced::Updated(f(value)),
            Reduced::Removed => Reduced::Removed,
        }
    }
}

/// Declares the indexes of one document type
pub trait IndexProvider: Send + Sync + 'static {
    /// Document type the indexes are computed from
    type Document: Document;

    /// Register descriptors on `context`
    fn describe(&self, context: &mut DescribeContext<Self::Document>);
}

/// Type-erased index descriptor
pub trait IndexDescriptor: Send + Sync {
    /// Index type name, also the table name
    fn index_name(&self) -> &'static str;

    /// Document type the descriptor maps from
    fn document_type(&self) -> &'static str;

    /// Map or reduce
    fn kind(&self) -> IndexKind;

    /// Run the map function over a serialized document
    fn map_document(&self, document: &JsonValue) -> QuireResult<Vec<JsonValue>>;

    /// Column holding the group key (reduce only)
    fn group_column(&self) -> Option<&str> {
        None
    }

    /// Group key of a serialized entry (reduce only)
    fn group_key(&self, _entry: &JsonValue) -> QuireResult<ColumnValue> {
        Err(self.not_a_reduce_index())
    }

    /// Merge entries sharing one group key into a single aggregate (reduce only)
    fn reduce_entries(&self, _entries: &[JsonValue]) -> QuireResult<JsonValue> {
        Err(self.not_a_reduce_index())
    }

    /// Whether removals can be applied
    fn has_delete(&self) -> bool {
        false
    }

    /// Remove entries from an aggregate (reduce only)
    fn delete_entries(
        &self,
        _current: JsonValue,
        _removed: &[JsonValue],
    ) -> QuireResult<Reduced<JsonValue>> {
        Err(self.not_a_reduce_index())
    }

    #[doc(hidden)]
    fn not_a_reduce_index(&self) -> QuireError {
        QuireError::configuration(format!("{} is not a reduce index", self.index_name()))
    }
}

impl fmt::Debug for dyn IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexDescriptor")
            .field("index", &self.index_name())
            .field("document", &self.document_type())
            .field("kind", &self.kind())
            .finish()
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: &JsonValue, what: &str) -> QuireResult<T> {
    serde::Deserialize::deserialize(value)
        .map_err(|e| QuireError::serialization(format!("{}: {}", what, e)))
}

fn decode_all<T: serde::de::DeserializeOwned>(values: &[JsonValue], what: &str) -> QuireResult<Vec<T>> {
    values.iter().map(|v| decode(v, what)).collect()
}

fn encode<T: serde::Serialize>(value: &T, what: &str) -> QuireResult<JsonValue> {
    serde_json::to_value(value).map_err(|e| QuireError::serialization(format!("{}: {}", what, e)))
}

struct MapDescriptor<D, I> {
    map: MapFn<D, I>,
}

impl<D: Document, I: MapIndex> IndexDescriptor for MapDescriptor<D, I> {
    fn index_name(&self) -> &'static str {
        I::NAME
    }

    fn document_type(&self) -> &'static str {
        D::TYPE_NAME
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Map
    }

    fn map_document(&self, document: &JsonValue) -> QuireResult<Vec<JsonValue>> {
        let document: D = decode(document, D::TYPE_NAME)?;
        (self.map)(&document)
            .iter()
            .map(|entry| encode(entry, I::NAME))
            .collect()
    }
}

/// Builder for a reduce index descriptor
///
/// `group_by` and `reduce` are required; `delete` is required as soon as a
/// contributing document is updated or deleted.
pub struct ReduceDescriptor<D, I> {
    map: MapFn<D, I>,
    group: Option<(String, GroupFn<I>)>,
    reduce: Option<ReduceFn<I>>,
    delete: Option<DeleteFn<I>>,
}

impl<D: Document, I: ReduceIndex> ReduceDescriptor<D, I> {
    /// Start a reduce descriptor from its map function
    pub fn map<F, R>(f: F) -> Self
    where
        F: Fn(&D) -> R + Send + Sync + 'static,
        R: IntoIterator<Item = I>,
    {
        Self {
            map: Arc::new(move |doc| f(doc).into_iter().collect()),
            group: None,
            reduce: None,
            delete: None,
        }
    }

    /// Group mapped entries by `key`, stored in `column`
    pub fn group_by<K, F>(mut self, column: &str, key: F) -> Self
    where
        F: Fn(&I) -> K + Send + Sync + 'static,
        K: Into<ColumnValue>,
    {
        self.group = Some((column.to_string(), Arc::new(move |entry| key(entry).into())));
        self
    }

    /// Merge entries sharing a group key
    ///
    /// The slice is never empty. When an aggregate already exists it is the
    /// first element, followed by the newly mapped entries.
    pub fn reduce<F>(mut self, f: F) -> Self
    where
        F: Fn(&[I]) -> I + Send + Sync + 'static,
    {
        self.reduce = Some(Arc::new(f));
        self
    }

    /// Remove entries from an existing aggregate
    pub fn delete<F>(mut self, f: F) -> Self
    where
        F: Fn(I, &[I]) -> QuireResult<Reduced<I>> + Send + Sync + 'static,
    {
        self.delete = Some(Arc::new(f));
        self
    }

    fn build(self) -> QuireResult<ErasedReduce<D, I>> {
        let (group_column, group) = self.group.ok_or_else(|| {
            QuireError::configuration(format!("reduce index {} has no group_by", I::NAME))
        })?;
        let reduce = self.reduce.ok_or_else(|| {
            QuireError::configuration(format!("reduce index {} has no reduce function", I::NAME))
        })?;
        Ok(ErasedReduce {
            map: self.map,
            group_column,
            group,
            reduce,
            delete: self.delete,
            _doc: PhantomData,
        })
    }
}

struct ErasedReduce<D, I> {
    map: MapFn<D, I>,
    group_column: String,
    group: GroupFn<I>,
    reduce: ReduceFn<I>,
    delete: Option<DeleteFn<I>>,
    _doc: PhantomData<fn(&D)>,
}

impl<D: Document, I: ReduceIndex> IndexDescriptor for ErasedReduce<D, I> {
    fn index_name(&self) -> &'static str {
        I::NAME
    }

    fn document_type(&self) -> &'static str {
        D::TYPE_NAME
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Reduce
    }

    fn map_document(&self, document: &JsonValue) -> QuireResult<Vec<JsonValue>> {
        let document: D = decode(document, D::TYPE_NAME)?;
        (self.map)(&document)
            .iter()
            .map(|entry| encode(entry, I::NAME))
            .collect()
    }

    fn group_column(&self) -> Option<&str> {
        Some(&self.group_column)
    }

    fn group_key(&self, entry: &JsonValue) -> QuireResult<ColumnValue> {
        let entry: I = decode(entry, I::NAME)?;
        Ok((self.group)(&entry))
    }

    fn reduce_entries(&self, entries: &[JsonValue]) -> QuireResult<JsonValue> {
        if entries.is_empty() {
            return Err(QuireError::consistency(format!(
                "reduce of {} called without entries",
                I::NAME
            )));
        }
        let entries: Vec<I> = decode_all(entries, I::NAME)?;
        encode(&(self.reduce)(&entries), I::NAME)
    }

    fn has_delete(&self) -> bool {
        self.delete.is_some()
    }

    fn delete_entries(
        &self,
        current: JsonValue,
        removed: &[JsonValue],
    ) -> QuireResult<Reduced<JsonValue>> {
        let delete = self.delete.as_ref().ok_or_else(|| {
            QuireError::configuration(format!(
                "reduce index {} has no delete function but entries were removed",
                I::NAME
            ))
        })?;
        let current: I = decode(&current, I::NAME)?;
        let removed: Vec<I> = decode_all(removed, I::NAME)?;
        match delete(current, &removed)? {
            Reduced::Updated(value) => Ok(Reduced::Updated(encode(&value, I::NAME)?)),
            Reduced::Removed => Ok(Reduced::Removed),
        }
    }
}

/// Collects the descriptors declared by one provider
pub struct DescribeContext<D> {
    descriptors: Vec<Arc<dyn IndexDescriptor>>,
    errors: Vec<QuireError>,
    _doc: PhantomData<fn(&D)>,
}

impl<D: Document> DescribeContext<D> {
    fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            errors: Vec::new(),
            _doc: PhantomData,
        }
    }

    /// Declare a map index
    ///
    /// The function may return any iterable of entries: `Option` for zero or
    /// one, `Vec` for many.
    pub fn map<I, F, R>(&mut self, f: F) -> &mut Self
    where
        I: MapIndex,
        F: Fn(&D) -> R + Send + Sync + 'static,
        R: IntoIterator<Item = I>,
    {
        self.descriptors.push(Arc::new(MapDescriptor::<D, I> {
            map: Arc::new(move |doc| f(doc).into_iter().collect()),
        }));
        self
    }

    /// Declare a reduce index
    pub fn reduce<I: ReduceIndex>(&mut self, descriptor: ReduceDescriptor<D, I>) -> &mut Self {
        match descriptor.build() {
            Ok(erased) => self.descriptors.push(Arc::new(erased)),
            Err(e) => self.errors.push(e),
        }
        self
    }
}

/// Registered descriptors, keyed by document type and index name
///
/// Frozen once the store is opened and shared read-only by every session.
#[derive(Default)]
pub struct IndexRegistry {
    by_document: HashMap<&'static str, Vec<Arc<dyn IndexDescriptor>>>,
}

impl IndexRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every descriptor declared by `provider`
    ///
    /// A descriptor for a (document type, index name) pair that is already
    /// registered replaces the previous one.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if a reduce descriptor is incomplete,
    /// or if an index name is registered as both map and reduce.
    pub fn register<P: IndexProvider>(&mut self, provider: &P) -> QuireResult<()> {
        let mut context = DescribeContext::<P::Document>::new();
        provider.describe(&mut context);
        if let Some(error) = context.errors.into_iter().next() {
            return Err(error);
        }

        for descriptor in context.descriptors {
            if let Some(kind) = self.kind_of(descriptor.index_name()) {
                if kind != descriptor.kind() {
                    return Err(QuireError::configuration(format!(
                        "index {} is already registered as a {} index",
                        descriptor.index_name(),
                        kind
                    )));
                }
            }

            debug!(
                target: "quire::index",
                document = descriptor.document_type(),
                index = descriptor.index_name(),
                kind = %descriptor.kind(),
                "Registered index"
            );
            let slot = self.by_document.entry(descriptor.document_type()).or_default();
            match slot
                .iter_mut()
                .find(|d| d.index_name() == descriptor.index_name())
            {
                Some(existing) => *existing = descriptor,
                None => slot.push(descriptor),
            }
        }
        Ok(())
    }

    /// Descriptors applicable to documents of `document_type`
    pub fn descriptors_for(&self, document_type: &str) -> &[Arc<dyn IndexDescriptor>] {
        self.by_document
            .get(document_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Descriptor of `index` for `document_type`
    pub fn descriptor(&self, document_type: &str, index: &str) -> Option<&Arc<dyn IndexDescriptor>> {
        self.descriptors_for(document_type)
            .iter()
            .find(|d| d.index_name() == index)
    }

    /// Kind of `index` if any document type registers it
    pub fn kind_of(&self, index: &str) -> Option<IndexKind> {
        self.by_document
            .values()
            .flatten()
            .find(|d| d.index_name() == index)
            .map(|d| d.kind())
    }

    /// Number of registered descriptors
    pub fn len(&self) -> usize {
        self.by_document.values().map(Vec::len).sum()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.by_document.iter().map(|(doc, descriptors)| {
                let names: Vec<_> = descriptors.iter().map(|d| d.index_name()).collect();
                (doc, names)
            }))
            .finish()
    }
}
