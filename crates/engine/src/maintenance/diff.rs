//! Maintenance planning
//!
//! Turns the old and new snapshots of every document in a commit into the
//! index writes the commit needs. Nothing here touches storage.
//!
//! - Map indexes are replaced wholesale per document: the plan carries the
//!   deduplicated new entry set, and the old rows are deleted on apply.
//! - Reduce indexes are diffed: per document, entries present in the new
//!   mapping but not the old one are *added*, the reverse are *removed*
//!   (multiset difference). Deltas are accumulated per group key across all
//!   documents of the commit so each aggregate is read and written once.

use quire_core::{ColumnValue, DocumentId, IndexKind, QuireResult};
use rustc_hash::FxHashMap;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::registry::{IndexDescriptor, IndexRegistry};

/// Old and new snapshot of one document touched by a commit
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    /// Document id
    pub id: DocumentId,
    /// Document type tag
    pub type_name: String,
    /// Stored content before the commit, `None` for a new document
    pub old: Option<JsonValue>,
    /// Content after the commit, `None` for a delete
    pub new: Option<JsonValue>,
}

/// Replacement of one document's rows in one map index
#[derive(Debug, Clone)]
pub struct MapUpdate {
    /// Index name
    pub index: &'static str,
    /// Owning document
    pub document: DocumentId,
    /// Rows to insert after the old ones are removed
    pub rows: Vec<JsonValue>,
}

/// Net change of one reduce group
#[derive(Debug, Clone)]
pub struct GroupDelta {
    /// Group key as stored in the group column
    pub key: ColumnValue,
    /// Entries to merge into the aggregate
    pub added: Vec<JsonValue>,
    /// Entries to remove from the aggregate
    pub removed: Vec<JsonValue>,
    /// Documents that start contributing to the group
    pub joined: Vec<DocumentId>,
    /// Documents that stop contributing to the group
    pub left: Vec<DocumentId>,
}

impl GroupDelta {
    fn new(key: ColumnValue) -> Self {
        Self {
            key,
            added: Vec::new(),
            removed: Vec::new(),
            joined: Vec::new(),
            left: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.joined.is_empty()
            && self.left.is_empty()
    }
}

/// All group deltas of one reduce index
#[derive(Clone)]
pub struct ReduceUpdate {
    /// Descriptor that produced the deltas
    pub descriptor: Arc<dyn IndexDescriptor>,
    /// Deltas in group key order
    pub groups: Vec<GroupDelta>,
}

/// Index writes required by one commit
#[derive(Clone, Default)]
pub struct MaintenancePlan {
    /// Map index replacements, in document order
    pub map_updates: Vec<MapUpdate>,
    /// Reduce index deltas, one entry per index
    pub reduce_updates: Vec<ReduceUpdate>,
}

impl MaintenancePlan {
    /// Whether the commit touches no index
    pub fn is_empty(&self) -> bool {
        self.map_updates.is_empty() && self.reduce_updates.is_empty()
    }
}

/// Total order over group keys, used to apply groups deterministically
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum GroupKey {
    Null,
    Integer(i64),
    Real(u64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<&ColumnValue> for GroupKey {
    fn from(value: &ColumnValue) -> Self {
        match value {
            ColumnValue::Null => GroupKey::Null,
            ColumnValue::Integer(i) => GroupKey::Integer(*i),
            ColumnValue::Real(f) => GroupKey::Real(f.to_bits()),
            ColumnValue::Text(s) => GroupKey::Text(s.clone()),
            ColumnValue::Blob(b) => GroupKey::Blob(b.clone()),
        }
    }
}

fn canonical(entry: &JsonValue) -> String {
    entry.to_string()
}

/// Entries of `left` not matched by an equal entry of `right`, counting
/// multiplicity
fn multiset_difference(left: &[JsonValue], right: &[JsonValue]) -> Vec<JsonValue> {
    let mut budget: FxHashMap<String, usize> = FxHashMap::default();
    for entry in right {
        *budget.entry(canonical(entry)).or_default() += 1;
    }
    left.iter()
        .filter(|entry| match budget.get_mut(&canonical(entry)) {
            Some(n) if *n > 0 => {
                *n -= 1;
                false
            }
            _ => true,
        })
        .cloned()
        .collect()
}

fn dedup(entries: Vec<JsonValue>) -> Vec<JsonValue> {
    let mut seen = BTreeSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(canonical(entry)))
        .collect()
}

fn map_snapshot(
    descriptor: &dyn IndexDescriptor,
    snapshot: Option<&JsonValue>,
) -> QuireResult<Vec<JsonValue>> {
    match snapshot {
        Some(content) => descriptor.map_document(content),
        None => Ok(Vec::new()),
    }
}

#[derive(Default)]
struct ReduceAccumulator {
    groups: BTreeMap<GroupKey, GroupDelta>,
}

impl ReduceAccumulator {
    fn group(&mut self, key: ColumnValue) -> &mut GroupDelta {
        self.groups
            .entry(GroupKey::from(&key))
            .or_insert_with(|| GroupDelta::new(key))
    }

    fn keys_of(
        descriptor: &dyn IndexDescriptor,
        entries: &[JsonValue],
    ) -> QuireResult<BTreeMap<GroupKey, ColumnValue>> {
        let mut keys = BTreeMap::new();
        for entry in entries {
            let key = descriptor.group_key(entry)?;
            keys.insert(GroupKey::from(&key), key);
        }
        Ok(keys)
    }

    fn add_document(
        &mut self,
        descriptor: &dyn IndexDescriptor,
        change: &DocumentChange,
    ) -> QuireResult<()> {
        let old = map_snapshot(descriptor, change.old.as_ref())?;
        let new = map_snapshot(descriptor, change.new.as_ref())?;

        for entry in multiset_difference(&new, &old) {
            let key = descriptor.group_key(&entry)?;
            self.group(key).added.push(entry);
        }
        for entry in multiset_difference(&old, &new) {
            let key = descriptor.group_key(&entry)?;
            self.group(key).removed.push(entry);
        }

        let old_keys = Self::keys_of(descriptor, &old)?;
        let new_keys = Self::keys_of(descriptor, &new)?;
        for (k, key) in &new_keys {
            if !old_keys.contains_key(k) {
                self.group(key.clone()).joined.push(change.id);
            }
        }
        for (k, key) in &old_keys {
            if !new_keys.contains_key(k) {
                self.group(key.clone()).left.push(change.id);
            }
        }
        Ok(())
    }
}

/// Compute the index writes for `changes`
///
/// Changes must be in a stable order (the session passes them by id); map
/// updates follow that order and reduce groups are sorted by key.
pub fn plan(registry: &IndexRegistry, changes: &[DocumentChange]) -> QuireResult<MaintenancePlan> {
    let mut plan = MaintenancePlan::default();
    let mut reduce: Vec<(Arc<dyn IndexDescriptor>, ReduceAccumulator)> = Vec::new();

    for change in changes {
        for descriptor in registry.descriptors_for(&change.type_name) {
            match descriptor.kind() {
                IndexKind::Map => {
                    let rows = map_snapshot(descriptor.as_ref(), change.new.as_ref())?;
                    plan.map_updates.push(MapUpdate {
                        index: descriptor.index_name(),
                        document: change.id,
                        rows: dedup(rows),
                    });
                }
                IndexKind::Reduce => {
                    let position = reduce
                        .iter()
                        .position(|(d, _)| d.index_name() == descriptor.index_name());
                    let slot = match position {
                        Some(i) => i,
                        None => {
                            reduce.push((Arc::clone(descriptor), ReduceAccumulator::default()));
                            reduce.len() - 1
                        }
                    };
                    reduce[slot].1.add_document(descriptor.as_ref(), change)?;
                }
            }
        }
    }

    plan.reduce_updates = reduce
        .into_iter()
        .map(|(descriptor, acc)| ReduceUpdate {
            descriptor,
            groups: acc
                .groups
                .into_values()
                .filter(|g| !g.is_empty())
                .collect(),
        })
        .filter(|update| !update.groups.is_empty())
        .collect();
    Ok(plan)
}
