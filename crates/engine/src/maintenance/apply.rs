//! Maintenance application
//!
//! Executes a [`MaintenancePlan`] on the connection of an open commit
//! transaction. The caller owns the transaction: any error returned here
//! must abort it so that no partial index state survives.

use quire_core::{QuireError, QuireResult};
use quire_storage::{MapIndexTable, ReduceIndexTable, TableCatalog, TableNames};
use rusqlite::Connection;
use serde_json::Value as JsonValue;
use tracing::debug;

use super::diff::{GroupDelta, MaintenancePlan, ReduceUpdate};
use crate::registry::{IndexDescriptor, Reduced};

/// Counters describing one maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceStats {
    /// Map rows removed before replacement
    pub map_rows_deleted: usize,
    /// Map rows inserted
    pub map_rows_inserted: usize,
    /// Aggregates created
    pub aggregates_inserted: usize,
    /// Aggregates rewritten
    pub aggregates_updated: usize,
    /// Aggregates removed because they were exhausted
    pub aggregates_deleted: usize,
}

/// Apply `plan` on `conn`
///
/// Map replacements run first, then reduce groups in key order. Each
/// aggregate is read once and written once.
pub fn apply(
    conn: &Connection,
    catalog: &TableCatalog,
    names: &TableNames,
    plan: &MaintenancePlan,
) -> QuireResult<MaintenanceStats> {
    let mut stats = MaintenanceStats::default();

    for update in &plan.map_updates {
        let table = MapIndexTable::open(conn, catalog, names, update.index)?;
        stats.map_rows_deleted += table.delete_for_document(update.document)?;
        for row in &update.rows {
            table.insert(update.document, row)?;
            stats.map_rows_inserted += 1;
        }
    }

    for update in &plan.reduce_updates {
        apply_reduce(conn, catalog, names, update, &mut stats)?;
    }

    debug!(
        target: "quire::index",
        map_deleted = stats.map_rows_deleted,
        map_inserted = stats.map_rows_inserted,
        aggregates_inserted = stats.aggregates_inserted,
        aggregates_updated = stats.aggregates_updated,
        aggregates_deleted = stats.aggregates_deleted,
        "Applied index maintenance"
    );
    Ok(stats)
}

fn apply_reduce(
    conn: &Connection,
    catalog: &TableCatalog,
    names: &TableNames,
    update: &ReduceUpdate,
    stats: &mut MaintenanceStats,
) -> QuireResult<()> {
    let descriptor = update.descriptor.as_ref();
    let index = descriptor.index_name();
    let column = descriptor.group_column().ok_or_else(|| {
        QuireError::configuration(format!("reduce index {} has no group column", index))
    })?;
    let table = ReduceIndexTable::open(conn, catalog, names, index)?;

    for group in &update.groups {
        let existing = table.find_by_group(column, &group.key)?;
        let outcome = reduce_group(
            descriptor,
            existing.as_ref().map(|row| row.values.clone()),
            group,
        )?;

        match (outcome, existing) {
            (Reduced::Updated(value), Some(row)) => {
                table.update(row.id, &value)?;
                stats.aggregates_updated += 1;
                relink(&table, row.id, group)?;
            }
            (Reduced::Updated(value), None) => {
                let id = table.insert(&value)?;
                stats.aggregates_inserted += 1;
                relink(&table, id, group)?;
            }
            (Reduced::Removed, Some(row)) => {
                table.delete(row.id)?;
                stats.aggregates_deleted += 1;
            }
            (Reduced::Removed, None) => {}
        }
    }
    Ok(())
}

/// Fold a group delta into the current aggregate
///
/// Additions are merged first and removals applied to the merged state,
/// so both see the same pre-commit aggregate.
fn reduce_group(
    descriptor: &dyn IndexDescriptor,
    existing: Option<JsonValue>,
    group: &GroupDelta,
) -> QuireResult<Reduced<JsonValue>> {
    let index = descriptor.index_name();
    if !group.removed.is_empty() {
        if existing.is_none() {
            return Err(QuireError::consistency(format!(
                "{} entries removed from {} group {} which has no aggregate",
                group.removed.len(),
                index,
                group.key
            )));
        }
        if !descriptor.has_delete() {
            return Err(QuireError::configuration(format!(
                "reduce index {} has no delete function but entries were removed from group {}",
                index, group.key
            )));
        }
    }

    let mut state = existing;
    if !group.added.is_empty() {
        let mut entries = Vec::with_capacity(group.added.len() + 1);
        entries.extend(state.take());
        entries.extend(group.added.iter().cloned());
        state = Some(descriptor.reduce_entries(&entries)?);
    }

    let outcome = match state {
        Some(current) if !group.removed.is_empty() => {
            descriptor.delete_entries(current, &group.removed)?
        }
        Some(current) => Reduced::Updated(current),
        None => Reduced::Removed,
    };

    if let Reduced::Updated(value) = &outcome {
        let key = descriptor.group_key(value)?;
        if key != group.key {
            return Err(QuireError::consistency(format!(
                "reduce of {} moved group {} to {}",
                index, group.key, key
            )));
        }
    }
    Ok(outcome)
}

fn relink(table: &ReduceIndexTable<'_>, id: i64, group: &GroupDelta) -> QuireResult<()> {
    for document in &group.joined {
        table.link(id, *document)?;
    }
    for document in &group.left {
        table.unlink(id, *document)?;
    }
    Ok(())
}
