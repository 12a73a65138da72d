//! Row mapping between JSON objects and table columns
//!
//! Index records travel through the engine as JSON objects (their serde
//! form). On write each top-level field becomes one column value; on read
//! each value column is lifted back to JSON using its declared type.

use quire_core::{ColumnValue, QuireError, QuireResult};
use rusqlite::types::Value as SqlValue;
use rusqlite::Row;
use serde_json::{Map, Value as JsonValue};

use crate::catalog::TableSchema;
use crate::dialect::{DOCUMENT_ID_COLUMN, ID_COLUMN};

/// Convert a column value into the driver's value type
pub fn to_sql(value: &ColumnValue) -> SqlValue {
    match value {
        ColumnValue::Null => SqlValue::Null,
        ColumnValue::Integer(i) => SqlValue::Integer(*i),
        ColumnValue::Real(f) => SqlValue::Real(*f),
        ColumnValue::Text(s) => SqlValue::Text(s.clone()),
        ColumnValue::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

/// Convert a driver value into a column value
pub fn from_sql(value: SqlValue) -> ColumnValue {
    match value {
        SqlValue::Null => ColumnValue::Null,
        SqlValue::Integer(i) => ColumnValue::Integer(i),
        SqlValue::Real(f) => ColumnValue::Real(f),
        SqlValue::Text(s) => ColumnValue::Text(s),
        SqlValue::Blob(b) => ColumnValue::Blob(b),
    }
}

/// Flatten an index record into `(column, value)` pairs
///
/// Every field must name an existing value column of `schema`; `Id` and
/// `DocumentId` are maintained by the engine and may not be set by records.
pub fn object_to_columns(
    schema: &TableSchema,
    record: &JsonValue,
) -> QuireResult<Vec<(String, ColumnValue)>> {
    let object = record.as_object().ok_or_else(|| {
        QuireError::serialization(format!(
            "index record for {} is not a struct (got {})",
            schema.name, record
        ))
    })?;

    let mut columns = Vec::with_capacity(object.len());
    for (field, value) in object {
        if field == ID_COLUMN || field == DOCUMENT_ID_COLUMN {
            return Err(QuireError::schema(format!(
                "index {} declares reserved column {}",
                schema.name, field
            )));
        }
        if !schema.has_column(field) {
            return Err(QuireError::schema(format!(
                "table {} has no column {}",
                schema.name, field
            )));
        }
        columns.push((field.clone(), ColumnValue::from_json(value)));
    }
    Ok(columns)
}

/// Read the value columns of `schema` from `row`, starting at column `offset`
///
/// Columns are expected in the order of [`TableSchema::value_columns`].
pub fn row_to_object(schema: &TableSchema, row: &Row<'_>, offset: usize) -> QuireResult<JsonValue> {
    let mut object = Map::new();
    for (i, column) in schema.value_columns().enumerate() {
        let raw: SqlValue = row
            .get(offset + i)
            .map_err(|e| QuireError::storage_with_source("read index column", e))?;
        object.insert(column.name.clone(), from_sql(raw).into_json(column.ty));
    }
    Ok(JsonValue::Object(object))
}
