//! SQL dialect helpers
//!
//! Every identifier that reaches a statement goes through [`quote_ident`],
//! which rejects anything outside `[A-Za-z_][A-Za-z0-9_]*` before wrapping
//! it in double quotes. Values are always bound as parameters.

use quire_core::{ColumnValue, QuireError, QuireResult};

/// Name of the implicit row identifier column of index tables
pub const ID_COLUMN: &str = "Id";

/// Name of the column referencing the owning document
pub const DOCUMENT_ID_COLUMN: &str = "DocumentId";

/// Whether `name` is a valid unquoted identifier
pub fn is_valid_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate and double-quote an identifier
pub fn quote_ident(name: &str) -> QuireResult<String> {
    if !is_valid_ident(name) {
        return Err(QuireError::invalid_input(format!(
            "invalid identifier: {:?}",
            name
        )));
    }
    Ok(format!("\"{}\"", name))
}

/// Render a value as an SQL literal, for `DEFAULT` clauses in DDL
pub fn sql_literal(value: &ColumnValue) -> String {
    match value {
        ColumnValue::Null => "NULL".to_string(),
        ColumnValue::Integer(i) => i.to_string(),
        ColumnValue::Real(f) => format!("{:?}", f),
        ColumnValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        ColumnValue::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
            format!("X'{}'", hex)
        }
    }
}

/// Physical table naming under a configured prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableNames {
    prefix: String,
}

impl TableNames {
    /// Create table naming for `prefix` (may be empty)
    pub fn new(prefix: impl Into<String>) -> QuireResult<Self> {
        let prefix = prefix.into();
        if !prefix.is_empty() && !is_valid_ident(&prefix) {
            return Err(QuireError::configuration(format!(
                "table prefix {:?} is not a valid identifier",
                prefix
            )));
        }
        Ok(Self { prefix })
    }

    /// Configured prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Physical name of a logical table
    pub fn table(&self, logical: &str) -> String {
        format!("{}{}", self.prefix, logical)
    }

    /// Physical name of the document table
    pub fn document(&self) -> String {
        self.table("Document")
    }

    /// Physical name of the identifier allocation table
    pub fn identifiers(&self) -> String {
        self.table("Identifiers")
    }

    /// Physical name of an index table
    pub fn index(&self, index: &str) -> String {
        self.table(index)
    }

    /// Physical name of a reduce index's document bridge table
    pub fn bridge(&self, index: &str) -> String {
        format!("{}{}_Document", self.prefix, index)
    }

    /// Column of the bridge table referencing the aggregate row
    pub fn bridge_column(&self, index: &str) -> String {
        format!("{}Id", index)
    }
}
