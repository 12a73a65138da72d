//! Predicate AST over index columns
//!
//! ```ignore
//! use quire::query::col;
//!
//! let p = col("Author").eq("Bill").and(col("Title").starts_with("Intro"));
//! let q = Predicate::not(col("Tag").is_in(["draft", "private"]));
//! ```
//!
//! Text matching (`starts_with`, `ends_with`, `contains`) is case-sensitive
//! and does not use `LIKE`, so `%` and `_` in patterns match literally.

use quire_core::{ColumnValue, QuireError, QuireResult};
use quire_storage::{quote_ident, TableSchema};

/// Logical expression over column filters
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// All sub-expressions hold; empty is true
    And(Vec<Predicate>),
    /// Any sub-expression holds; empty is false
    Or(Vec<Predicate>),
    /// Negation
    Not(Box<Predicate>),
    /// Single filter
    Pred(Filter),
}

/// Single condition on one column
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Column name, exactly as declared by the index type
    pub column: String,
    /// Condition
    pub op: Operator,
}

/// Comparison and matching operators
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// `=`; `IS NULL` for a null operand
    Equals(ColumnValue),
    /// `<>`; `IS NOT NULL` for a null operand
    NotEquals(ColumnValue),
    /// `<`
    LessThan(ColumnValue),
    /// `<=`
    LessThanOrEquals(ColumnValue),
    /// `>`
    GreaterThan(ColumnValue),
    /// `>=`
    GreaterThanOrEquals(ColumnValue),
    /// Membership; an empty list matches nothing
    In(Vec<ColumnValue>),
    /// Text prefix
    StartsWith(String),
    /// Text suffix
    EndsWith(String),
    /// Text infix
    Contains(String),
    /// Column is NULL
    IsNull,
    /// Column is not NULL
    IsNotNull,
}

/// Start a filter on `column`
pub fn col(column: impl Into<String>) -> ColumnRef {
    ColumnRef(column.into())
}

/// Column handle returned by [`col`]
#[derive(Debug, Clone)]
pub struct ColumnRef(String);

impl ColumnRef {
    fn filter(self, op: Operator) -> Predicate {
        Predicate::Pred(Filter { column: self.0, op })
    }

    /// Column equals `value`
    pub fn eq(self, value: impl Into<ColumnValue>) -> Predicate {
        self.filter(Operator::Equals(value.into()))
    }

    /// Column differs from `value`
    pub fn ne(self, value: impl Into<ColumnValue>) -> Predicate {
        self.filter(Operator::NotEquals(value.into()))
    }

    /// Column is less than `value`
    pub fn lt(self, value: impl Into<ColumnValue>) -> Predicate {
        self.filter(Operator::LessThan(value.into()))
    }

    /// Column is at most `value`
    pub fn le(self, value: impl Into<ColumnValue>) -> Predicate {
        self.filter(Operator::LessThanOrEquals(value.into()))
    }

    /// Column is greater than `value`
    pub fn gt(self, value: impl Into<ColumnValue>) -> Predicate {
        self.filter(Operator::GreaterThan(value.into()))
    }

    /// Column is at least `value`
    pub fn ge(self, value: impl Into<ColumnValue>) -> Predicate {
        self.filter(Operator::GreaterThanOrEquals(value.into()))
    }

    /// Column equals one of `values`
    pub fn is_in<V, I>(self, values: I) -> Predicate
    where
        V: Into<ColumnValue>,
        I: IntoIterator<Item = V>,
    {
        self.filter(Operator::In(values.into_iter().map(Into::into).collect()))
    }

    /// Column starts with `prefix`
    pub fn starts_with(self, prefix: impl Into<String>) -> Predicate {
        self.filter(Operator::StartsWith(prefix.into()))
    }

    /// Column ends with `suffix`
    pub fn ends_with(self, suffix: impl Into<String>) -> Predicate {
        self.filter(Operator::EndsWith(suffix.into()))
    }

    /// Column contains `needle`
    pub fn contains(self, needle: impl Into<String>) -> Predicate {
        self.filter(Operator::Contains(needle.into()))
    }

    /// Column is NULL
    pub fn is_null(self) -> Predicate {
        self.filter(Operator::IsNull)
    }

    /// Column is not NULL
    pub fn is_not_null(self) -> Predicate {
        self.filter(Operator::IsNotNull)
    }
}

impl Predicate {
    /// Conjunction of all `predicates`
    pub fn all_of(predicates: Vec<Predicate>) -> Predicate {
        Predicate::And(predicates)
    }

    /// Disjunction of all `predicates`
    pub fn any_of(predicates: Vec<Predicate>) -> Predicate {
        Predicate::Or(predicates)
    }

    /// Wrap an expression in a logical NOT.
    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Predicate) -> Predicate {
        Predicate::Not(Box::new(predicate))
    }

    /// `self AND other`, flattening nested conjunctions
    pub fn and(self, other: Predicate) -> Predicate {
        match self {
            Predicate::And(mut items) => {
                items.push(other);
                Predicate::And(items)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    /// `self OR other`, flattening nested disjunctions
    pub fn or(self, other: Predicate) -> Predicate {
        match self {
            Predicate::Or(mut items) => {
                items.push(other);
                Predicate::Or(items)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    /// Every column referenced, in first-seen order
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::And(items) | Predicate::Or(items) => {
                items.iter().for_each(|p| p.collect_columns(out))
            }
            Predicate::Not(inner) => inner.collect_columns(out),
            Predicate::Pred(filter) => {
                if !out.contains(&filter.column.as_str()) {
                    out.push(&filter.column);
                }
            }
        }
    }

    /// Render as SQL over the table aliased `alias`
    ///
    /// Operands are appended to `params` in placeholder order; placeholders
    /// are anonymous `?`. Columns must exist in `schema`.
    pub fn to_sql(
        &self,
        alias: &str,
        schema: &TableSchema,
        params: &mut Vec<ColumnValue>,
    ) -> QuireResult<String> {
        match self {
            Predicate::And(items) => join(items, " AND ", "1", alias, schema, params),
            Predicate::Or(items) => join(items, " OR ", "0", alias, schema, params),
            Predicate::Not(inner) => Ok(format!("NOT ({})", inner.to_sql(alias, schema, params)?)),
            Predicate::Pred(filter) => filter.to_sql(alias, schema, params),
        }
    }
}

fn join(
    items: &[Predicate],
    separator: &str,
    empty: &str,
    alias: &str,
    schema: &TableSchema,
    params: &mut Vec<ColumnValue>,
) -> QuireResult<String> {
    if items.is_empty() {
        return Ok(empty.to_string());
    }
    let parts = items
        .iter()
        .map(|p| Ok(format!("({})", p.to_sql(alias, schema, params)?)))
        .collect::<QuireResult<Vec<_>>>()?;
    Ok(parts.join(separator))
}

impl Filter {
    fn to_sql(
        &self,
        alias: &str,
        schema: &TableSchema,
        params: &mut Vec<ColumnValue>,
    ) -> QuireResult<String> {
        if !schema.has_column(&self.column) {
            return Err(QuireError::query(format!(
                "{} has no column {}",
                schema.name, self.column
            )));
        }
        let c = format!("{}.{}", alias, quote_ident(&self.column)?);
        let mut bind = |value: &ColumnValue| {
            params.push(value.clone());
            "?"
        };

        let sql = match &self.op {
            Operator::Equals(v) if v.is_null() => format!("{} IS NULL", c),
            Operator::NotEquals(v) if v.is_null() => format!("{} IS NOT NULL", c),
            Operator::Equals(v) => format!("{} = {}", c, bind(v)),
            Operator::NotEquals(v) => format!("{} <> {}", c, bind(v)),
            Operator::LessThan(v) => format!("{} < {}", c, bind(v)),
            Operator::LessThanOrEquals(v) => format!("{} <= {}", c, bind(v)),
            Operator::GreaterThan(v) => format!("{} > {}", c, bind(v)),
            Operator::GreaterThanOrEquals(v) => format!("{} >= {}", c, bind(v)),
            Operator::In(values) if values.is_empty() => "0".to_string(),
            Operator::In(values) => {
                let list = values.iter().map(&mut bind).collect::<Vec<_>>().join(", ");
                format!("{} IN ({})", c, list)
            }
            Operator::StartsWith(p) | Operator::EndsWith(p) | Operator::Contains(p)
                if p.is_empty() =>
            {
                format!("{} IS NOT NULL", c)
            }
            Operator::StartsWith(p) => {
                let v = ColumnValue::Text(p.clone());
                format!("substr({}, 1, length({})) = {}", c, bind(&v), bind(&v))
            }
            Operator::EndsWith(p) => {
                let v = ColumnValue::Text(p.clone());
                format!("substr({}, -length({})) = {}", c, bind(&v), bind(&v))
            }
            Operator::Contains(p) => {
                format!("instr({}, {}) > 0", c, bind(&ColumnValue::Text(p.clone())))
            }
            Operator::IsNull => format!("{} IS NULL", c),
            Operator::IsNotNull => format!("{} IS NOT NULL", c),
        };
        Ok(sql)
    }
}
