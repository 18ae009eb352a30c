//! Relational store abstraction
//!
//! The pipeline talks to the audit store only through the [`Database`]
//! trait. Statement text for inserts and selects is supplied by
//! configuration; implementations build only equality `WHERE` clauses for
//! deletes and `CREATE TABLE IF NOT EXISTS` for schema setup.
//!
//! Implementations:
//! - [`MemoryDatabase`]: in-process tables, used by tests and dry runs
//! - [`DuckDbDatabase`]: embedded DuckDB file (feature `duckdb-backend`)

pub mod error;
pub mod memory;

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

use serde::{Deserialize, Serialize};

pub use error::DatabaseError;
pub use memory::MemoryDatabase;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDbDatabase;

/// A single cell value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
}

impl Value {
    /// `Text` for `Some`, `Null` for `None`
    pub fn text(value: Option<&str>) -> Self {
        match value {
            Some(s) => Value::Text(s.to_string()),
            None => Value::Null,
        }
    }

    /// Text view of the value; integers are rendered, NULL is `None`
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Text(s) => Some(s.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One row in table column order
pub type Row = Vec<Value>;

/// Equality conditions joined with `AND`
pub type Condition = Vec<(String, Value)>;

/// Storage class of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
}

/// Column declaration used for schema setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl ColumnDef {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Text,
        }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Integer,
        }
    }
}

/// Rows returned by a query, with their column names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Outcome of one batch insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub inserted: usize,
    /// Rows rejected individually and skipped
    pub failed: usize,
}

impl std::ops::AddAssign for BatchOutcome {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.failed += other.failed;
    }
}

/// The relational store consumed by the load and lineage stages
///
/// All calls are blocking. Deletes and truncates take effect immediately and
/// each `insert_batch` call commits on its own. Within a batch, a failing row
/// is logged with its payload and skipped; only a failure of the batch
/// mechanism itself rolls the batch back and returns an error.
pub trait Database {
    /// Acquire the connection
    fn connect(&mut self) -> Result<(), DatabaseError>;

    /// Release the connection; `commit` is false when the run failed
    fn close(&mut self, commit: bool) -> Result<(), DatabaseError>;

    /// Create the table when it does not exist yet
    fn ensure_table(&mut self, table: &str, columns: &[ColumnDef]) -> Result<(), DatabaseError>;

    /// Run a configured `SELECT`
    fn execute_query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult, DatabaseError>;

    /// Insert rows with a configured `INSERT` statement
    fn insert_batch(
        &mut self,
        sql: &str,
        table: &str,
        rows: &[Row],
    ) -> Result<BatchOutcome, DatabaseError>;

    /// Delete every row matching any of the conditions; returns rows removed
    fn delete_batch(&mut self, table: &str, conditions: &[Condition])
    -> Result<usize, DatabaseError>;

    /// Remove all rows of a table
    fn truncate(&mut self, table: &str) -> Result<(), DatabaseError>;
}

/// Render a row for log output
pub(crate) fn describe_row(row: &[Value]) -> String {
    row.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Quote an identifier for SQL text
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_text_helpers() {
        assert_eq!(Value::text(Some("a")), Value::Text("a".to_string()));
        assert_eq!(Value::text(None), Value::Null);
        assert_eq!(Value::Integer(1).as_text(), Some("1".to_string()));
        assert!(Value::Null.as_text().is_none());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("NameJob"), "\"NameJob\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_batch_outcome_accumulates() {
        let mut total = BatchOutcome::default();
        total += BatchOutcome {
            inserted: 3,
            failed: 1,
        };
        total += BatchOutcome {
            inserted: 2,
            failed: 0,
        };
        assert_eq!(total.inserted, 5);
        assert_eq!(total.failed, 1);
    }
}
