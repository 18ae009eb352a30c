//! In-process implementation of the audit store

use std::collections::{BTreeMap, HashMap, HashSet};

use sqlparser::ast::{Expr, Insert, SelectItem, SetExpr, Statement, TableFactor, TableObject};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use super::{
    BatchOutcome, ColumnDef, Condition, Database, DatabaseError, QueryResult, Row, Value,
    describe_row,
};

#[derive(Debug, Clone, Default, PartialEq)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// Tables held in memory
///
/// Every statement takes effect immediately and a batch insert is applied
/// as a unit, matching the per-batch commits of the file-backed store.
/// `SELECT` statements are resolved with `sqlparser`: the first table in
/// `FROM` and either `*` or a list of plain column names.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: BTreeMap<String, MemoryTable>,
    connected: bool,
    failing_tables: HashSet<String>,
    not_null: HashMap<String, HashSet<String>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every batch insert into `table` fail as a connection-level error
    pub fn fail_inserts_into(&mut self, table: &str) {
        self.failing_tables.insert(table.to_string());
    }

    /// Reject rows holding NULL in `column`, like a `NOT NULL` constraint
    pub fn require_not_null(&mut self, table: &str, column: &str) {
        self.not_null
            .entry(table.to_string())
            .or_default()
            .insert(column.to_string());
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn rows(&self, table: &str) -> Option<&[Row]> {
        self.tables.get(table).map(|t| t.rows.as_slice())
    }

    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(|t| t.columns.as_slice())
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.rows(table).map(<[Row]>::len).unwrap_or(0)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    fn ensure_connected(&self) -> Result<(), DatabaseError> {
        if self.connected {
            Ok(())
        } else {
            Err(DatabaseError::NotConnected)
        }
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut MemoryTable, DatabaseError> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| DatabaseError::UnknownTable(table.to_string()))
    }

    /// Why a row would be refused by `table`, if it would
    fn violation(&self, table: &MemoryTable, name: &str, row: &Row) -> Option<String> {
        if row.len() != table.columns.len() {
            return Some(format!(
                "expected {} values, found {}",
                table.columns.len(),
                row.len()
            ));
        }
        let required = self.not_null.get(name)?;
        table
            .columns
            .iter()
            .zip(row)
            .find(|(column, value)| value.is_null() && required.contains(*column))
            .map(|(column, _)| format!("NULL in NOT NULL column '{}'", column))
    }
}

impl Database for MemoryDatabase {
    fn connect(&mut self) -> Result<(), DatabaseError> {
        self.connected = true;
        Ok(())
    }

    fn close(&mut self, commit: bool) -> Result<(), DatabaseError> {
        if self.connected && !commit {
            tracing::warn!("Closing after a failure; committed batches are kept");
        }
        self.connected = false;
        Ok(())
    }

    fn ensure_table(&mut self, table: &str, columns: &[ColumnDef]) -> Result<(), DatabaseError> {
        self.ensure_connected()?;
        self.tables
            .entry(table.to_string())
            .or_insert_with(|| MemoryTable {
                columns: columns.iter().map(|c| c.name.to_string()).collect(),
                rows: Vec::new(),
            });
        Ok(())
    }

    fn execute_query(&mut self, sql: &str, _params: &[Value]) -> Result<QueryResult, DatabaseError> {
        self.ensure_connected()?;
        let (table_name, projection) = resolve_select(sql)?;
        let table = self
            .tables
            .get(&table_name)
            .ok_or_else(|| DatabaseError::UnknownTable(table_name.clone()))?;

        let indices: Vec<usize> = match projection {
            None => (0..table.columns.len()).collect(),
            Some(names) => names
                .iter()
                .map(|name| {
                    table.columns.iter().position(|c| c == name).ok_or_else(|| {
                        DatabaseError::Query(format!("Unknown column '{}' in {}", name, table_name))
                    })
                })
                .collect::<Result<_, _>>()?,
        };

        Ok(QueryResult {
            columns: indices.iter().map(|&i| table.columns[i].clone()).collect(),
            rows: table
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    fn insert_batch(
        &mut self,
        _sql: &str,
        table: &str,
        rows: &[Row],
    ) -> Result<BatchOutcome, DatabaseError> {
        self.ensure_connected()?;
        if self.failing_tables.contains(table) {
            return Err(DatabaseError::Batch {
                table: table.to_string(),
                message: "connection lost".to_string(),
            });
        }

        let target = self
            .tables
            .get(table)
            .ok_or_else(|| DatabaseError::UnknownTable(table.to_string()))?;
        let mut accepted = Vec::with_capacity(rows.len());
        let mut outcome = BatchOutcome::default();

        for row in rows {
            if let Some(reason) = self.violation(target, table, row) {
                tracing::warn!(
                    table,
                    row = %describe_row(row),
                    reason = %reason,
                    "Insert failed; row skipped"
                );
                outcome.failed += 1;
                continue;
            }
            accepted.push(row.clone());
            outcome.inserted += 1;
        }

        self.table_mut(table)?.rows.extend(accepted);
        Ok(outcome)
    }

    fn delete_batch(
        &mut self,
        table: &str,
        conditions: &[Condition],
    ) -> Result<usize, DatabaseError> {
        self.ensure_connected()?;
        let target = self.table_mut(table)?;

        // Resolve column positions once per condition
        let mut resolved: Vec<Vec<(usize, &Value)>> = Vec::with_capacity(conditions.len());
        for condition in conditions {
            let mut terms = Vec::with_capacity(condition.len());
            for (column, value) in condition {
                let index = target
                    .columns
                    .iter()
                    .position(|c| c == column)
                    .ok_or_else(|| {
                        DatabaseError::Query(format!("Unknown column '{}' in {}", column, table))
                    })?;
                terms.push((index, value));
            }
            resolved.push(terms);
        }

        let before = target.rows.len();
        target.rows.retain(|row| {
            !resolved
                .iter()
                .any(|terms| terms.iter().all(|(i, v)| &row[*i] == *v))
        });
        Ok(before - target.rows.len())
    }

    fn truncate(&mut self, table: &str) -> Result<(), DatabaseError> {
        self.ensure_connected()?;
        self.table_mut(table)?.rows.clear();
        Ok(())
    }
}

/// Find the source table and the projected column names of a `SELECT`
///
/// Returns `None` for the projection when it is `*`.
fn resolve_select(sql: &str) -> Result<(String, Option<Vec<String>>), DatabaseError> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| DatabaseError::Query(format!("{}: {}", sql, e)))?;

    let Some(Statement::Query(query)) = statements.first() else {
        return Err(DatabaseError::Query(format!("Not a SELECT statement: {}", sql)));
    };
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(DatabaseError::Query(format!("Unsupported query shape: {}", sql)));
    };

    let table = match select.from.first().map(|t| &t.relation) {
        Some(TableFactor::Table { name, .. }) => unqualified(&name.to_string()),
        _ => {
            return Err(DatabaseError::Query(format!(
                "SELECT without a table source: {}",
                sql
            )));
        }
    };

    let mut columns = Vec::new();
    for item in &select.projection {
        match item {
            SelectItem::Wildcard(_) => return Ok((table, None)),
            SelectItem::UnnamedExpr(Expr::Identifier(ident)) => columns.push(ident.value.clone()),
            other => {
                return Err(DatabaseError::Query(format!(
                    "Unsupported projection '{}' in: {}",
                    other, sql
                )));
            }
        }
    }

    Ok((table, Some(columns)))
}

/// Target table of an `INSERT` statement, without schema or quotes
pub(crate) fn insert_target(sql: &str) -> Result<String, DatabaseError> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| DatabaseError::Query(format!("{}: {}", sql, e)))?;

    match statements.first() {
        Some(Statement::Insert(Insert {
            table: TableObject::TableName(name),
            ..
        })) => Ok(unqualified(&name.to_string())),
        _ => Err(DatabaseError::Query(format!("Not an INSERT statement: {}", sql))),
    }
}

/// Last dotted segment of a table name, without quotes
fn unqualified(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).trim_matches('"').to_string()
}
