//! Embedded DuckDB audit store

use duckdb::params_from_iter;
use duckdb::types::{ToSql, ToSqlOutput, Value as DuckValue};

use super::{
    BatchOutcome, ColumnDef, ColumnKind, Condition, Database, DatabaseError, QueryResult, Row,
    Value, describe_row, quote_ident,
};

impl ToSql for Value {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(match self {
            Value::Null => DuckValue::Null,
            Value::Integer(i) => DuckValue::BigInt(*i),
            Value::Text(s) => DuckValue::Text(s.clone()),
        }))
    }
}

fn from_duck(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Integer(i64::from(b)),
        DuckValue::TinyInt(n) => Value::Integer(n.into()),
        DuckValue::SmallInt(n) => Value::Integer(n.into()),
        DuckValue::Int(n) => Value::Integer(n.into()),
        DuckValue::BigInt(n) => Value::Integer(n),
        DuckValue::UTinyInt(n) => Value::Integer(n.into()),
        DuckValue::USmallInt(n) => Value::Integer(n.into()),
        DuckValue::UInt(n) => Value::Integer(n.into()),
        DuckValue::Text(s) => Value::Text(s),
        other => Value::Text(format!("{:?}", other)),
    }
}

/// Audit store backed by a DuckDB file
///
/// Deletes and truncates run in autocommit mode; each batch insert is its
/// own transaction. A row error aborts a DuckDB transaction, so a rejected
/// batch is rolled back and replayed one row per statement, skipping the
/// rows that fail.
pub struct DuckDbDatabase {
    path: Option<String>,
    conn: Option<duckdb::Connection>,
}

impl DuckDbDatabase {
    /// Store at the given file path (created on first connect)
    pub fn open(path: &str) -> Self {
        Self {
            path: Some(path.to_string()),
            conn: None,
        }
    }

    /// In-memory store (for testing)
    pub fn memory() -> Self {
        Self {
            path: None,
            conn: None,
        }
    }

    /// Get the database path (if not in-memory)
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn conn(&self) -> Result<&duckdb::Connection, DatabaseError> {
        self.conn.as_ref().ok_or(DatabaseError::NotConnected)
    }

    fn column_count(&self, table: &str) -> Result<usize, DatabaseError> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM information_schema.columns WHERE table_name = ?1",
            [table],
            |row| row.get(0),
        )?;
        if count == 0 {
            return Err(DatabaseError::UnknownTable(table.to_string()));
        }
        Ok(count as usize)
    }
}

impl Database for DuckDbDatabase {
    fn connect(&mut self) -> Result<(), DatabaseError> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = match &self.path {
            Some(path) => duckdb::Connection::open(path),
            None => duckdb::Connection::open_in_memory(),
        }
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        tracing::debug!(path = ?self.path, "Opened DuckDB connection");
        self.conn = Some(conn);
        Ok(())
    }

    fn close(&mut self, commit: bool) -> Result<(), DatabaseError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        if !commit {
            tracing::warn!("Closing after a failure; committed batches are kept");
        }
        conn.close()
            .map_err(|(_, e)| DatabaseError::Connection(e.to_string()))
    }

    fn ensure_table(&mut self, table: &str, columns: &[ColumnDef]) -> Result<(), DatabaseError> {
        let ddl = columns
            .iter()
            .map(|c| {
                let kind = match c.kind {
                    ColumnKind::Text => "VARCHAR",
                    ColumnKind::Integer => "BIGINT",
                };
                format!("{} {}", quote_ident(c.name), kind)
            })
            .collect::<Vec<_>>()
            .join(", ");

        self.conn()?.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(table),
            ddl
        ))?;
        Ok(())
    }

    fn execute_query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        // Column names are only available once the statement has run
        let column_count = rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let columns: Vec<String> = (0..column_count)
            .map(|i| {
                rows.as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("col{}", i))
            })
            .collect();

        let mut result = QueryResult {
            columns,
            rows: Vec::new(),
        };
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(from_duck(row.get::<_, DuckValue>(i)?));
            }
            result.rows.push(values);
        }
        Ok(result)
    }

    fn insert_batch(
        &mut self,
        sql: &str,
        table: &str,
        rows: &[Row],
    ) -> Result<BatchOutcome, DatabaseError> {
        let width = self.column_count(table)?;
        let conn = self.conn()?;
        let batch_error = |e: duckdb::Error| DatabaseError::Batch {
            table: table.to_string(),
            message: e.to_string(),
        };

        let mut stmt = conn.prepare(sql).map_err(batch_error)?;
        let mut outcome = BatchOutcome::default();

        let mut valid = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() == width {
                valid.push(row);
                continue;
            }
            tracing::warn!(
                table,
                expected = width,
                found = row.len(),
                row = %describe_row(row),
                "Skipping row with wrong arity"
            );
            outcome.failed += 1;
        }

        conn.execute_batch("BEGIN TRANSACTION").map_err(batch_error)?;
        let rejected = valid
            .iter()
            .find_map(|row| stmt.execute(params_from_iter(row.iter())).err());

        let Some(first_error) = rejected else {
            if let Err(e) = conn.execute_batch("COMMIT") {
                if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                    tracing::error!(table, error = %rollback, "Rollback after failed commit failed");
                }
                return Err(batch_error(e));
            }
            outcome.inserted += valid.len();
            return Ok(outcome);
        };

        conn.execute_batch("ROLLBACK").map_err(batch_error)?;
        tracing::debug!(
            table,
            error = %first_error,
            "Batch rejected a row; inserting one row per statement"
        );

        for row in valid {
            match stmt.execute(params_from_iter(row.iter())) {
                Ok(_) => outcome.inserted += 1,
                Err(e) => {
                    tracing::warn!(
                        table,
                        row = %describe_row(row),
                        error = %e,
                        "Insert failed; row skipped"
                    );
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    fn delete_batch(
        &mut self,
        table: &str,
        conditions: &[Condition],
    ) -> Result<usize, DatabaseError> {
        let conn = self.conn()?;
        let mut removed = 0;

        for condition in conditions {
            if condition.is_empty() {
                continue;
            }
            let predicate = condition
                .iter()
                .map(|(column, _)| format!("{} = ?", quote_ident(column)))
                .collect::<Vec<_>>()
                .join(" AND ");
            let sql = format!("DELETE FROM {} WHERE {}", quote_ident(table), predicate);
            removed += conn.execute(&sql, params_from_iter(condition.iter().map(|(_, v)| v)))?;
        }

        Ok(removed)
    }

    fn truncate(&mut self, table: &str) -> Result<(), DatabaseError> {
        self.conn()?
            .execute_batch(&format!("DELETE FROM {}", quote_ident(table)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: [ColumnDef; 3] = [
        ColumnDef::text("NameProject"),
        ColumnDef::text("NameJob"),
        ColumnDef::integer("posX"),
    ];

    const INSERT: &str = "INSERT INTO node (NameProject, NameJob, posX) VALUES (?, ?, ?)";

    fn connected() -> DuckDbDatabase {
        let mut db = DuckDbDatabase::memory();
        db.connect().unwrap();
        db.ensure_table("node", &COLUMNS).unwrap();
        db
    }

    #[test]
    fn test_insert_and_select() {
        let mut db = connected();
        let outcome = db
            .insert_batch(
                INSERT,
                "node",
                &[
                    vec!["P1".into(), "J1".into(), Value::Integer(10)],
                    vec!["P1".into(), "J2".into(), Value::Null],
                ],
            )
            .unwrap();
        assert_eq!(outcome.inserted, 2);

        let result = db
            .execute_query("SELECT NameJob, posX FROM node ORDER BY NameJob", &[])
            .unwrap();
        assert_eq!(result.columns, vec!["NameJob", "posX"]);
        assert_eq!(result.rows[0], vec![Value::Text("J1".into()), Value::Integer(10)]);
        assert_eq!(result.rows[1][1], Value::Null);
    }

    #[test]
    fn test_arity_mismatch_is_skipped() {
        let mut db = connected();
        let outcome = db
            .insert_batch(
                INSERT,
                "node",
                &[
                    vec!["P1".into()],
                    vec!["P1".into(), "J1".into(), Value::Integer(1)],
                ],
            )
            .unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.failed, 1);
    }

    #[test]
    fn test_constraint_violation_skips_only_that_row() {
        let mut db = DuckDbDatabase::memory();
        db.connect().unwrap();
        db.conn()
            .unwrap()
            .execute_batch(
                "CREATE TABLE node (NameProject VARCHAR, NameJob VARCHAR NOT NULL, posX BIGINT)",
            )
            .unwrap();

        let outcome = db
            .insert_batch(
                INSERT,
                "node",
                &[
                    vec!["P1".into(), "J1".into(), Value::Integer(1)],
                    vec!["P1".into(), Value::Null, Value::Integer(2)],
                    vec!["P1".into(), "J3".into(), Value::Integer(3)],
                ],
            )
            .unwrap();
        assert_eq!(outcome, BatchOutcome { inserted: 2, failed: 1 });

        let result = db
            .execute_query("SELECT NameJob FROM node ORDER BY NameJob", &[])
            .unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::Text("J1".into())], vec![Value::Text("J3".into())]]
        );
    }

    #[test]
    fn test_delete_and_truncate() {
        let mut db = connected();
        db.insert_batch(
            INSERT,
            "node",
            &[
                vec!["P1".into(), "J1".into(), Value::Integer(1)],
                vec!["P1".into(), "J2".into(), Value::Integer(2)],
            ],
        )
        .unwrap();

        let removed = db
            .delete_batch(
                "node",
                &[vec![
                    ("NameProject".to_string(), "P1".into()),
                    ("NameJob".to_string(), "J1".into()),
                ]],
            )
            .unwrap();
        assert_eq!(removed, 1);

        db.truncate("node").unwrap();
        let result = db.execute_query("SELECT * FROM node", &[]).unwrap();
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_batches_persist_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.duckdb");
        let path = path.to_str().unwrap();

        let mut db = DuckDbDatabase::open(path);
        db.connect().unwrap();
        db.ensure_table("node", &COLUMNS).unwrap();
        db.insert_batch(INSERT, "node", &[vec!["P".into(), "J".into(), Value::Integer(0)]])
            .unwrap();
        db.close(true).unwrap();

        let mut reopened = DuckDbDatabase::open(path);
        reopened.connect().unwrap();
        let result = reopened.execute_query("SELECT * FROM node", &[]).unwrap();
        assert_eq!(result.rows.len(), 1);
        reopened
            .insert_batch(INSERT, "node", &[vec!["P".into(), "K".into(), Value::Integer(1)]])
            .unwrap();
        reopened.close(false).unwrap();

        // Batches are committed as they complete
        let mut again = DuckDbDatabase::open(path);
        again.connect().unwrap();
        let result = again.execute_query("SELECT * FROM node", &[]).unwrap();
        assert_eq!(result.rows.len(), 2);
        again.close(true).unwrap();
    }

    #[test]
    fn test_requires_connection() {
        let mut db = DuckDbDatabase::memory();
        assert!(matches!(
            db.truncate("node"),
            Err(DatabaseError::NotConnected)
        ));
    }
}
