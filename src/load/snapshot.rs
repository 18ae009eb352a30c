//! Delimited snapshots of loaded tables
//!
//! One file per table, `<dir>/<table>.csv`, whose header is the table's
//! column list. NULL is written as an empty field and read back as NULL.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::database::{ColumnDef, QueryResult, Row, Value};

/// Errors reading or writing a snapshot
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("CSV error in {path}: {message}")]
    Csv { path: PathBuf, message: String },

    /// The header differs from the table's column list
    #[error("Snapshot {path} has header [{found}], expected [{expected}]")]
    HeaderMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

impl SnapshotError {
    fn csv(path: &Path, err: csv::Error) -> Self {
        SnapshotError::Csv {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            SnapshotError::Io { path, .. } => format!(
                "{self}\n\nHint: Check [paths] snapshot_dir exists and is writable ({}).",
                path.display()
            ),
            SnapshotError::HeaderMismatch { .. } => format!(
                "{self}\n\nHint: Snapshots are written by the load stage; re-run it before aggregating."
            ),
            _ => self.to_string(),
        }
    }
}

/// Path of a table's snapshot
pub fn snapshot_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{}.csv", table))
}

/// Write `rows` as the snapshot of `table`, replacing any previous one
pub fn write_snapshot(
    dir: &Path,
    table: &str,
    columns: &[ColumnDef],
    rows: &[Row],
    delimiter: u8,
) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(dir).map_err(|e| SnapshotError::Io {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let path = snapshot_path(dir, table);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(&path)
        .map_err(|e| SnapshotError::csv(&path, e))?;

    writer
        .write_record(columns.iter().map(|c| c.name))
        .map_err(|e| SnapshotError::csv(&path, e))?;

    for row in rows {
        writer
            .write_record(row.iter().map(|v| v.as_text().unwrap_or_default()))
            .map_err(|e| SnapshotError::csv(&path, e))?;
    }

    writer.flush().map_err(|e| SnapshotError::Io {
        path: path.clone(),
        message: e.to_string(),
    })?;

    tracing::debug!(table, rows = rows.len(), path = %path.display(), "Wrote snapshot");
    Ok(path)
}

/// Read the snapshot of `table`, checking its header against `columns`
///
/// Every cell comes back as text; empty cells become NULL.
pub fn read_snapshot(
    dir: &Path,
    table: &str,
    columns: &[ColumnDef],
    delimiter: u8,
) -> Result<QueryResult, SnapshotError> {
    let path = snapshot_path(dir, table);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(&path)
        .map_err(|e| SnapshotError::csv(&path, e))?;

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| SnapshotError::csv(&path, e))?
        .iter()
        .map(str::to_string)
        .collect();

    let expected: Vec<&str> = columns.iter().map(|c| c.name).collect();
    if header != expected {
        return Err(SnapshotError::HeaderMismatch {
            path,
            expected: expected.join(", "),
            found: header.join(", "),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SnapshotError::csv(&path, e))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Value::Null
                    } else {
                        Value::from(field)
                    }
                })
                .collect(),
        );
    }

    Ok(QueryResult {
        columns: header,
        rows,
    })
}
