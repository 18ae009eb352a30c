//! Relational projection / load stage
//!
//! For every flattened table:
//! 1. Look up its insert statement (`[queries] insert_<table>`)
//! 2. Flatten the parsed files the table is sourced from
//! 3. Delete all rows of every touched (NameProject, NameJob)
//! 4. Insert the new rows in batches of `batch_size`
//! 5. Write the rows to `<snapshot_dir>/<table>.csv`
//!
//! The delete and every insert batch are committed separately. A batch that
//! fails after the delete leaves the key short of rows until the next
//! successful run, which restores it. Every insert statement is resolved
//! before the first table is touched, so a missing one writes nothing.

pub mod flatten;
pub mod snapshot;
pub mod tables;

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::AuditConfig;
use crate::database::{BatchOutcome, Condition, Database, Row, Value};
use crate::models::ParsedFile;
use crate::pipeline::PipelineResult;

pub use snapshot::{SnapshotError, read_snapshot, snapshot_path, write_snapshot};
pub use tables::{FLATTENED_TABLES, TableSpec};

/// Outcome of loading one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableLoadStats {
    pub table: String,
    /// (project, job) keys replaced
    pub keys_replaced: usize,
    pub rows_deleted: usize,
    pub rows_inserted: usize,
    /// Rows rejected individually and skipped
    pub rows_failed: usize,
    pub batches: usize,
}

/// Statistics from a load stage run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadStats {
    pub tables: Vec<TableLoadStats>,
    #[serde(skip)]
    pub duration: Duration,
}

impl LoadStats {
    pub fn rows_inserted(&self) -> usize {
        self.tables.iter().map(|t| t.rows_inserted).sum()
    }

    pub fn rows_failed(&self) -> usize {
        self.tables.iter().map(|t| t.rows_failed).sum()
    }

    pub fn table(&self, name: &str) -> Option<&TableLoadStats> {
        self.tables.iter().find(|t| t.table == name)
    }
}

/// Writes parsed files into the flattened tables
pub struct LoadStage<'a> {
    config: &'a AuditConfig,
    execution_date: String,
}

impl<'a> LoadStage<'a> {
    pub fn new(config: &'a AuditConfig, execution_date: impl Into<String>) -> Self {
        Self {
            config,
            execution_date: execution_date.into(),
        }
    }

    /// Load every flattened table
    pub fn run(&self, db: &mut dyn Database, files: &[ParsedFile]) -> PipelineResult<LoadStats> {
        let start = Instant::now();
        let mut stats = LoadStats::default();

        for spec in FLATTENED_TABLES {
            self.config.query(&spec.insert_query_key())?;
        }
        for spec in FLATTENED_TABLES {
            stats.tables.push(self.load_table(db, spec, files)?);
        }

        stats.duration = start.elapsed();
        tracing::info!(
            tables = stats.tables.len(),
            inserted = stats.rows_inserted(),
            failed = stats.rows_failed(),
            duration_ms = stats.duration.as_millis() as u64,
            "Load stage complete"
        );
        Ok(stats)
    }

    /// Replace the rows of the touched keys in one table
    pub fn load_table(
        &self,
        db: &mut dyn Database,
        spec: &TableSpec,
        files: &[ParsedFile],
    ) -> PipelineResult<TableLoadStats> {
        // Resolve the statement before touching the table
        let insert_sql = self.config.query(&spec.insert_query_key())?;

        let sources: Vec<&ParsedFile> = files
            .iter()
            .filter(|f| spec.accepts(f.document.kind))
            .collect();

        let rows: Vec<Row> = sources
            .iter()
            .flat_map(|f| (spec.flatten)(f, &self.execution_date))
            .collect();

        let touched: BTreeSet<(&str, &str)> = sources.iter().map(|f| f.key()).collect();
        let conditions: Vec<Condition> = touched
            .iter()
            .map(|(project, job)| {
                vec![
                    ("NameProject".to_string(), Value::from(*project)),
                    ("NameJob".to_string(), Value::from(*job)),
                ]
            })
            .collect();

        db.ensure_table(spec.name, spec.columns)?;
        let rows_deleted = if conditions.is_empty() {
            0
        } else {
            db.delete_batch(spec.name, &conditions)?
        };

        let mut outcome = BatchOutcome::default();
        let mut batches = 0;
        for chunk in rows.chunks(self.config.batch_size) {
            outcome += db.insert_batch(insert_sql, spec.name, chunk)?;
            batches += 1;
        }

        write_snapshot(
            &self.config.snapshot_dir,
            spec.name,
            spec.columns,
            &rows,
            self.config.snapshot_delimiter,
        )?;

        if outcome.failed > 0 {
            tracing::warn!(table = spec.name, failed = outcome.failed, "Rows skipped during load");
        }
        tracing::info!(
            table = spec.name,
            keys = touched.len(),
            deleted = rows_deleted,
            inserted = outcome.inserted,
            "Loaded table"
        );

        Ok(TableLoadStats {
            table: spec.name.to_string(),
            keys_replaced: touched.len(),
            rows_deleted,
            rows_inserted: outcome.inserted,
            rows_failed: outcome.failed,
            batches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ParamStore, QUERIES, sample_config};
    use crate::database::MemoryDatabase;
    use crate::models::{Component, ParsedDocument};
    use crate::pipeline::PipelineError;
    use tempfile::TempDir;

    fn config(snapshots: &TempDir, batch_size: usize) -> AuditConfig {
        let mut params = ParamStore::from_toml(&sample_config()).unwrap();
        params.set_param("paths", "snapshot_dir", snapshots.path().to_string_lossy());
        params.set_param("database", "batch_size", batch_size.to_string());
        AuditConfig::from_params(params).unwrap()
    }

    fn job(project: &str, job: &str, components: usize) -> ParsedFile {
        ParsedFile {
            project_name: project.to_string(),
            job_name: job.to_string(),
            version: "0.1".to_string(),
            document: ParsedDocument {
                nodes: (0..components)
                    .map(|i| Component {
                        component_name: Some("tLogRow".to_string()),
                        component_value: Some(format!("tLogRow_{}", i)),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            },
        }
    }

    fn connected() -> MemoryDatabase {
        let mut db = MemoryDatabase::new();
        db.connect().unwrap();
        db
    }

    #[test]
    fn test_reload_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp, 100);
        let stage = LoadStage::new(&config, "2024-05-01");
        let files = vec![job("P1", "J1", 2), job("P1", "J2", 1)];
        let mut db = connected();

        stage.run(&mut db, &files).unwrap();
        let first = db.rows("node").unwrap().to_vec();

        let stats = stage.run(&mut db, &files).unwrap();
        assert_eq!(db.rows("node").unwrap(), first.as_slice());
        assert_eq!(stats.table("node").unwrap().rows_deleted, 3);
    }

    #[test]
    fn test_untouched_keys_survive() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp, 100);
        let stage = LoadStage::new(&config, "2024-05-01");
        let mut db = connected();

        stage.run(&mut db, &[job("P1", "J1", 1), job("P1", "J2", 1)]).unwrap();
        stage.run(&mut db, &[job("P1", "J1", 3)]).unwrap();

        let jobs: Vec<_> = db
            .rows("node")
            .unwrap()
            .iter()
            .map(|r| r[1].to_string())
            .collect();
        assert_eq!(jobs.iter().filter(|j| *j == "J1").count(), 3);
        assert_eq!(jobs.iter().filter(|j| *j == "J2").count(), 1);
    }

    #[test]
    fn test_batches_and_snapshot() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp, 2);
        let stage = LoadStage::new(&config, "2024-05-01");
        let mut db = connected();

        let stats = stage.run(&mut db, &[job("P1", "J1", 5)]).unwrap();
        let node = stats.table("node").unwrap();
        assert_eq!(node.rows_inserted, 5);
        assert_eq!(node.batches, 3);

        let snapshot =
            read_snapshot(temp.path(), "node", tables::NODE_COLUMNS, b',').unwrap();
        assert_eq!(snapshot.rows.len(), 5);
        assert_eq!(snapshot.rows[4][3], Value::from("tLogRow_4"));
    }

    #[test]
    fn test_missing_insert_query_fails_before_delete() {
        let temp = TempDir::new().unwrap();
        let mut config = config(&temp, 100);
        let stage_config = config.clone();
        let mut db = connected();
        LoadStage::new(&stage_config, "d").run(&mut db, &[job("P1", "J1", 1)]).unwrap();

        config.params.remove_param(QUERIES, "insert_node");
        let spec = tables::table("node").unwrap();
        let result = LoadStage::new(&config, "d").load_table(&mut db, spec, &[job("P1", "J1", 1)]);

        assert!(matches!(result, Err(PipelineError::Config(_))));
        assert_eq!(db.row_count("node"), 1);
    }

    #[test]
    fn test_missing_later_query_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let mut config = config(&temp, 100);
        config.params.remove_param(QUERIES, "insert_jobserverproperties");
        let mut db = connected();

        let result = LoadStage::new(&config, "d").run(&mut db, &[job("P1", "J1", 1)]);
        assert!(matches!(result, Err(PipelineError::Config(_))));
        assert!(db.table_names().is_empty());
    }

    #[test]
    fn test_rejected_row_does_not_stop_the_batch() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp, 100);
        let mut db = connected();
        db.require_not_null("node", "componentValue");

        let mut file = job("P1", "J1", 3);
        file.document.nodes[1].component_value = None;

        let stats = LoadStage::new(&config, "d").run(&mut db, &[file]).unwrap();
        let node = stats.table("node").unwrap();
        assert_eq!(node.rows_inserted, 2);
        assert_eq!(node.rows_failed, 1);
        assert_eq!(db.row_count("node"), 2);
    }
}
