//! Lineage aggregation stage
//!
//! Reads the flattened `inputtable`, `outputtable` and `vartable` back
//! (from the store by default, or from the load stage's snapshots), derives
//! the lineage tables with [`LineageAggregator`] and fully replaces each
//! derived table: truncate, then insert in batches.

pub mod joins;
pub mod rows;
pub mod tables;

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::AuditConfig;
use crate::database::{BatchOutcome, ColumnDef, Database, QueryResult};
use crate::load::tables::{INPUTTABLE_COLUMNS, OUTPUTTABLE_COLUMNS, VARTABLE_COLUMNS};
use crate::load::{read_snapshot, write_snapshot};
use crate::pipeline::PipelineResult;

pub use joins::{LineageAggregator, LineageTables, matches, normalize_expression};
pub use rows::{InputRow, OutputRow, RowSource, VarRow};
pub use tables::{LINEAGE_TABLES, LineageSpec};

/// Rows written to one derived table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageTableStats {
    /// Physical (prefixed) table name
    pub table: String,
    pub rows_inserted: usize,
    pub rows_failed: usize,
}

/// Statistics from an aggregation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationStats {
    pub input_rows: usize,
    pub output_rows: usize,
    pub var_rows: usize,
    pub tables: Vec<LineageTableStats>,
    #[serde(skip)]
    pub duration: Duration,
}

impl AggregationStats {
    pub fn table(&self, name: &str) -> Option<&LineageTableStats> {
        self.tables.iter().find(|t| t.table == name)
    }
}

/// Recomputes the derived lineage tables
pub struct AggregationStage<'a> {
    config: &'a AuditConfig,
    execution_date: String,
    source: RowSource,
}

impl<'a> AggregationStage<'a> {
    /// Stage reading the flattened tables through the `select_*` queries
    pub fn new(config: &'a AuditConfig, execution_date: impl Into<String>) -> Self {
        Self {
            config,
            execution_date: execution_date.into(),
            source: RowSource::default(),
        }
    }

    pub fn with_source(mut self, source: RowSource) -> Self {
        self.source = source;
        self
    }

    pub fn run(&self, db: &mut dyn Database) -> PipelineResult<AggregationStats> {
        let start = Instant::now();

        // Every statement is resolved before any derived table is truncated
        let statements = LINEAGE_TABLES
            .iter()
            .map(|spec| self.config.query(&spec.insert_query_key()))
            .collect::<Result<Vec<_>, _>>()?;

        let inputs = rows::input_rows(&self.read(
            db,
            "inputtable",
            "select_inputtable",
            INPUTTABLE_COLUMNS,
        )?)?;
        let outputs = rows::output_rows(&self.read(
            db,
            "outputtable",
            "select_outputtable",
            OUTPUTTABLE_COLUMNS,
        )?)?;
        let vars = rows::var_rows(&self.read(db, "vartable", "select_vartable", VARTABLE_COLUMNS)?)?;

        tracing::info!(
            inputs = inputs.len(),
            outputs = outputs.len(),
            vars = vars.len(),
            source = ?self.source,
            "Aggregating lineage"
        );

        let derived =
            LineageAggregator::new(&inputs, &outputs, &vars, &self.execution_date).aggregate();

        let mut stats = AggregationStats {
            input_rows: inputs.len(),
            output_rows: outputs.len(),
            var_rows: vars.len(),
            ..Default::default()
        };

        for (spec, sql) in LINEAGE_TABLES.iter().zip(statements) {
            let table = self.config.lineage_table_name(spec.name);
            let rows = derived.rows(spec.name);

            db.ensure_table(&table, spec.columns)?;
            db.truncate(&table)?;

            let mut outcome = BatchOutcome::default();
            for chunk in rows.chunks(self.config.batch_size) {
                outcome += db.insert_batch(sql, &table, chunk)?;
            }

            write_snapshot(
                &self.config.snapshot_dir,
                &table,
                spec.columns,
                rows,
                self.config.snapshot_delimiter,
            )?;

            tracing::info!(
                table = %table,
                inserted = outcome.inserted,
                failed = outcome.failed,
                "Wrote lineage table"
            );
            stats.tables.push(LineageTableStats {
                table,
                rows_inserted: outcome.inserted,
                rows_failed: outcome.failed,
            });
        }

        stats.duration = start.elapsed();
        Ok(stats)
    }

    fn read(
        &self,
        db: &mut dyn Database,
        table: &str,
        query_key: &str,
        columns: &[ColumnDef],
    ) -> PipelineResult<QueryResult> {
        match &self.source {
            RowSource::Snapshots(dir) => Ok(read_snapshot(
                dir,
                table,
                columns,
                self.config.snapshot_delimiter,
            )?),
            RowSource::Database => {
                let sql = self.config.query(query_key)?;
                // A store that was never loaded reads as empty
                db.ensure_table(table, columns)?;
                Ok(db.execute_query(sql, &[])?)
            }
        }
    }
}
