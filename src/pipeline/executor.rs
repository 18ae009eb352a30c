//! Pipeline executor running the audit stages against one connection

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, warn};

use super::error::{PipelineError, PipelineResult};
use crate::config::AuditConfig;
use crate::database::Database;
use crate::lineage::{AggregationStage, AggregationStats, RowSource};
use crate::load::{LoadStage, LoadStats};
use crate::loader::{FileBatchLoader, LoaderStats};
use crate::models::ParsedFile;

/// Stages of an audit run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Discover and parse documents, then replace their flattened rows
    Load,
    /// Recompute the derived lineage tables
    Aggregate,
}

impl Stage {
    /// Get all stages in execution order
    pub fn all() -> Vec<Self> {
        vec![Self::Load, Self::Aggregate]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Aggregate => "aggregate",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of a pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub execution_date: String,
    pub stages_completed: Vec<Stage>,
    pub loader: Option<LoaderStats>,
    pub load: Option<LoadStats>,
    pub aggregation: Option<AggregationStats>,
    /// Total duration in milliseconds
    pub duration_ms: u64,
}

impl PipelineReport {
    /// Get formatted duration
    pub fn duration_formatted(&self) -> String {
        let secs = self.duration_ms / 1000;
        let mins = secs / 60;
        let remaining_secs = secs % 60;

        if mins > 0 {
            format!("{}m {}s", mins, remaining_secs)
        } else {
            format!("{}.{:03}s", secs, self.duration_ms % 1000)
        }
    }

    /// Print summary to stderr
    pub fn print_summary(&self) {
        eprintln!();
        eprintln!("Audit run for {}", self.execution_date);
        eprintln!("Duration: {}", self.duration_formatted());

        if let Some(loader) = &self.loader {
            eprintln!(
                "  documents: {} parsed, {} superseded, {} skipped, {} failed",
                loader.files_parsed,
                loader.files_superseded,
                loader.files_skipped,
                loader.files_failed
            );
        }
        if let Some(load) = &self.load {
            for table in &load.tables {
                eprintln!(
                    "  {:<24} {:>8} rows ({} replaced keys, {} skipped)",
                    table.table, table.rows_inserted, table.keys_replaced, table.rows_failed
                );
            }
        }
        if let Some(aggregation) = &self.aggregation {
            for table in &aggregation.tables {
                eprintln!("  {:<32} {:>8} rows", table.table, table.rows_inserted);
            }
        }
    }
}

/// Runs the requested stages, then always closes the connection
///
/// Batches are committed by the store as they complete; closing only
/// releases the connection.
pub struct AuditPipeline<D: Database> {
    config: AuditConfig,
    db: D,
    execution_date: String,
    row_source: Option<RowSource>,
}

impl<D: Database> AuditPipeline<D> {
    /// Pipeline dated today (local time)
    pub fn new(config: AuditConfig, db: D) -> Self {
        Self {
            config,
            db,
            execution_date: chrono::Local::now().format("%Y-%m-%d").to_string(),
            row_source: None,
        }
    }

    /// Override the date stamped on every written row
    pub fn with_execution_date(mut self, date: impl Into<String>) -> Self {
        self.execution_date = date.into();
        self
    }

    /// Read flattened tables back from this source when aggregating
    pub fn with_row_source(mut self, source: RowSource) -> Self {
        self.row_source = Some(source);
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn into_database(self) -> D {
        self.db
    }

    /// Run the given stages in order
    pub fn run(&mut self, stages: &[Stage]) -> PipelineResult<PipelineReport> {
        let _span = info_span!("audit_run", execution_date = %self.execution_date).entered();
        let start = Instant::now();

        info!(
            stages = ?stages.iter().map(Stage::name).collect::<Vec<_>>(),
            "Starting audit run"
        );

        self.db.connect()?;

        let mut report = PipelineReport {
            execution_date: self.execution_date.clone(),
            ..Default::default()
        };
        let outcome = self.run_stages(stages, &mut report);

        let close = self.db.close(outcome.is_ok());
        report.duration_ms = start.elapsed().as_millis() as u64;

        match (outcome, close) {
            (Ok(()), Ok(())) => {
                info!(duration = %report.duration_formatted(), "Audit run complete");
                Ok(report)
            }
            (Ok(()), Err(e)) => Err(e.into()),
            (Err(e), close) => {
                if let Err(close_err) = close {
                    warn!(error = %close_err, "Close failed after stage error");
                }
                error!(error = %e, "Audit run failed");
                Err(e)
            }
        }
    }

    fn run_stages(&mut self, stages: &[Stage], report: &mut PipelineReport) -> PipelineResult<()> {
        let mut ordered = stages.to_vec();
        ordered.sort_by_key(|s| Stage::all().iter().position(|x| x == s));
        ordered.dedup();

        for stage in ordered {
            let result = match stage {
                Stage::Load => self.load(report),
                Stage::Aggregate => self.aggregate(report),
            };
            result.map_err(|e| PipelineError::stage_failure(stage.name(), e))?;
            report.stages_completed.push(stage);
        }
        Ok(())
    }

    fn load(&mut self, report: &mut PipelineReport) -> PipelineResult<()> {
        let (files, loader_stats) = self.discover()?;
        report.loader = Some(loader_stats);

        let stage = LoadStage::new(&self.config, self.execution_date.as_str());
        report.load = Some(stage.run(&mut self.db, &files)?);
        Ok(())
    }

    fn aggregate(&mut self, report: &mut PipelineReport) -> PipelineResult<()> {
        let mut stage = AggregationStage::new(&self.config, self.execution_date.as_str());
        if let Some(source) = &self.row_source {
            stage = stage.with_source(source.clone());
        }
        report.aggregation = Some(stage.run(&mut self.db)?);
        Ok(())
    }

    /// Job designs, then properties and context items when configured
    fn discover(&self) -> PipelineResult<(Vec<ParsedFile>, LoaderStats)> {
        let mut sources: Vec<(PathBuf, &str)> =
            vec![(self.config.jobs_dir.clone(), self.config.job_extension.as_str())];
        if let Some(ext) = &self.config.properties_extension {
            sources.push((self.config.jobs_dir.clone(), ext.as_str()));
        }
        if let Some(dir) = &self.config.contexts_dir {
            sources.push((dir.clone(), self.config.job_extension.as_str()));
        }

        let mut files = Vec::new();
        let mut stats = LoaderStats::new();
        for (dir, extension) in sources {
            let batch = FileBatchLoader::new(extension)
                .with_ordering(self.config.version_ordering)
                .load(&dir)?;
            files.extend(batch.files);
            stats.merge(batch.stats);
        }
        Ok((files, stats))
    }
}
