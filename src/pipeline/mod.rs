//! Audit pipeline orchestration
//!
//! Sequences the stages against a single database connection:
//!
//! 1. **Load**: discover documents, keep the latest version of each job,
//!    parse them and replace their rows in every flattened table
//! 2. **Aggregate**: read the flattened tables back and recompute the
//!    derived lineage tables
//!
//! # Example
//!
//! ```rust,ignore
//! use job_audit::config::AuditConfig;
//! use job_audit::database::MemoryDatabase;
//! use job_audit::pipeline::{AuditPipeline, Stage};
//!
//! let config = AuditConfig::from_file("audit.toml".as_ref())?;
//! let mut pipeline = AuditPipeline::new(config, MemoryDatabase::new());
//! let report = pipeline.run(&Stage::all())?;
//! report.print_summary();
//! ```
//!
//! Each insert batch is committed as it completes, so a failed stage keeps
//! the work of earlier batches. The connection is closed on every exit path.

mod error;
mod executor;

pub use error::{PipelineError, PipelineResult};
pub use executor::{AuditPipeline, PipelineReport, Stage};
