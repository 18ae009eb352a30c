//! Job Audit - audit schema and column lineage for Talend-style job designs
//!
//! Provides:
//! - Document parsing (job designs, job properties, context items)
//! - Batch loading with per-job version dominance
//! - Flattening into relational audit tables with delete-then-insert refresh
//! - Column-level lineage aggregation across tMap components
//! - A pipeline sequencing the stages against one transactional connection

pub mod config;
pub mod database;
pub mod import;
pub mod lineage;
pub mod load;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod xml;

pub use config::{AuditConfig, ConfigError, ParamStore};
pub use database::{Database, DatabaseError, MemoryDatabase, QueryResult, Row, Value};
#[cfg(feature = "duckdb-backend")]
pub use database::DuckDbDatabase;
pub use import::{ImportError, JobDocumentParser, parse_document};
pub use lineage::{AggregationStage, AggregationStats, LineageAggregator, RowSource};
pub use load::{LoadStage, LoadStats};
pub use loader::{FileBatchLoader, LoaderError, LoaderStats, VersionOrdering};
pub use models::{DocumentKind, ParsedDocument, ParsedFile};
pub use pipeline::{AuditPipeline, PipelineError, PipelineReport, PipelineResult, Stage};
