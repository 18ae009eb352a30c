//! Error types for pipeline operations
//!
//! Stage failures keep their source error so the CLI can print the
//! module's own `user_message()`.

use thiserror::Error;

use crate::config::ConfigError;
use crate::database::DatabaseError;
use crate::load::SnapshotError;
use crate::loader::LoaderError;

/// Errors that can occur during pipeline execution
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Missing or invalid configuration; fatal to the stage
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Document discovery failed
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// The audit store failed
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// A snapshot could not be written or read back
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Stage failed with context
    #[error("Stage '{stage}' failed: {source}")]
    StageFailure {
        stage: String,
        #[source]
        source: Box<PipelineError>,
    },
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Wrap an error with the name of the stage it stopped
    pub fn stage_failure(stage: impl Into<String>, source: PipelineError) -> Self {
        Self::StageFailure {
            stage: stage.into(),
            source: Box::new(source),
        }
    }

    /// Get the stage name if this is a stage error
    pub fn stage_name(&self) -> Option<&str> {
        match self {
            PipelineError::StageFailure { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Config(e) => e.user_message(),
            PipelineError::Loader(e) => e.user_message(),
            PipelineError::Database(e) => e.user_message(),
            PipelineError::Snapshot(e) => e.user_message(),
            PipelineError::StageFailure { stage, source } => {
                format!("Stage '{stage}' failed: {}", source.user_message())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failure_keeps_source_message() {
        let err = PipelineError::stage_failure(
            "aggregate",
            ConfigError::MissingParameter {
                section: "queries".to_string(),
                key: "select_vartable".to_string(),
            }
            .into(),
        );
        assert_eq!(err.stage_name(), Some("aggregate"));
        assert!(err.user_message().contains("select_vartable"));
        assert!(err.user_message().starts_with("Stage 'aggregate' failed"));
    }
}
