//! Error types for database operations

use thiserror::Error;

/// Errors raised by a [`Database`](super::Database) implementation
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The store could not be reached or opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// An operation was attempted before `connect()`
    #[error("Database not connected. Call connect() first.")]
    NotConnected,

    /// The batch mechanism itself failed; the batch was rolled back
    #[error("Batch insert into '{table}' failed: {message}")]
    Batch { table: String, message: String },

    /// A query could not be executed
    #[error("Query error: {0}")]
    Query(String),

    /// The referenced table does not exist
    #[error("Unknown table: {0}")]
    UnknownTable(String),
}

impl DatabaseError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            DatabaseError::Connection(msg) => format!(
                "Cannot open the audit database: {msg}\n\nHint: Check [database] path in the configuration."
            ),
            DatabaseError::NotConnected => {
                "Audit database is not connected.\n\nHint: This is an internal sequencing error."
                    .to_string()
            }
            DatabaseError::Batch { table, message } => format!(
                "Loading '{table}' failed and the batch was rolled back: {message}\n\n\
                Hint: Re-run the job; tables are reloaded idempotently."
            ),
            _ => self.to_string(),
        }
    }
}

#[cfg(feature = "duckdb-backend")]
impl From<duckdb::Error> for DatabaseError {
    fn from(err: duckdb::Error) -> Self {
        DatabaseError::Query(err.to_string())
    }
}
