// conmon-core/src/infrastructure/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DatabaseError {
    #[error("Postgres Error: {0}")]
    #[diagnostic(
        code(conmon::infra::database::postgres),
        help("An error occurred inside the SQL server or on the wire.")
    )]
    Postgres(#[from] postgres::Error),

    #[error("Connection Pool Error: {0}")]
    #[diagnostic(
        code(conmon::infra::database::pool),
        help("The pool could not hand out a connection (exhausted or server unreachable).")
    )]
    Pool(#[from] r2d2::Error),
}

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    // --- DATABASE (Abstracted) ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DatabaseError),

    #[error("Relational store unavailable: {0}")]
    #[diagnostic(
        code(conmon::infra::database::unavailable),
        help("The connection pool could not be built at startup. Check the connection string and that the server is reachable.")
    )]
    PoolUnavailable(String),

    #[error("Deadline exceeded after {after_ms} ms during {operation}")]
    #[diagnostic(code(conmon::infra::timeout))]
    Timeout { operation: String, after_ms: u64 },

    #[error("Deadline exceeded after {after_ms} ms during {operation}; the write had started and may still commit")]
    #[diagnostic(
        code(conmon::infra::timeout_in_flight),
        help("The blocking work cannot be cancelled. Read the target back before retrying.")
    )]
    TimedOutMayHaveCommitted { operation: String, after_ms: u64 },

    // --- FILESYSTEM (IO) ---
    #[error("File System Error: {0}")]
    #[diagnostic(
        code(conmon::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    #[error("CSV Error: {0}")]
    #[diagnostic(code(conmon::infra::csv))]
    Csv(#[from] csv::Error),

    #[error("Table file '{0}' is corrupt")]
    #[diagnostic(
        code(conmon::infra::flatfile::corrupt),
        help("Restore the table from its most recent `.bak_<timestamp>` backup.")
    )]
    CorruptTable(String),

    #[error("Unknown column '{column}' in table '{table}'")]
    #[diagnostic(code(conmon::infra::flatfile::column))]
    UnknownColumn { table: String, column: String },

    // --- CONFIG / YAML / JSON ---
    #[error("YAML Parsing Error: {0}")]
    #[diagnostic(
        code(conmon::infra::yaml),
        help("Check your YAML syntax (indentation, types).")
    )]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON Error: {0}")]
    #[diagnostic(code(conmon::infra::json))]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    #[diagnostic(code(conmon::infra::config))]
    ConfigError(String),

    #[error("Project configuration not found at '{0}'")]
    #[diagnostic(code(conmon::infra::config_missing))]
    ConfigNotFound(String),

    // --- TEMPLATING ---
    #[error("Template Rendering Error: {0}")]
    #[diagnostic(
        code(conmon::infra::template),
        help("Check the Jinja syntax ({{ ... }}) of the result message template.")
    )]
    TemplateError(#[from] minijinja::Error),

    #[error("Background task failed: {0}")]
    #[diagnostic(code(conmon::infra::task))]
    Task(String),
}

impl InfrastructureError {
    /// Deadline error for a call. A write whose blocking work already started
    /// keeps running after the deadline, so it is reported apart.
    pub fn deadline(operation: &str, after: std::time::Duration, write_in_flight: bool) -> Self {
        let operation = operation.to_string();
        let after_ms = after.as_millis() as u64;
        if write_in_flight {
            InfrastructureError::TimedOutMayHaveCommitted { operation, after_ms }
        } else {
            InfrastructureError::Timeout { operation, after_ms }
        }
    }
}

// Manual implementation for shortcuts (e.g. `?` operator on postgres calls)
impl From<postgres::Error> for InfrastructureError {
    fn from(err: postgres::Error) -> Self {
        InfrastructureError::Database(DatabaseError::Postgres(err))
    }
}

impl From<r2d2::Error> for InfrastructureError {
    fn from(err: r2d2::Error) -> Self {
        InfrastructureError::Database(DatabaseError::Pool(err))
    }
}

impl From<tokio::task::JoinError> for InfrastructureError {
    fn from(err: tokio::task::JoinError) -> Self {
        InfrastructureError::Task(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_deadline_tells_in_flight_writes_apart() {
        let after = Duration::from_millis(250);
        assert!(matches!(
            InfrastructureError::deadline("postgres.insert", after, true),
            InfrastructureError::TimedOutMayHaveCommitted { ref operation, after_ms: 250 } if operation == "postgres.insert"
        ));
        assert!(matches!(
            InfrastructureError::deadline("postgres.select", after, false),
            InfrastructureError::Timeout { after_ms: 250, .. }
        ));
    }
}
