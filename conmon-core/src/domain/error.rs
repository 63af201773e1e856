// conmon-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::check::predicate::PredicateError;

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    // --- CONFIGURATION (fail fast, at call time) ---
    #[error("Refusing to build an unconditional DELETE on '{table}'")]
    #[diagnostic(
        code(conmon::domain::query::missing_where),
        help("Pass at least one column in the where mapping. Unconditional deletes are never built.")
    )]
    MissingWhereClause { table: String },

    #[error("UPDATE on '{table}' has no column to set")]
    #[diagnostic(
        code(conmon::domain::query::missing_values),
        help("Pass a non-empty update mapping (column -> value).")
    )]
    MissingUpdateValues { table: String },

    #[error("Check '{check}' uses the CUSTOM operation but no predicate is attached")]
    #[diagnostic(
        code(conmon::domain::check::missing_predicate),
        help("Attach a `custom_logic` expression to the check definition.")
    )]
    MissingPredicate { check: String },

    #[error("Unsupported comparison operation: '{0}'")]
    #[diagnostic(code(conmon::domain::check::operation))]
    UnsupportedOperation(String),

    #[error("Invalid field path: '{0}'")]
    #[diagnostic(code(conmon::domain::check::field_path))]
    InvalidFieldPath(String),

    #[error("Invalid check definition: {0}")]
    #[diagnostic(code(conmon::domain::check::definition))]
    InvalidCheck(String),

    // --- RESOLUTION (recorded per resource) ---
    #[error("Field '{segment}' not found while resolving '{path}'")]
    #[diagnostic(code(conmon::domain::check::field_not_found))]
    FieldNotFound { path: String, segment: String },

    // --- COMPARISON (recorded per resource) ---
    #[error("Cannot apply {operation} to {actual} and {expected}")]
    #[diagnostic(code(conmon::domain::check::type_mismatch))]
    TypeMismatch {
        operation: String,
        actual: String,
        expected: String,
    },

    #[error(transparent)]
    #[diagnostic(code(conmon::domain::check::predicate))]
    Predicate(#[from] PredicateError),
}

impl DomainError {
    /// Configuration errors abort the call; everything else is recorded on a result.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingWhereClause { .. }
                | Self::MissingUpdateValues { .. }
                | Self::MissingPredicate { .. }
                | Self::UnsupportedOperation(_)
                | Self::InvalidFieldPath(_)
                | Self::InvalidCheck(_)
        )
    }
}
