// conmon-core/src/error.rs

use crate::domain::error::DomainError;
use crate::infrastructure::error::InfrastructureError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConmonError {
    // --- ERREURS DU DOMAINE (Queries, Checks, Predicates) ---
    #[error(transparent)]
    Domain(#[from] DomainError),

    // --- ERREURS D'INFRASTRUCTURE (IO, Pool, Parsing) ---
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    // --- ERREURS GÉNÉRIQUES / APPLICATIVES ---
    #[error("Internal Error: {0}")]
    InternalError(String),

    #[error("Bulk write stopped at batch {failed_batch} after {committed_batches} committed batch(es): {source}")]
    PartialBulkWrite {
        committed_batches: usize,
        failed_batch: usize,
        #[source]
        source: Box<ConmonError>,
    },
}

// Manual implementation to avoid duplicate enum variant but keep ergonomics
impl From<std::io::Error> for ConmonError {
    fn from(err: std::io::Error) -> Self {
        ConmonError::Infrastructure(InfrastructureError::Io(err))
    }
}

impl From<serde_json::Error> for ConmonError {
    fn from(err: serde_json::Error) -> Self {
        ConmonError::Infrastructure(InfrastructureError::Json(err))
    }
}

impl From<postgres::Error> for ConmonError {
    fn from(err: postgres::Error) -> Self {
        ConmonError::Infrastructure(InfrastructureError::from(err))
    }
}

impl From<r2d2::Error> for ConmonError {
    fn from(err: r2d2::Error) -> Self {
        ConmonError::Infrastructure(InfrastructureError::from(err))
    }
}

impl ConmonError {
    /// Configuration errors (query guards, invalid checks) as opposed to
    /// runtime failures of a backend.
    pub fn is_configuration(&self) -> bool {
        match self {
            ConmonError::Domain(e) => e.is_configuration(),
            _ => false,
        }
    }
}
