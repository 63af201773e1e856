// conmon-core/src/ports/store.rs

// Ce fichier définit ce dont le cœur a besoin pour persister, sans savoir comment.
// Deux adaptateurs le branchent : un répertoire de fichiers CSV et un serveur Postgres.

use async_trait::async_trait;

use crate::domain::query::{Query, Row};
use crate::domain::result::ResultRecord;
use crate::error::ConmonError;

// Struct simple pour décrire une colonne (indépendant du backend)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
}

/// CRUD capability set shared by every storage backend.
///
/// Mutations return the affected rows (new state for insert/update, old state
/// for delete). Every call is bounded by the backend's deadline.
///
/// The deadline stops the wait, not the work: a mutation that already reached
/// the backend may still commit after the caller got
/// `InfrastructureError::TimedOutMayHaveCommitted`. A plain `Timeout` means
/// nothing was written.
#[async_trait]
pub trait Store: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn select(&self, query: &Query) -> Result<Vec<Row>, ConmonError>;

    async fn insert(&self, query: &Query) -> Result<Vec<Row>, ConmonError>;

    /// Without conditions every row is updated.
    async fn update(&self, query: &Query) -> Result<Vec<Row>, ConmonError>;

    async fn delete(&self, query: &Query) -> Result<Vec<Row>, ConmonError>;

    /// Columns of `table` in schema order. Empty when the table does not exist.
    async fn columns(&self, table: &str) -> Result<Vec<ColumnSchema>, ConmonError>;

    /// Writes one batch of results, all-or-nothing: history insert, then
    /// current-state delete by key, then current-state insert.
    async fn commit_result_batch(&self, records: &[ResultRecord]) -> Result<(), ConmonError>;
}
