// conmon-core/src/domain/query/file.rs

use super::{Condition, Operation, OrderBy, Query, QueryBackend, Row};
use crate::domain::error::DomainError;

/// Structured operation interpreted directly by the flat-file engine.
/// No SQL text is produced for this backend.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOperation {
    Select {
        table: String,
        select: Vec<String>,
        conditions: Vec<Condition>,
        order_by: Option<OrderBy>,
    },
    Insert {
        table: String,
        values: Row,
    },
    Update {
        table: String,
        values: Row,
        conditions: Vec<Condition>,
    },
    Delete {
        table: String,
        conditions: Vec<Condition>,
    },
}

impl FileOperation {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Select { .. } => Operation::Select,
            Self::Insert { .. } => Operation::Insert,
            Self::Update { .. } => Operation::Update,
            Self::Delete { .. } => Operation::Delete,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Self::Select { table, .. }
            | Self::Insert { table, .. }
            | Self::Update { table, .. }
            | Self::Delete { table, .. } => table,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FileDialect;

impl QueryBackend for FileDialect {
    type Unit = FileOperation;

    fn select(&self, query: &Query) -> Result<FileOperation, DomainError> {
        query.validate(Operation::Select)?;
        Ok(FileOperation::Select {
            table: query.table_name().to_string(),
            select: query.columns().to_vec(),
            conditions: query.conditions().to_vec(),
            order_by: query.ordering().cloned(),
        })
    }

    fn insert(&self, query: &Query) -> Result<FileOperation, DomainError> {
        query.validate(Operation::Insert)?;
        Ok(FileOperation::Insert {
            table: query.table_name().to_string(),
            values: query.update_values().clone(),
        })
    }

    fn update(&self, query: &Query) -> Result<FileOperation, DomainError> {
        query.validate(Operation::Update)?;
        Ok(FileOperation::Update {
            table: query.table_name().to_string(),
            values: query.update_values().clone(),
            conditions: query.conditions().to_vec(),
        })
    }

    fn delete(&self, query: &Query) -> Result<FileOperation, DomainError> {
        query.validate(Operation::Delete)?;
        Ok(FileOperation::Delete {
            table: query.table_name().to_string(),
            conditions: query.conditions().to_vec(),
        })
    }
}
