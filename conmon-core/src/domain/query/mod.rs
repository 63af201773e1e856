// conmon-core/src/domain/query/mod.rs

//! Backend-neutral description of a CRUD request.
//!
//! A [`Query`] only records *what* is asked (table, projection, values,
//! filters, ordering). Turning it into something executable is the job of a
//! [`QueryBackend`]: [`sql::PostgresDialect`] renders a parameterized
//! statement, [`file::FileDialect`] a structured operation descriptor.
//!
//! Two guards are enforced for every backend, before any rendering:
//! - `delete` needs a non-empty where mapping,
//! - `update` needs a non-empty update mapping.

pub mod file;
pub mod sql;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::DomainError;

pub use file::{FileDialect, FileOperation};
pub use sql::{PostgresDialect, SqlStatement};

/// One table row: column name -> value, in insertion order.
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub order: SortOrder,
}

/// Filter applied to a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = value`
    Eq(Value),
    /// `column IN (...)`. An empty set matches nothing.
    OneOf(Vec<Value>),
    /// `column IS NULL`
    IsNull,
}

impl From<Value> for Filter {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Filter::IsNull,
            Value::Array(items) => Filter::OneOf(items),
            other => Filter::Eq(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub filter: Filter,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    table: String,
    columns: Vec<String>,
    values: Row,
    conditions: Vec<Condition>,
    order_by: Option<OrderBy>,
}

impl Query {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table: name.into(),
            ..Self::default()
        }
    }

    /// Builds a query from the three optional mappings callers usually hold:
    /// a projection, an update mapping and a where mapping.
    pub fn new(
        table: impl Into<String>,
        columns: Option<Vec<String>>,
        values: Option<Row>,
        where_map: Option<Row>,
    ) -> Self {
        let mut query = Self::table(table);
        if let Some(columns) = columns {
            query.columns = columns;
        }
        if let Some(values) = values {
            query.values = values;
        }
        if let Some(where_map) = where_map {
            query = query.where_map(where_map);
        }
        query
    }

    pub fn select_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    pub fn values(mut self, values: Row) -> Self {
        self.values = values;
        self
    }

    /// Adds a filter: a sequence means "is one of", `null` means "IS NULL".
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            filter: Filter::from(value.into()),
        });
        self
    }

    pub fn where_map(mut self, where_map: Row) -> Self {
        for (column, value) in where_map {
            self = self.filter(column, value);
        }
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = Some(OrderBy {
            column: column.into(),
            order,
        });
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn update_values(&self) -> &Row {
        &self.values
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn ordering(&self) -> Option<&OrderBy> {
        self.order_by.as_ref()
    }

    /// Guards shared by every backend.
    pub fn validate(&self, operation: Operation) -> Result<(), DomainError> {
        match operation {
            Operation::Update if self.values.is_empty() => Err(DomainError::MissingUpdateValues {
                table: self.table.clone(),
            }),
            Operation::Delete if self.conditions.is_empty() => {
                Err(DomainError::MissingWhereClause {
                    table: self.table.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn build<B: QueryBackend>(
        &self,
        backend: &B,
        operation: Operation,
    ) -> Result<B::Unit, DomainError> {
        match operation {
            Operation::Select => backend.select(self),
            Operation::Insert => backend.insert(self),
            Operation::Update => backend.update(self),
            Operation::Delete => backend.delete(self),
        }
    }
}

/// Capability set every storage backend exposes to the query builder.
pub trait QueryBackend {
    type Unit;

    /// No projection means all columns.
    fn select(&self, query: &Query) -> Result<Self::Unit, DomainError>;

    /// An empty update mapping inserts a row of defaults.
    fn insert(&self, query: &Query) -> Result<Self::Unit, DomainError>;

    /// Without conditions the update touches EVERY row of the table. This is
    /// deliberate and dangerous: callers that mean "one row" must filter.
    fn update(&self, query: &Query) -> Result<Self::Unit, DomainError>;

    /// Never builds an unconditional delete.
    fn delete(&self, query: &Query) -> Result<Self::Unit, DomainError>;
}
