// conmon-core/src/domain/check/mod.rs

//! Check model: what a check asks of a resource and what it got back.

pub mod aggregate;
pub mod compare;
pub mod control;
pub mod definition;
pub mod evaluate;
pub mod messages;
pub mod operation;
pub mod path;
pub mod predicate;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub use aggregate::{AggregateResult, Classification, ErrorPolicy};
pub use control::ControlCheckMapping;
pub use definition::{BacklogEntry, CheckDefinition, CheckMetadata};
pub use evaluate::evaluate;
pub use messages::OutputStatements;
pub use operation::ComparisonOperation;
pub use path::{FieldPath, Resource, ResourceRecord};
pub use predicate::{Predicate, PredicateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A declarative rule: the value at `field_path` must satisfy `operation`
/// against `expected_value`.
///
/// Checks are replaced as a whole, never patched in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub severity: Severity,
    pub tags: Vec<String>,
    pub field_path: FieldPath,
    pub operation: ComparisonOperation,
    pub expected_value: Value,
    pub output_statements: Option<OutputStatements>,
    pub fix_details: Option<Value>,
}

impl Check {
    pub fn new(
        id: i64,
        name: impl Into<String>,
        field_path: FieldPath,
        operation: ComparisonOperation,
        expected_value: Value,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            category: String::new(),
            severity: Severity::default(),
            tags: Vec::new(),
            field_path,
            operation,
            expected_value,
            output_statements: None,
            fix_details: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// Outcome of one check on one resource. Never persisted as such.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub resource_id: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub actual: Option<Value>,
}

impl CheckResult {
    pub fn failed_with(resource_id: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            resource_id: resource_id.into(),
            passed: false,
            message: None,
            error: Some(error.to_string()),
            actual: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
