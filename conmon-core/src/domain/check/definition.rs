// conmon-core/src/domain/check/definition.rs

//! Declarative check definitions, as written in YAML or stored in the
//! `checks` table (`metadata` column), and their compilation into [`Check`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use super::messages::OutputStatements;
use super::operation::ComparisonOperation;
use super::path::FieldPath;
use super::predicate::Predicate;
use super::{Check, Severity};
use crate::domain::error::DomainError;
use crate::domain::query::Row;

pub const CHECKS_TABLE: &str = "checks";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct OperationSpec {
    #[validate(length(min = 1, message = "Operation name cannot be empty"))]
    pub name: String,
    /// Predicate source, only meaningful for `CUSTOM`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_logic: Option<String>,
}

/// Evaluation half of a check, persisted as `checks.metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CheckMetadata {
    #[validate(length(min = 1, message = "Field path cannot be empty"))]
    pub field_path: String,

    #[validate(nested)]
    pub operation: OperationSpec,

    #[serde(default)]
    pub expected_value: Value,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CheckDefinition {
    #[validate(range(min = 1, message = "Check id must be positive"))]
    pub id: i64,

    #[validate(length(min = 1, message = "Check name cannot be empty"))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub category: String,

    #[serde(flatten)]
    #[validate(nested)]
    pub metadata: CheckMetadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_statements: Option<OutputStatements>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_details: Option<Value>,
}

/// A custom snippet that could not be compiled and needs a manual rewrite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacklogEntry {
    pub check_id: i64,
    pub check_name: String,
    pub snippet: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct CompiledCheck {
    pub check: Check,
    pub backlog: Option<BacklogEntry>,
}

impl CheckDefinition {
    /// Validates and compiles the definition.
    ///
    /// A custom snippet that fails to compile does not fail the load: the
    /// check keeps `CUSTOM` without a predicate and the snippet goes to the
    /// backlog. Everything else malformed is a configuration error.
    pub fn compile(self) -> Result<CompiledCheck, DomainError> {
        self.validate()
            .map_err(|e| DomainError::InvalidCheck(format!("'{}': {}", self.name, e)))?;

        let field_path: FieldPath = self.metadata.field_path.parse()?;
        let mut operation = ComparisonOperation::from_name(&self.metadata.operation.name)?;
        let mut backlog = None;

        match (&self.metadata.operation.custom_logic, operation.is_custom()) {
            (Some(snippet), true) => match Predicate::compile(snippet) {
                Ok(predicate) => operation = operation.with_predicate(predicate),
                Err(e) => {
                    backlog = Some(BacklogEntry {
                        check_id: self.id,
                        check_name: self.name.clone(),
                        snippet: snippet.clone(),
                        reason: e.to_string(),
                    })
                }
            },
            (Some(_), false) => {
                return Err(DomainError::InvalidCheck(format!(
                    "'{}': custom_logic is only allowed with the CUSTOM operation",
                    self.name
                )));
            }
            (None, _) => {}
        }

        let check = Check {
            id: self.id,
            name: self.name,
            description: self.description,
            category: self.category,
            severity: self.metadata.severity,
            tags: self.metadata.tags,
            field_path,
            operation,
            expected_value: self.metadata.expected_value,
            output_statements: self.output_statements,
            fix_details: self.fix_details,
        };
        Ok(CompiledCheck { check, backlog })
    }

    pub fn from_check(check: &Check) -> Self {
        Self {
            id: check.id,
            name: check.name.clone(),
            description: check.description.clone(),
            category: check.category.clone(),
            metadata: CheckMetadata {
                field_path: check.field_path.to_string(),
                operation: OperationSpec {
                    name: check.operation.name().to_string(),
                    custom_logic: check.operation.predicate().map(|p| p.source().to_string()),
                },
                expected_value: check.expected_value.clone(),
                tags: check.tags.clone(),
                severity: check.severity,
            },
            output_statements: check.output_statements.clone(),
            fix_details: check.fix_details.clone(),
        }
    }

    /// Reads a `checks` row. JSON columns may arrive decoded or as text and
    /// the id may be text (flat-file `checks` table).
    pub fn from_row(row: &Row) -> Result<Self, DomainError> {
        let invalid = |what: &str| DomainError::InvalidCheck(format!("{CHECKS_TABLE} row: {what}"));

        let id = match row.get("id") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| invalid("id is missing or not an integer"))?;

        let text = |name: &str| -> String {
            row.get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let metadata: CheckMetadata = json_column(row, "metadata")
            .ok_or_else(|| invalid("metadata is missing"))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| invalid(&format!("metadata: {e}")))
            })?;
        let output_statements = match json_column(row, "output_statements") {
            Some(v) => Some(
                serde_json::from_value(v)
                    .map_err(|e| invalid(&format!("output_statements: {e}")))?,
            ),
            None => None,
        };

        Ok(Self {
            id,
            name: text("name"),
            description: text("description"),
            category: text("category"),
            metadata,
            output_statements,
            fix_details: json_column(row, "fix_details"),
        })
    }

    /// Columns owned by the definition. Audit columns are left to the caller.
    pub fn to_row(&self) -> Result<Row, DomainError> {
        let mut row = Row::new();
        row.insert("id".into(), Value::from(self.id));
        row.insert("name".into(), Value::String(self.name.clone()));
        row.insert("description".into(), Value::String(self.description.clone()));
        row.insert("category".into(), Value::String(self.category.clone()));
        row.insert(
            "metadata".into(),
            serde_json::to_value(&self.metadata).map_err(|e| DomainError::InvalidCheck(e.to_string()))?,
        );
        row.insert(
            "output_statements".into(),
            serde_json::to_value(&self.output_statements)
                .map_err(|e| DomainError::InvalidCheck(e.to_string()))?,
        );
        row.insert(
            "fix_details".into(),
            self.fix_details.clone().unwrap_or(Value::Null),
        );
        Ok(row)
    }
}

/// `None` for absent or null columns; JSON text is decoded.
fn json_column(row: &Row, name: &str) -> Option<Value> {
    match row.get(name)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => serde_json::from_str(s).ok(),
        other => Some(other.clone()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const YAML: &str = r#"
id: 12
name: kms_key_rotation
category: Encryption
field_path: rotation.period_days
operation:
  name: less_than_or_equal
expected_value: 90
tags: [kms, pci]
severity: high
"#;

    #[test]
    fn test_compile_from_yaml() {
        let def: CheckDefinition = serde_yaml::from_str(YAML).unwrap();
        let compiled = def.compile().unwrap();
        assert!(compiled.backlog.is_none());
        let check = compiled.check;
        assert_eq!(check.operation, ComparisonOperation::LessThanOrEqual);
        assert_eq!(check.severity, Severity::High);
        assert_eq!(check.tags, vec!["kms", "pci"]);
        assert_eq!(check.expected_value, json!(90));
    }

    #[test]
    fn test_unsupported_operation_fails_the_load() {
        let yaml = YAML.replace("less_than_or_equal", "about_equal");
        let def: CheckDefinition = serde_yaml::from_str(&yaml).unwrap();
        assert!(matches!(def.compile(), Err(DomainError::UnsupportedOperation(_))));
    }

    #[test]
    fn test_validation_rejects_empty_name() {
        let yaml = YAML.replace("name: kms_key_rotation", "name: \"\"");
        let def: CheckDefinition = serde_yaml::from_str(&yaml).unwrap();
        assert!(matches!(def.compile(), Err(DomainError::InvalidCheck(_))));
    }

    #[test]
    fn test_bad_snippet_goes_to_backlog() {
        let yaml = YAML.replace(
            "  name: less_than_or_equal",
            "  name: CUSTOM\n  custom_logic: \"all(x > 1 for x in actual)\"",
        );
        let def: CheckDefinition = serde_yaml::from_str(&yaml).unwrap();
        let compiled = def.compile().unwrap();

        let entry = compiled.backlog.unwrap();
        assert_eq!(entry.check_id, 12);
        assert_eq!(entry.snippet, "all(x > 1 for x in actual)");
        assert_eq!(compiled.check.operation, ComparisonOperation::Custom(None));
    }

    #[test]
    fn test_good_snippet_is_attached() {
        let yaml = YAML.replace(
            "  name: less_than_or_equal",
            "  name: CUSTOM\n  custom_logic: \"actual <= expected && actual > 0\"",
        );
        let compiled = serde_yaml::from_str::<CheckDefinition>(&yaml)
            .unwrap()
            .compile()
            .unwrap();
        assert!(compiled.backlog.is_none());
        assert!(compiled.check.operation.predicate().is_some());
    }

    #[test]
    fn test_row_round_trip_with_text_id() {
        let def: CheckDefinition = serde_yaml::from_str(YAML).unwrap();
        let mut row = def.to_row().unwrap();
        row.insert("id".into(), json!("12"));
        row.insert(
            "metadata".into(),
            Value::String(serde_json::to_string(&def.metadata).unwrap()),
        );
        assert_eq!(CheckDefinition::from_row(&row).unwrap(), def);
    }

    #[test]
    fn test_from_check_keeps_predicate_source() {
        let yaml = YAML.replace(
            "  name: less_than_or_equal",
            "  name: CUSTOM\n  custom_logic: \"actual <= expected\"",
        );
        let check = serde_yaml::from_str::<CheckDefinition>(&yaml)
            .unwrap()
            .compile()
            .unwrap()
            .check;
        let def = CheckDefinition::from_check(&check);
        assert_eq!(def.metadata.operation.name, "CUSTOM");
        assert_eq!(def.metadata.operation.custom_logic.as_deref(), Some("actual <= expected"));
    }
}
