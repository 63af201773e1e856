// conmon-core/src/domain/check/messages.rs

//! Result message templates.
//!
//! Presentation only: a lookup keyed on (operation family, keyword) picks a
//! phrase, the classification picks the sentence. A check's own
//! `output_statements` win over the table. Templates are Jinja text and are
//! rendered by the application layer.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::aggregate::{AggregateResult, Classification};
use super::{Check, ComparisonOperation};

/// Per-check overrides, stored in `checks.output_statements`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputStatements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutputStatements {
    pub fn for_classification(&self, classification: Classification) -> Option<&str> {
        match classification {
            Classification::Success => self.success.as_deref(),
            Classification::Partial => self.partial.as_deref(),
            Classification::Fail => self.failure.as_deref(),
            Classification::Error => self.error.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationFamily {
    Equality,
    Threshold,
    Membership,
    Custom,
}

impl From<&ComparisonOperation> for OperationFamily {
    fn from(op: &ComparisonOperation) -> Self {
        match op {
            ComparisonOperation::Equal | ComparisonOperation::NotEqual => Self::Equality,
            ComparisonOperation::LessThan
            | ComparisonOperation::GreaterThan
            | ComparisonOperation::LessThanOrEqual
            | ComparisonOperation::GreaterThanOrEqual => Self::Threshold,
            ComparisonOperation::Contains | ComparisonOperation::NotContains => Self::Membership,
            ComparisonOperation::Custom(_) => Self::Custom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Encrypted,
    Protected,
    Enabled,
    Logging,
    Rotation,
    Public,
    Generic,
}

// Ordre important: "encryption enabled" doit donner Encrypted.
const KEYWORDS: &[(&str, Keyword)] = &[
    ("encrypt", Keyword::Encrypted),
    ("protect", Keyword::Protected),
    ("public", Keyword::Public),
    ("rotat", Keyword::Rotation),
    ("logging", Keyword::Logging),
    ("enabled", Keyword::Enabled),
];

impl Keyword {
    pub fn detect(check: &Check) -> Self {
        let haystack = format!("{} {} {}", check.name, check.description, check.category)
            .to_lowercase();
        KEYWORDS
            .iter()
            .find(|(needle, _)| haystack.contains(needle))
            .map(|(_, k)| *k)
            .unwrap_or(Keyword::Generic)
    }
}

fn phrase(family: OperationFamily, keyword: Keyword) -> &'static str {
    use Keyword::*;
    use OperationFamily::*;
    match (family, keyword) {
        (Custom, _) => "compliant with the custom rule",
        (_, Encrypted) => "encrypted",
        (_, Protected) => "protected",
        (_, Public) => "restricted from public access",
        (_, Logging) => "logging as required",
        (Threshold, Rotation) => "rotated within {{ check.expected }}",
        (_, Rotation) => "configured for rotation",
        (_, Enabled) => "enabled",
        (Threshold, Generic) => "within the {{ check.operation }} {{ check.expected }} threshold",
        (Membership, Generic) => "configured with the expected value",
        (Equality, Generic) => "compliant",
    }
}

/// Template for `classification`: the check override if any, else the table.
pub fn template_for(check: &Check, classification: Classification) -> String {
    if let Some(custom) = check
        .output_statements
        .as_ref()
        .and_then(|o| o.for_classification(classification))
    {
        return custom.to_string();
    }
    builtin_template(check, classification)
}

/// Template from the (operation family, keyword) table, ignoring overrides.
pub fn builtin_template(check: &Check, classification: Classification) -> String {
    let p = phrase(
        OperationFamily::from(&check.operation),
        Keyword::detect(check),
    );
    match classification {
        Classification::Success => format!(
            "{{% if total == 0 %}}No resources to evaluate for '{{{{ check.name }}}}'.{{% else %}}All {{{{ total }}}} resources are {p}.{{% endif %}}"
        ),
        Classification::Partial => format!(
            "{{{{ passed }}}} of {{{{ total }}}} resources are {p} ({{{{ percentage }}}}%); {{{{ failed }}}} are not."
        ),
        Classification::Fail => format!("None of the {{{{ total }}}} resources are {p}."),
        Classification::Error => "{{ errored }} of {{ total }} resources could not be evaluated for '{{ check.name }}'.".to_string(),
    }
}

/// Values available to every template.
pub fn context(check: &Check, aggregate: &AggregateResult) -> Value {
    json!({
        "check": {
            "id": check.id,
            "name": check.name,
            "category": check.category,
            "severity": check.severity,
            "operation": check.operation.name(),
            "expected": check.expected_value,
            "field_path": check.field_path.as_str(),
        },
        "passed": aggregate.passed,
        "failed": aggregate.failed,
        "errored": aggregate.errored,
        "total": aggregate.total,
        "percentage": aggregate.success_percentage(),
    })
}
