// conmon-core/src/domain/check/operation.rs

use std::fmt;
use std::sync::Arc;

use super::predicate::Predicate;
use crate::domain::error::DomainError;

/// Closed set of comparisons a check may apply.
///
/// `Custom` carries a compiled predicate. It stays `None` until one is
/// attached; evaluating a check in that state is a configuration error.
#[derive(Debug, Clone)]
pub enum ComparisonOperation {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Contains,
    NotContains,
    Custom(Option<Arc<Predicate>>),
}

impl ComparisonOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Equal => "EQUAL",
            Self::NotEqual => "NOT_EQUAL",
            Self::LessThan => "LESS_THAN",
            Self::GreaterThan => "GREATER_THAN",
            Self::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            Self::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            Self::Contains => "CONTAINS",
            Self::NotContains => "NOT_CONTAINS",
            Self::Custom(_) => "CUSTOM",
        }
    }

    /// Accepts the canonical names in any case, plus the usual symbolic aliases.
    pub fn from_name(name: &str) -> Result<Self, DomainError> {
        let normalized = name.trim().to_lowercase().replace(['-', ' '], "_");
        let op = match normalized.as_str() {
            "equal" | "equals" | "eq" | "==" => Self::Equal,
            "not_equal" | "not_equals" | "ne" | "!=" => Self::NotEqual,
            "less_than" | "lt" | "<" => Self::LessThan,
            "greater_than" | "gt" | ">" => Self::GreaterThan,
            "less_than_or_equal" | "lte" | "le" | "<=" => Self::LessThanOrEqual,
            "greater_than_or_equal" | "gte" | "ge" | ">=" => Self::GreaterThanOrEqual,
            "contains" | "in" => Self::Contains,
            "not_contains" | "not_in" => Self::NotContains,
            "custom" => Self::Custom(None),
            _ => return Err(DomainError::UnsupportedOperation(name.to_string())),
        };
        Ok(op)
    }

    pub fn with_predicate(self, predicate: Predicate) -> Self {
        match self {
            Self::Custom(_) => Self::Custom(Some(Arc::new(predicate))),
            other => other,
        }
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        match self {
            Self::Custom(Some(p)) => Some(p.as_ref()),
            _ => None,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl PartialEq for ComparisonOperation {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Custom(a), Self::Custom(b)) => {
                a.as_ref().map(|p| p.source()) == b.as_ref().map(|p| p.source())
            }
            _ => self.name() == other.name(),
        }
    }
}

impl fmt::Display for ComparisonOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
