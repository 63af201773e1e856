// conmon-core/src/domain/check/path.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::DomainError;
use crate::domain::query::Row;

/// A resource produced by a collector.
///
/// Path resolution asks the record for its own typed fields first
/// ([`Resource::field`]) and falls back to its attribute map.
pub trait Resource {
    fn id(&self) -> &str;

    fn field(&self, _name: &str) -> Option<Value> {
        None
    }

    fn attribute(&self, name: &str) -> Option<&Value>;

    fn resolve_root(&self, name: &str) -> Option<Value> {
        self.field(name).or_else(|| self.attribute(name).cloned())
    }
}

/// Generic collector output: a stable id, an optional type and free-form attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(flatten)]
    pub attributes: Row,
}

impl ResourceRecord {
    pub fn new(id: impl Into<String>, attributes: Row) -> Self {
        Self {
            id: id.into(),
            resource_type: None,
            attributes,
        }
    }
}

impl Resource for ResourceRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.clone())),
            "type" | "resource_type" => self.resource_type.clone().map(Value::String),
            _ => None,
        }
    }

    fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Dot-separated path, optionally wrapped as `len(a.b)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
    length_of: bool,
}

impl FieldPath {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_length_of(&self) -> bool {
        self.length_of
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Resolves the path against a resource.
    pub fn extract(&self, resource: &dyn Resource) -> Result<Value, DomainError> {
        let value = self.resolve(resource)?;
        if self.length_of {
            return Ok(Value::from(length_of(&value)));
        }
        Ok(value)
    }

    fn resolve(&self, resource: &dyn Resource) -> Result<Value, DomainError> {
        let (root, rest) = self
            .segments
            .split_first()
            .ok_or_else(|| DomainError::InvalidFieldPath(self.raw.clone()))?;

        let mut current = resource
            .resolve_root(root)
            .ok_or_else(|| self.not_found(root))?;

        for segment in rest {
            current = step(&current, segment).ok_or_else(|| self.not_found(segment))?;
        }
        Ok(current)
    }

    fn not_found(&self, segment: &str) -> DomainError {
        DomainError::FieldNotFound {
            path: self.raw.clone(),
            segment: segment.to_string(),
        }
    }
}

/// Key lookup on maps, index lookup on sequences.
pub(crate) fn step(value: &Value, segment: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map.get(segment).cloned(),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .cloned(),
        _ => None,
    }
}

/// Values without a length concept measure 0.
pub(crate) fn length_of(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        _ => 0,
    }
}

impl FromStr for FieldPath {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let (inner, length_of) = match trimmed
            .strip_prefix("len(")
            .and_then(|s| s.strip_suffix(')'))
        {
            Some(inner) => (inner.trim(), true),
            None => (trimmed, false),
        };

        let segments: Vec<String> = inner.split('.').map(|s| s.trim().to_string()).collect();
        let malformed = |s: &String| s.is_empty() || s.contains(|c| c == '(' || c == ')');
        if inner.is_empty() || segments.iter().any(malformed) {
            return Err(DomainError::InvalidFieldPath(raw.to_string()));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
            length_of,
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
