// conmon-core/src/infrastructure/adapters/flatfile/filter.rs

use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;

use crate::domain::check::compare::{ordering, values_equal};
use crate::domain::check::path::step;
use crate::domain::query::{Condition, Filter, OrderBy, Row, SortOrder};
use crate::infrastructure::error::InfrastructureError;

enum Pattern {
    Exact(Value),
    Glob(Regex),
}

impl Pattern {
    fn new(value: &Value) -> Result<Self, InfrastructureError> {
        match value {
            Value::String(s) if s.contains('*') => {
                let body = s
                    .split('*')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(".*");
                Regex::new(&format!("^{}$", body))
                    .map(Pattern::Glob)
                    .map_err(|e| InfrastructureError::ConfigError(e.to_string()))
            }
            other => Ok(Pattern::Exact(other.clone())),
        }
    }

    fn matches(&self, actual: &Value) -> bool {
        match self {
            Pattern::Glob(re) => !actual.is_null() && re.is_match(&text(actual)),
            // Egalité lâche: "12" == 12 (ids stockés en texte)
            Pattern::Exact(expected) => {
                values_equal(actual, expected) || (!actual.is_null() && text(actual) == text(expected))
            }
        }
    }
}

enum Matcher {
    IsNull,
    AnyOf(Vec<Pattern>),
}

/// Where clause compiled against nested (unflattened) rows.
pub struct RowFilter {
    column: String,
    matcher: Matcher,
}

impl RowFilter {
    pub fn compile(conditions: &[Condition]) -> Result<Vec<Self>, InfrastructureError> {
        conditions
            .iter()
            .map(|c| {
                let matcher = match &c.filter {
                    Filter::IsNull => Matcher::IsNull,
                    Filter::Eq(v) => Matcher::AnyOf(vec![Pattern::new(v)?]),
                    Filter::OneOf(vs) => {
                        Matcher::AnyOf(vs.iter().map(Pattern::new).collect::<Result<_, _>>()?)
                    }
                };
                Ok(RowFilter {
                    column: c.column.clone(),
                    matcher,
                })
            })
            .collect()
    }

    pub fn matches(&self, row: &Row) -> bool {
        let actual = resolve(row, &self.column);
        match &self.matcher {
            Matcher::IsNull => actual.is_null(),
            Matcher::AnyOf(patterns) => patterns.iter().any(|p| p.matches(&actual)),
        }
    }
}

pub fn matches_all(filters: &[RowFilter], row: &Row) -> bool {
    filters.iter().all(|f| f.matches(row))
}

/// Dot-path lookup; absent is null.
pub fn resolve(row: &Row, column: &str) -> Value {
    if let Some(v) = row.get(column) {
        return v.clone();
    }
    let mut segments = column.split('.');
    let Some(first) = segments.next().and_then(|s| row.get(s)) else {
        return Value::Null;
    };
    let mut current = first.clone();
    for segment in segments {
        match step(&current, segment) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current
}

/// Stable sort; nulls last in both directions.
pub fn sort_rows<T>(items: &mut [(Row, T)], order: &OrderBy) {
    items.sort_by(|(a, _), (b, _)| {
        let (x, y) = (resolve(a, &order.column), resolve(b, &order.column));
        match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ord = ordering(&x, &y).unwrap_or_else(|| text(&x).cmp(&text(&y)));
                match order.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            }
        }
    });
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
