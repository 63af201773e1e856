// conmon-core/src/domain/check/compare.rs

use serde_json::{Number, Value};
use std::cmp::Ordering;

use super::operation::ComparisonOperation;
use crate::domain::error::DomainError;

/// Applies `operation` to a resolved value.
///
/// Ordered operations only accept number/number or string/string pairs.
/// Membership operations fall back to `false` (CONTAINS) or `true`
/// (NOT_CONTAINS) when `actual` is not a collection.
pub fn compare(
    operation: &ComparisonOperation,
    actual: &Value,
    expected: &Value,
) -> Result<bool, DomainError> {
    match operation {
        ComparisonOperation::Equal => Ok(values_equal(actual, expected)),
        ComparisonOperation::NotEqual => Ok(!values_equal(actual, expected)),
        ComparisonOperation::LessThan => ordered(operation, actual, expected, Ordering::is_lt),
        ComparisonOperation::GreaterThan => ordered(operation, actual, expected, Ordering::is_gt),
        ComparisonOperation::LessThanOrEqual => {
            ordered(operation, actual, expected, Ordering::is_le)
        }
        ComparisonOperation::GreaterThanOrEqual => {
            ordered(operation, actual, expected, Ordering::is_ge)
        }
        ComparisonOperation::Contains => Ok(contains(actual, expected).unwrap_or(false)),
        ComparisonOperation::NotContains => Ok(!contains(actual, expected).unwrap_or(false)),
        ComparisonOperation::Custom(Some(predicate)) => Ok(predicate.evaluate(actual, expected)?),
        ComparisonOperation::Custom(None) => Err(DomainError::MissingPredicate {
            check: "custom".to_string(),
        }),
    }
}

fn ordered(
    operation: &ComparisonOperation,
    actual: &Value,
    expected: &Value,
    accept: fn(Ordering) -> bool,
) -> Result<bool, DomainError> {
    ordering(actual, expected)
        .map(accept)
        .ok_or_else(|| DomainError::TypeMismatch {
            operation: operation.name().to_string(),
            actual: type_name(actual).to_string(),
            expected: type_name(expected).to_string(),
        })
}

/// Structural equality where numbers compare by value (`1 == 1.0`).
/// Exact value of an integer number, signed or not.
fn integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (integer(x), integer(y)) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, x)| ym.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// `None` when the pair has no natural order.
pub(crate) fn ordering(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (integer(x), integer(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Membership test. `None` when `container` is not a collection.
pub(crate) fn contains(container: &Value, item: &Value) -> Option<bool> {
    match container {
        Value::Array(items) => Some(items.iter().any(|x| values_equal(x, item))),
        Value::String(haystack) => match item {
            Value::String(needle) => Some(haystack.contains(needle.as_str())),
            _ => Some(false),
        },
        Value::Object(map) => match item {
            Value::String(key) => Some(map.contains_key(key)),
            _ => Some(false),
        },
        _ => None,
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_large_integers_compare_exactly() {
        let a = json!(9_007_199_254_740_993_u64);
        let b = json!(9_007_199_254_740_992_u64);
        assert!(!compare(&ComparisonOperation::Equal, &a, &b).unwrap());
        assert!(compare(&ComparisonOperation::GreaterThan, &a, &b).unwrap());
        assert!(compare(&ComparisonOperation::GreaterThan, &json!(u64::MAX), &json!(u64::MAX - 1)).unwrap());
        assert!(compare(&ComparisonOperation::LessThan, &json!(i64::MIN), &json!(u64::MAX)).unwrap());
    }

    #[test]
    fn test_equality_is_numeric_aware() {
        assert!(compare(&ComparisonOperation::Equal, &json!(1), &json!(1.0)).unwrap());
        assert!(compare(&ComparisonOperation::Equal, &json!(true), &json!(true)).unwrap());
        assert!(compare(&ComparisonOperation::NotEqual, &json!("a"), &json!("b")).unwrap());
        assert!(
            compare(
                &ComparisonOperation::Equal,
                &json!({"a": [1, 2]}),
                &json!({"a": [1.0, 2]})
            )
            .unwrap()
        );
    }

    #[test]
    fn test_ordered_operations() {
        assert!(compare(&ComparisonOperation::LessThan, &json!(3), &json!(90)).unwrap());
        assert!(compare(&ComparisonOperation::GreaterThanOrEqual, &json!(90), &json!(90)).unwrap());
        assert!(!compare(&ComparisonOperation::GreaterThan, &json!(1.5), &json!(2)).unwrap());
        assert!(
            compare(
                &ComparisonOperation::LessThanOrEqual,
                &json!("2024-01-01T00:00:00Z"),
                &json!("2025-01-01T00:00:00Z")
            )
            .unwrap()
        );
    }

    #[test]
    fn test_ordered_type_mismatch() {
        let err = compare(&ComparisonOperation::LessThan, &json!("3"), &json!(4)).unwrap_err();
        match err {
            DomainError::TypeMismatch {
                operation,
                actual,
                expected,
            } => {
                assert_eq!(operation, "LESS_THAN");
                assert_eq!(actual, "string");
                assert_eq!(expected, "number");
            }
            other => panic!("Expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_membership() {
        let tags = json!(["prod", "pci"]);
        assert!(compare(&ComparisonOperation::Contains, &tags, &json!("pci")).unwrap());
        assert!(compare(&ComparisonOperation::NotContains, &tags, &json!("dev")).unwrap());
        assert!(compare(&ComparisonOperation::Contains, &json!("arn:aws:kms"), &json!("kms")).unwrap());
        assert!(compare(&ComparisonOperation::Contains, &json!({"kms": 1}), &json!("kms")).unwrap());
    }

    #[test]
    fn test_membership_on_scalar_defaults() {
        assert!(!compare(&ComparisonOperation::Contains, &json!(12), &json!(1)).unwrap());
        assert!(compare(&ComparisonOperation::NotContains, &json!(null), &json!(1)).unwrap());
    }

    #[test]
    fn test_custom_without_predicate_is_configuration_error() {
        let err = compare(&ComparisonOperation::Custom(None), &json!(1), &json!(1)).unwrap_err();
        assert!(err.is_configuration());
    }
}
