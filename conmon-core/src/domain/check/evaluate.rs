// conmon-core/src/domain/check/evaluate.rs

use serde_json::Value;

use super::compare::compare;
use super::path::Resource;
use super::{Check, CheckResult, ComparisonOperation};
use crate::domain::error::DomainError;

/// Evaluates `check` against every resource, in input order.
///
/// Always yields one result per resource: path and comparison failures are
/// recorded on the result. Only configuration problems (a CUSTOM check with
/// no predicate) abort the call.
pub fn evaluate<R: Resource>(check: &Check, resources: &[R]) -> Result<Vec<CheckResult>, DomainError> {
    if let ComparisonOperation::Custom(None) = check.operation {
        return Err(DomainError::MissingPredicate {
            check: check.name.clone(),
        });
    }
    Ok(resources.iter().map(|r| evaluate_one(check, r)).collect())
}

pub fn evaluate_one(check: &Check, resource: &dyn Resource) -> CheckResult {
    let actual = match check.field_path.extract(resource) {
        Ok(value) => value,
        Err(e) => return CheckResult::failed_with(resource.id(), e),
    };

    match compare(&check.operation, &actual, &check.expected_value) {
        Ok(passed) => CheckResult {
            resource_id: resource.id().to_string(),
            passed,
            message: Some(describe(check, &actual, passed)),
            error: None,
            actual: Some(actual),
        },
        Err(e) => CheckResult {
            actual: Some(actual),
            ..CheckResult::failed_with(resource.id(), e)
        },
    }
}

fn describe(check: &Check, actual: &Value, passed: bool) -> String {
    let verdict = if passed { "satisfies" } else { "does not satisfy" };
    match &check.operation {
        ComparisonOperation::Custom(Some(p)) => {
            format!("{} = {} {} `{}`", check.field_path, actual, verdict, p.source())
        }
        op => format!(
            "{} = {} {} {} {}",
            check.field_path, actual, verdict, op, check.expected_value
        ),
    }
}
