// conmon-core/src/domain/check/aggregate.rs

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Check, CheckResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    Success,
    Partial,
    Fail,
    Error,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Success => "SUCCESS",
            Classification::Partial => "PARTIAL",
            Classification::Fail => "FAIL",
            Classification::Error => "ERROR",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How errored results weigh on the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Any errored result makes the whole check `ERROR`.
    #[default]
    Strict,
    /// Errored results count as plain failures.
    Lenient,
}

/// Per-check roll-up over a resource collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub check_id: i64,
    pub check_name: String,
    pub classification: Classification,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub total: usize,
    pub passing_resources: Vec<String>,
    pub failing_resources: Vec<String>,
    /// Filled by the result writer once the message template is rendered.
    pub message: String,
    pub results: Vec<CheckResult>,
}

impl AggregateResult {
    pub fn summarize(check: &Check, results: Vec<CheckResult>, policy: ErrorPolicy) -> Self {
        let (passing, failing): (Vec<&CheckResult>, Vec<&CheckResult>) =
            results.iter().partition(|r| r.passed);
        let errored = results.iter().filter(|r| r.is_error()).count();

        let passed = passing.len();
        let failed = failing.len();
        let total = results.len();

        Self {
            check_id: check.id,
            check_name: check.name.clone(),
            classification: classify(passed, failed, errored, policy),
            passed,
            failed,
            errored,
            total,
            passing_resources: passing.iter().map(|r| r.resource_id.clone()).collect(),
            failing_resources: failing.iter().map(|r| r.resource_id.clone()).collect(),
            message: String::new(),
            results,
        }
    }

    /// Rounded to two decimals, 0 when nothing was evaluated.
    pub fn success_percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let pct = self.passed as f64 * 100.0 / self.total as f64;
        (pct * 100.0).round() / 100.0
    }
}

/// `failed` already includes errored results.
pub fn classify(passed: usize, failed: usize, errored: usize, policy: ErrorPolicy) -> Classification {
    if errored > 0 && policy == ErrorPolicy::Strict {
        return Classification::Error;
    }
    if failed == 0 {
        Classification::Success
    } else if passed == 0 {
        Classification::Fail
    } else {
        Classification::Partial
    }
}
