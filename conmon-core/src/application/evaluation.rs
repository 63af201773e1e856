// conmon-core/src/application/evaluation.rs

use std::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::application::ports::TemplateEngine;
use crate::application::writer::aggregate;
use crate::domain::check::{AggregateResult, Check, ErrorPolicy, Resource, evaluate};
use crate::error::ConmonError;

/// Évalue chaque check sur toute la collection, dans l'ordre d'entrée.
///
/// Per-resource failures end up in the aggregates. A configuration error on
/// any check (CUSTOM without predicate) aborts the pass before anything is
/// returned.
#[instrument(skip_all, fields(checks = checks.len(), resources = resources.len()))]
pub fn evaluate_checks<R: Resource>(
    checks: &[Check],
    resources: &[R],
    policy: ErrorPolicy,
    renderer: &dyn TemplateEngine,
) -> Result<Vec<AggregateResult>, ConmonError> {
    let start = Instant::now();
    let mut aggregates = Vec::with_capacity(checks.len());

    for check in checks {
        let results = match evaluate(check, resources) {
            Ok(results) => results,
            Err(e) => {
                error!(check = %check.name, "Check rejected after {:.2?}: {}", start.elapsed(), e);
                return Err(e.into());
            }
        };
        let aggregate = aggregate(check, results, policy, renderer)?;
        debug!(
            check = %check.name,
            classification = %aggregate.classification,
            passed = aggregate.passed,
            failed = aggregate.failed,
            "Check evaluated"
        );
        aggregates.push(aggregate);
    }

    info!(elapsed = ?start.elapsed(), "Evaluation pass finished");
    Ok(aggregates)
}
