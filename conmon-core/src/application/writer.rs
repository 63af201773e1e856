// conmon-core/src/application/writer.rs

//! Result Writer: per-check aggregation (with its rendered message) and
//! batched persistence.
//!
//! Persistence is at-least-once across batches: each batch commits on its
//! own, and a failure in batch N leaves batches before N committed.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::application::ports::TemplateEngine;
use crate::domain::check::messages::{builtin_template, context, template_for};
use crate::domain::check::{AggregateResult, Check, CheckResult, ErrorPolicy};
use crate::domain::query::SqlStatement;
use crate::domain::result::{PersistContext, ResultRecord, batch_statements};
use crate::error::ConmonError;
use crate::infrastructure::fs::write_json;
use crate::ports::store::Store;

pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Summarizes `results` and renders the message for the resulting class.
///
/// Under [`ErrorPolicy::Lenient`] a check override that does not render
/// falls back to the built-in message; under `Strict` the error is returned.
pub fn aggregate(
    check: &Check,
    results: Vec<CheckResult>,
    policy: ErrorPolicy,
    renderer: &dyn TemplateEngine,
) -> Result<AggregateResult, ConmonError> {
    let mut aggregate = AggregateResult::summarize(check, results, policy);
    let values = context(check, &aggregate);
    let template = template_for(check, aggregate.classification);
    aggregate.message = match renderer.render(&template, &values) {
        Ok(message) => message,
        Err(e) if policy == ErrorPolicy::Lenient && check.output_statements.is_some() => {
            warn!(check = %check.name, error = %e, "Output statement did not render, using built-in message");
            renderer.render(&builtin_template(check, aggregate.classification), &values)?
        }
        Err(e) => return Err(e),
    };
    Ok(aggregate)
}

/// Where persisted results go.
pub enum Destination<'a> {
    /// Combined statement set, written as JSON.
    File(PathBuf),
    Store(&'a dyn Store),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub batches_committed: usize,
    pub rows_written: usize,
}

/// JSON document written for [`Destination::File`].
#[derive(Debug, Serialize)]
struct StatementFile<'a> {
    records: usize,
    statements: &'a [SqlStatement],
}

pub struct ResultWriter {
    context: PersistContext,
    batch_size: usize,
}

impl ResultWriter {
    pub fn new(context: PersistContext, batch_size: usize) -> Self {
        Self {
            context,
            batch_size: batch_size.max(1),
        }
    }

    pub fn records(&self, aggregates: &[AggregateResult]) -> Vec<ResultRecord> {
        aggregates
            .iter()
            .map(|a| ResultRecord::from_aggregate(self.context, a))
            .collect()
    }

    #[instrument(skip_all, fields(aggregates = aggregates.len(), batch_size = self.batch_size))]
    pub async fn persist(
        &self,
        aggregates: &[AggregateResult],
        destination: Destination<'_>,
    ) -> Result<BulkReport, ConmonError> {
        let records = self.records(aggregates);
        match destination {
            Destination::File(path) => {
                let statements = batch_statements(&records)?;
                write_json(
                    &path,
                    &StatementFile {
                        records: records.len(),
                        statements: &statements,
                    },
                )?;
                info!(path = ?path, statements = statements.len(), "Result statements written");
                Ok(BulkReport {
                    batches_committed: usize::from(!records.is_empty()),
                    rows_written: records.len(),
                })
            }
            Destination::Store(store) => self.write_batches(store, &records).await,
        }
    }

    async fn write_batches(
        &self,
        store: &dyn Store,
        records: &[ResultRecord],
    ) -> Result<BulkReport, ConmonError> {
        let mut report = BulkReport::default();
        for (index, batch) in records.chunks(self.batch_size).enumerate() {
            let start = Instant::now();
            match store.commit_result_batch(batch).await {
                Ok(()) => {
                    report.batches_committed += 1;
                    report.rows_written += batch.len();
                    debug!(batch = index + 1, rows = batch.len(), elapsed = ?start.elapsed(), "Batch committed");
                }
                Err(e) => {
                    error!(batch = index + 1, committed = report.batches_committed, error = %e, "Batch failed");
                    return Err(ConmonError::PartialBulkWrite {
                        committed_batches: report.batches_committed,
                        failed_batch: index + 1,
                        source: Box::new(e),
                    });
                }
            }
        }
        info!(
            batches = report.batches_committed,
            rows = report.rows_written,
            backend = store.backend_name(),
            "Results persisted"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::check::{Classification, ComparisonOperation, OutputStatements};
    use crate::domain::query::{Query, Row};
    use crate::domain::result::{HISTORY_TABLE, RESULTS_TABLE};
    use crate::infrastructure::adapters::FlatFileStore;
    use crate::infrastructure::adapters::flatfile::DEFAULT_RETENTION;
    use crate::infrastructure::error::InfrastructureError;
    use crate::infrastructure::templates::JinjaRenderer;
    use crate::ports::store::ColumnSchema;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    // --- MOCK STORE ---
    #[derive(Default)]
    struct RecordingStore {
        commits: Mutex<Vec<usize>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl Store for RecordingStore {
        fn backend_name(&self) -> &'static str {
            "mock"
        }
        async fn select(&self, _: &Query) -> Result<Vec<Row>, ConmonError> {
            Ok(vec![])
        }
        async fn insert(&self, _: &Query) -> Result<Vec<Row>, ConmonError> {
            Ok(vec![])
        }
        async fn update(&self, _: &Query) -> Result<Vec<Row>, ConmonError> {
            Ok(vec![])
        }
        async fn delete(&self, _: &Query) -> Result<Vec<Row>, ConmonError> {
            Ok(vec![])
        }
        async fn columns(&self, _: &str) -> Result<Vec<ColumnSchema>, ConmonError> {
            Ok(vec![])
        }
        async fn commit_result_batch(&self, records: &[ResultRecord]) -> Result<(), ConmonError> {
            let mut commits = self.commits.lock().unwrap();
            if self.fail_on == Some(commits.len() + 1) {
                return Err(InfrastructureError::PoolUnavailable("injected".into()).into());
            }
            commits.push(records.len());
            Ok(())
        }
    }

    fn check(id: i64) -> Check {
        Check::new(
            id,
            format!("check_{}", id),
            "encryption.enabled".parse().unwrap(),
            ComparisonOperation::Equal,
            json!(true),
        )
        .with_description("Buckets must be encrypted")
    }

    fn passing(id: &str) -> CheckResult {
        CheckResult {
            resource_id: id.into(),
            passed: true,
            message: None,
            error: None,
            actual: Some(json!(true)),
        }
    }

    fn aggregates(n: i64) -> Vec<AggregateResult> {
        let renderer = JinjaRenderer::new();
        (1..=n)
            .map(|id| aggregate(&check(id), vec![passing("a")], ErrorPolicy::Strict, &renderer).unwrap())
            .collect()
    }

    fn writer() -> ResultWriter {
        ResultWriter::new(
            PersistContext {
                customer_id: 1,
                connection_id: 2,
            },
            DEFAULT_BATCH_SIZE,
        )
    }

    #[test]
    fn test_aggregate_renders_builtin_message() {
        let renderer = JinjaRenderer::new();
        let results = vec![passing("a"), passing("b"), CheckResult::failed_with("c", "boom")];

        let strict = aggregate(&check(1), results.clone(), ErrorPolicy::Strict, &renderer).unwrap();
        assert_eq!(strict.classification, Classification::Error);
        assert_eq!(
            strict.message,
            "1 of 3 resources could not be evaluated for 'check_1'."
        );

        let lenient = aggregate(&check(1), results, ErrorPolicy::Lenient, &renderer).unwrap();
        assert_eq!(lenient.classification, Classification::Partial);
        assert!(lenient.message.starts_with("2 of 3 resources are "), "{}", lenient.message);
        assert!(lenient.message.contains("(66.67%)"));
    }

    #[test]
    fn test_broken_output_statement_falls_back_when_lenient() {
        let renderer = JinjaRenderer::new();
        let mut broken = check(1);
        broken.output_statements = Some(OutputStatements {
            success: Some("{{ passed ".into()),
            ..Default::default()
        });

        let lenient = aggregate(&broken, vec![passing("a")], ErrorPolicy::Lenient, &renderer).unwrap();
        assert_eq!(lenient.classification, Classification::Success);
        assert!(lenient.message.starts_with("All 1 resources are "), "{}", lenient.message);

        assert!(aggregate(&broken, vec![passing("a")], ErrorPolicy::Strict, &renderer).is_err());
    }

    #[tokio::test]
    async fn test_120_results_commit_in_3_batches() {
        let store = RecordingStore::default();
        let report = writer()
            .persist(&aggregates(120), Destination::Store(&store))
            .await
            .unwrap();
        assert_eq!(report, BulkReport { batches_committed: 3, rows_written: 120 });
        assert_eq!(*store.commits.lock().unwrap(), vec![50, 50, 20]);
    }

    #[tokio::test]
    async fn test_failed_batch_reports_committed_ones() {
        let store = RecordingStore {
            fail_on: Some(2),
            ..Default::default()
        };
        let err = writer()
            .persist(&aggregates(120), Destination::Store(&store))
            .await
            .unwrap_err();
        match err {
            ConmonError::PartialBulkWrite {
                committed_batches,
                failed_batch,
                ..
            } => {
                assert_eq!(committed_batches, 1);
                assert_eq!(failed_batch, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        // batch 3 was never attempted
        assert_eq!(*store.commits.lock().unwrap(), vec![50]);
    }

    #[tokio::test]
    async fn test_flat_file_current_and_history() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = FlatFileStore::new(dir.path(), DEFAULT_RETENTION, Duration::from_secs(10));
        let writer = writer();

        writer.persist(&aggregates(120), Destination::Store(&store)).await?;
        let report = writer.persist(&aggregates(120), Destination::Store(&store)).await?;
        assert_eq!(report.batches_committed, 3);

        let current = store.select(&Query::table(RESULTS_TABLE)).await?;
        let history = store.select(&Query::table(HISTORY_TABLE)).await?;
        assert_eq!(current.len(), 120);
        assert_eq!(history.len(), 240);
        assert_eq!(current[0]["success_resources"], json!(["a"]));
        Ok(())
    }

    #[tokio::test]
    async fn test_file_destination_writes_statement_set() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out/results.json");
        let report = writer()
            .persist(&aggregates(2), Destination::File(path.clone()))
            .await?;
        assert_eq!(report.rows_written, 2);

        let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(doc["records"], 2);
        assert_eq!(doc["statements"].as_array().unwrap().len(), 6);
        assert!(doc["statements"][0]["sql"]
            .as_str()
            .unwrap()
            .starts_with("INSERT INTO \"con_mon_results_history\""));
        Ok(())
    }
}
