// conmon-core/src/domain/result.rs

//! Persisted shape of an aggregate result.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::domain::check::AggregateResult;
use crate::domain::error::DomainError;
use crate::domain::query::{Operation, PostgresDialect, Query, Row, SqlStatement};

/// Current state: one row per (customer, connection, check).
pub const RESULTS_TABLE: &str = "con_mon_results";
/// Append-only.
pub const HISTORY_TABLE: &str = "con_mon_results_history";
/// Natural key of [`RESULTS_TABLE`].
pub const RESULT_KEY: [&str; 3] = ["customer_id", "connection_id", "check_id"];

/// Who the results belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersistContext {
    pub customer_id: i64,
    pub connection_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub customer_id: i64,
    pub connection_id: i64,
    pub check_id: i64,
    pub result: String,
    pub result_message: String,
    pub success_count: i64,
    pub failure_count: i64,
    pub success_percentage: f64,
    pub success_resources: Value,
    pub failed_resources: Value,
    pub exclusions: Value,
    pub resource_json: Value,
}

impl ResultRecord {
    pub fn from_aggregate(ctx: PersistContext, aggregate: &AggregateResult) -> Self {
        let outcomes: Vec<Value> = aggregate
            .results
            .iter()
            .map(|r| {
                json!({
                    "id": r.resource_id,
                    "passed": r.passed,
                    "message": r.message,
                    "error": r.error,
                })
            })
            .collect();

        Self {
            customer_id: ctx.customer_id,
            connection_id: ctx.connection_id,
            check_id: aggregate.check_id,
            result: aggregate.classification.as_str().to_string(),
            result_message: aggregate.message.clone(),
            success_count: aggregate.passed as i64,
            failure_count: aggregate.failed as i64,
            success_percentage: aggregate.success_percentage(),
            success_resources: json!(aggregate.passing_resources),
            failed_resources: json!(aggregate.failing_resources),
            exclusions: json!([]),
            resource_json: Value::Array(outcomes),
        }
    }

    pub fn with_exclusions(mut self, exclusions: Vec<String>) -> Self {
        self.exclusions = json!(exclusions);
        self
    }

    pub fn to_row(&self) -> Result<Row, DomainError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(row)) => Ok(row),
            Ok(_) => Err(DomainError::InvalidCheck("result record is not a map".into())),
            Err(e) => Err(DomainError::InvalidCheck(e.to_string())),
        }
    }

    /// Where mapping selecting this record's current-state row.
    pub fn key(&self) -> Row {
        let mut key = Row::new();
        key.insert("customer_id".into(), Value::from(self.customer_id));
        key.insert("connection_id".into(), Value::from(self.connection_id));
        key.insert("check_id".into(), Value::from(self.check_id));
        key
    }

    fn key_parts(&self) -> (i64, i64, i64) {
        (self.customer_id, self.connection_id, self.check_id)
    }
}

/// Last record of each key, in order of last appearance. Current state keeps
/// one row per key even when a batch carries the same check twice.
pub fn latest_per_key(records: &[ResultRecord]) -> Vec<&ResultRecord> {
    let mut latest: Vec<&ResultRecord> = Vec::with_capacity(records.len());
    for record in records {
        latest.retain(|seen| seen.key_parts() != record.key_parts());
        latest.push(record);
    }
    latest
}

/// Statements for one result batch, in commit order: every history insert,
/// then the current-state deletes by key, then the current-state inserts.
/// Repeated keys keep their last record in the current state.
pub fn batch_statements(records: &[ResultRecord]) -> Result<Vec<SqlStatement>, DomainError> {
    let history = records
        .iter()
        .map(ResultRecord::to_row)
        .collect::<Result<Vec<_>, _>>()?;
    let rows = latest_per_key(records)
        .into_iter()
        .map(|r| r.to_row().map(|row| (r.key(), row)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut statements = Vec::with_capacity(history.len() + rows.len() * 2);
    for row in history {
        statements.push(
            Query::table(HISTORY_TABLE)
                .values(row)
                .build(&PostgresDialect, Operation::Insert)?,
        );
    }
    for (key, _) in &rows {
        statements.push(
            Query::table(RESULTS_TABLE)
                .where_map(key.clone())
                .build(&PostgresDialect, Operation::Delete)?,
        );
    }
    for (_, row) in &rows {
        statements.push(
            Query::table(RESULTS_TABLE)
                .values(row.clone())
                .build(&PostgresDialect, Operation::Insert)?,
        );
    }
    Ok(statements)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::check::{
        Check, CheckResult, ComparisonOperation, ErrorPolicy,
    };

    #[test]
    fn test_record_from_aggregate() {
        let check = Check::new(
            4,
            "public_access_blocked",
            "public".parse().unwrap(),
            ComparisonOperation::Equal,
            json!(false),
        );
        let results = vec![
            CheckResult {
                resource_id: "a".into(),
                passed: true,
                message: None,
                error: None,
                actual: None,
            },
            CheckResult::failed_with("b", "Field 'public' not found"),
        ];
        let mut agg = AggregateResult::summarize(&check, results, ErrorPolicy::Lenient);
        agg.message = "1 of 2".into();

        let record = ResultRecord::from_aggregate(
            PersistContext {
                customer_id: 1,
                connection_id: 2,
            },
            &agg,
        );
        assert_eq!(record.result, "PARTIAL");
        assert_eq!(record.success_percentage, 50.0);
        assert_eq!(record.failed_resources, json!(["b"]));
        assert_eq!(record.resource_json[1]["error"], json!("Field 'public' not found"));

        let row = record.to_row().unwrap();
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(&columns[..3], &RESULT_KEY);
        assert_eq!(row["exclusions"], json!([]));
    }

    fn record(check_id: i64) -> ResultRecord {
        ResultRecord {
            customer_id: 1,
            connection_id: 2,
            check_id,
            result: "SUCCESS".into(),
            result_message: "ok".into(),
            success_count: 3,
            failure_count: 0,
            success_percentage: 100.0,
            success_resources: json!(["a", "b", "c"]),
            failed_resources: json!([]),
            exclusions: json!([]),
            resource_json: json!([]),
        }
    }

    #[test]
    fn test_batch_statement_order() {
        let statements = batch_statements(&[record(1), record(2)]).unwrap();
        let heads: Vec<String> = statements
            .iter()
            .map(|s| s.sql.split(" (").next().unwrap().split(" WHERE").next().unwrap().to_string())
            .collect();
        assert_eq!(
            heads,
            vec![
                r#"INSERT INTO "con_mon_results_history""#,
                r#"INSERT INTO "con_mon_results_history""#,
                r#"DELETE FROM "con_mon_results""#,
                r#"DELETE FROM "con_mon_results""#,
                r#"INSERT INTO "con_mon_results""#,
                r#"INSERT INTO "con_mon_results""#,
            ]
        );
        insta::assert_snapshot!(statements[2].sql, @r#"DELETE FROM "con_mon_results" WHERE "customer_id" = $1 AND "connection_id" = $2 AND "check_id" = $3 RETURNING *"#);
        assert_eq!(statements[2].params, vec![json!(1), json!(2), json!(1)]);
    }

    #[test]
    fn test_repeated_key_keeps_last_current_row() {
        let mut rerun = record(1);
        rerun.result = "FAILED".into();
        let statements = batch_statements(&[record(1), record(2), rerun]).unwrap();

        let history = statements.iter().filter(|s| s.sql.contains("con_mon_results_history")).count();
        let current: Vec<_> = statements
            .iter()
            .filter(|s| s.sql.starts_with(r#"INSERT INTO "con_mon_results" "#))
            .collect();
        assert_eq!(history, 3);
        assert_eq!(current.len(), 2);
        assert_eq!(current[0].params[2], json!(2));
        assert_eq!(current[1].params[2], json!(1));
        assert!(current[1].params.contains(&json!("FAILED")));
    }
}
