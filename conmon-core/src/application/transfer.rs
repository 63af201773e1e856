// conmon-core/src/application/transfer.rs

//! CSV export/import of a store table.
//!
//! Export writes the header in schema order. Import keeps the source columns
//! the destination knows about, then for each row tries an update by `id`
//! and inserts when nothing matched.

use serde_json::Value;
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::domain::query::{Query, Row};
use crate::error::ConmonError;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::atomic_write;
use crate::ports::store::Store;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub updated: usize,
    pub inserted: usize,
    /// Source columns the destination does not have.
    pub skipped_columns: Vec<String>,
}

/// Top-level column first, then a dot-path into nested values
/// (flat-file columns are flattened names, rows come back nested).
fn lookup<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
    if let Some(v) = row.get(column) {
        return Some(v);
    }
    let mut parts = column.split('.');
    let mut current = row.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn to_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Empty is null; JSON scalars and containers are decoded; anything else is text.
fn from_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match serde_json::from_str::<Value>(cell) {
        Ok(Value::String(_)) | Err(_) => Value::String(cell.to_string()),
        Ok(v) => v,
    }
}

async fn table_columns(store: &dyn Store, table: &str) -> Result<Vec<String>, ConmonError> {
    let columns: Vec<String> = store
        .columns(table)
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();
    if columns.is_empty() {
        return Err(InfrastructureError::ConfigError(format!(
            "table '{}' does not exist or has no columns",
            table
        ))
        .into());
    }
    Ok(columns)
}

#[instrument(skip(store, output), fields(backend = store.backend_name()))]
pub async fn export_table(store: &dyn Store, table: &str, output: &Path) -> Result<usize, ConmonError> {
    let columns = table_columns(store, table).await?;
    let rows = store.select(&Query::table(table)).await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&columns)
        .map_err(InfrastructureError::from)?;
    for row in &rows {
        writer
            .write_record(columns.iter().map(|c| to_cell(lookup(row, c))))
            .map_err(InfrastructureError::from)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| InfrastructureError::Io(e.into_error()))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    atomic_write(output, bytes)?;
    info!(rows = rows.len(), columns = columns.len(), "Table exported");
    Ok(rows.len())
}

#[instrument(skip(store, input), fields(backend = store.backend_name()))]
pub async fn import_table(store: &dyn Store, table: &str, input: &Path) -> Result<ImportReport, ConmonError> {
    let destination = table_columns(store, table).await?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(input)
        .map_err(InfrastructureError::from)?;
    let header: Vec<String> = reader
        .headers()
        .map_err(InfrastructureError::from)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut report = ImportReport::default();
    // (position dans le fichier, nom de colonne)
    let mut kept = Vec::new();
    for (i, name) in header.iter().enumerate() {
        if destination.contains(name) {
            kept.push((i, name.clone()));
        } else {
            report.skipped_columns.push(name.clone());
        }
    }
    if !report.skipped_columns.is_empty() {
        warn!(columns = ?report.skipped_columns, "Source columns missing from destination, skipped");
    }
    if kept.is_empty() {
        return Err(InfrastructureError::ConfigError(format!(
            "no column of '{}' matches table '{}'",
            input.display(),
            table
        ))
        .into());
    }

    for record in reader.records() {
        let record = record.map_err(InfrastructureError::from)?;
        let row: Row = kept
            .iter()
            .map(|(i, name)| (name.clone(), from_cell(record.get(*i).unwrap_or(""))))
            .collect();

        let id = row.get("id").filter(|v| !v.is_null()).cloned();
        if let Some(id) = id {
            let updated = store
                .update(&Query::table(table).values(row.clone()).filter("id", id))
                .await?;
            if !updated.is_empty() {
                report.updated += 1;
                continue;
            }
        }
        store.insert(&Query::table(table).values(row)).await?;
        report.inserted += 1;
    }

    info!(updated = report.updated, inserted = report.inserted, "Table imported");
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::FlatFileStore;
    use crate::infrastructure::adapters::flatfile::DEFAULT_RETENTION;
    use anyhow::Result;
    use serde_json::json;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn row(v: Value) -> Row {
        v.as_object().unwrap().clone()
    }

    async fn seeded(dir: &Path) -> Result<FlatFileStore> {
        let store = FlatFileStore::new(dir.join("data"), DEFAULT_RETENTION, Duration::from_secs(10));
        for r in [
            json!({"id": 1, "status": "active", "owner": {"team": "sec"}}),
            json!({"id": 2, "status": "pending", "owner": {"team": "ops"}}),
        ] {
            store.insert(&Query::table("assets").values(row(r))).await?;
        }
        Ok(store)
    }

    #[test]
    fn test_cells() {
        assert_eq!(from_cell(""), Value::Null);
        assert_eq!(from_cell("12"), json!(12));
        assert_eq!(from_cell("true"), json!(true));
        assert_eq!(from_cell(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(from_cell("hello"), json!("hello"));
        // a JSON string literal stays as typed
        assert_eq!(from_cell(r#""x""#), json!(r#""x""#));
        assert_eq!(to_cell(Some(&json!({"a": 1}))), r#"{"a":1}"#);
        assert_eq!(to_cell(None), "");
    }

    #[tokio::test]
    async fn test_export_follows_schema_order() -> Result<()> {
        let dir = tempdir()?;
        let store = seeded(dir.path()).await?;
        let out = dir.path().join("export/assets.csv");

        assert_eq!(export_table(&store, "assets", &out).await?, 2);
        let text = fs::read_to_string(&out)?;
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("id,status,owner.team"));
        assert_eq!(lines.next(), Some("1,active,sec"));
        Ok(())
    }

    #[tokio::test]
    async fn test_import_updates_then_inserts() -> Result<()> {
        let dir = tempdir()?;
        let store = seeded(dir.path()).await?;
        let input = dir.path().join("in.csv");
        fs::write(&input, "id,status,comment\n2,retired,x\n3,active,y\n")?;

        let report = import_table(&store, "assets", &input).await?;
        assert_eq!(report.updated, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped_columns, vec!["comment"]);

        let rows = store.select(&Query::table("assets").filter("status", "retired")).await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(2));
        // untouched column kept
        assert_eq!(rows[0]["owner"], json!({"team": "ops"}));
        assert_eq!(store.select(&Query::table("assets")).await?.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_table_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let store = seeded(dir.path()).await?;
        let err = export_table(&store, "nope", &dir.path().join("x.csv")).await.unwrap_err();
        assert!(err.to_string().contains("nope"));
        Ok(())
    }

    #[tokio::test]
    async fn test_round_trip_between_stores() -> Result<()> {
        let dir = tempdir()?;
        let source = seeded(dir.path()).await?;
        let file = dir.path().join("assets.csv");
        export_table(&source, "assets", &file).await?;

        // destination has the schema but no rows
        let target = FlatFileStore::new(dir.path().join("other"), DEFAULT_RETENTION, Duration::from_secs(10));
        target
            .insert(&Query::table("assets").values(row(json!({"id": 0, "status": "seed", "owner": {"team": "x"}}))))
            .await?;
        target.delete(&Query::table("assets").filter("id", 0)).await?;

        let report = import_table(&target, "assets", &file).await?;
        assert_eq!(report.inserted, 2);
        let rows = target.select(&Query::table("assets").order_by("id", crate::domain::query::SortOrder::Asc)).await?;
        assert_eq!(rows[0]["owner"], json!({"team": "sec"}));
        Ok(())
    }
}
