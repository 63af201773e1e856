// conmon-core/tests/store_parity.rs
//
// Same seed, same query, both backends. The Postgres side only runs when
// CONMON_TEST_DATABASE_URL points at a scratch database.

use anyhow::Result;
use conmon_core::domain::query::{Query, Row, SortOrder};
use conmon_core::infrastructure::adapters::flatfile::DEFAULT_RETENTION;
use conmon_core::infrastructure::adapters::{FlatFileStore, PostgresStore, PostgresStoreConfig};
use conmon_core::ports::store::Store;
use serde_json::{Value, json};
use std::env;
use std::time::Duration;
use tempfile::tempdir;

const DATABASE_URL: &str = "CONMON_TEST_DATABASE_URL";

fn seed_rows() -> Vec<Row> {
    [(1, "active"), (2, "pending"), (3, "archived"), (4, "active")]
        .into_iter()
        .map(|(id, status)| {
            let mut row = Row::new();
            row.insert("id".into(), json!(id));
            row.insert("status".into(), json!(status));
            row.insert("owner".into(), json!("secops"));
            row
        })
        .collect()
}

async fn seed(store: &dyn Store, table: &str) -> Result<()> {
    for row in seed_rows() {
        store.insert(&Query::table(table).values(row)).await?;
    }
    Ok(())
}

async fn in_set(store: &dyn Store, table: &str) -> Result<Vec<(Value, Value)>> {
    let rows = store
        .select(
            &Query::table(table)
                .filter("status", json!(["active", "pending"]))
                .order_by("id", SortOrder::Asc),
        )
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| (r["id"].clone(), r["status"].clone()))
        .collect())
}

/// Runs DDL on a plain client, off the runtime.
async fn execute_ddl(url: String, sql: String) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut client = postgres::Client::connect(&url, postgres::NoTls)?;
        client.batch_execute(&sql)?;
        Ok(())
    })
    .await??;
    Ok(())
}

#[tokio::test]
async fn test_set_filter_matches_across_backends() -> Result<()> {
    let Ok(url) = env::var(DATABASE_URL) else {
        eprintln!("{DATABASE_URL} not set, skipping Postgres parity test");
        return Ok(());
    };
    let table = format!("conmon_parity_{}", std::process::id());

    let dir = tempdir()?;
    let file_store = FlatFileStore::new(dir.path().join("data"), DEFAULT_RETENTION, Duration::from_secs(10));
    seed(&file_store, &table).await?;

    execute_ddl(
        url.clone(),
        format!("CREATE TABLE {table} (id BIGINT PRIMARY KEY, status TEXT NOT NULL, owner TEXT)"),
    )
    .await?;

    let config = PostgresStoreConfig {
        connection: url.clone(),
        ..Default::default()
    };
    let pg_store = tokio::task::spawn_blocking(move || {
        PostgresStore::try_connect(&config, Duration::from_secs(10))
    })
    .await??;

    let outcome = async {
        seed(&pg_store, &table).await?;
        let from_files = in_set(&file_store, &table).await?;
        let from_postgres = in_set(&pg_store, &table).await?;
        anyhow::Ok((from_files, from_postgres))
    }
    .await;
    execute_ddl(url, format!("DROP TABLE IF EXISTS {table}")).await?;

    let (from_files, from_postgres) = outcome?;
    assert_eq!(
        from_files,
        vec![
            (json!(1), json!("active")),
            (json!(2), json!("pending")),
            (json!(4), json!("active")),
        ]
    );
    assert_eq!(from_files, from_postgres);
    Ok(())
}
