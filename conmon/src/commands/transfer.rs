// conmon/src/commands/transfer.rs
//
// USE CASE: CSV export / import of a store table.

use anyhow::Context;
use std::path::PathBuf;

use conmon_core::application::{LazyStore, export_table, import_table};

use super::load_config;

pub async fn export(project_dir: PathBuf, table: String, output: PathBuf) -> anyhow::Result<()> {
    let config = load_config(&project_dir)?;
    let store = LazyStore::new(config, &project_dir).get().await?;
    let rows = export_table(store.as_ref(), &table, &output)
        .await
        .with_context(|| format!("Failed to export table '{}'", table))?;
    println!("📤 {} row(s) of '{}' written to {}", rows, table, output.display());
    Ok(())
}

pub async fn import(project_dir: PathBuf, table: String, input: PathBuf) -> anyhow::Result<()> {
    let config = load_config(&project_dir)?;
    let store = LazyStore::new(config, &project_dir).get().await?;
    let report = import_table(store.as_ref(), &table, &input)
        .await
        .with_context(|| format!("Failed to import {} into '{}'", input.display(), table))?;
    println!(
        "📥 '{}': {} updated, {} inserted",
        table, report.updated, report.inserted
    );
    if !report.skipped_columns.is_empty() {
        println!("   skipped columns: {}", report.skipped_columns.join(", "));
    }
    Ok(())
}
