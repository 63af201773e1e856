// conmon/src/commands/sync.rs
//
// USE CASE: Push YAML check definitions into the store (upsert by id).

use anyhow::Context;
use std::path::PathBuf;

use conmon_core::application::{LazyStore, UpsertOutcome, upsert_check};

use super::{load_check_set, load_config};
use crate::cli::CheckSource;

pub async fn execute(project_dir: PathBuf) -> anyhow::Result<()> {
    let config = load_config(&project_dir)?;
    let store = LazyStore::new(config, &project_dir);
    let set = load_check_set(&CheckSource::default(), &store).await?;
    let handle = store.get().await?;

    let (mut inserted, mut updated) = (0, 0);
    for check in &set.checks {
        match upsert_check(handle.as_ref(), check)
            .await
            .with_context(|| format!("Failed to upsert check #{} '{}'", check.id, check.name))?
        {
            UpsertOutcome::Inserted => inserted += 1,
            UpsertOutcome::Updated => updated += 1,
        }
    }
    println!(
        "✨ {} check(s) synced to {} ({} inserted, {} updated)",
        set.checks.len(),
        handle.backend_name(),
        inserted,
        updated
    );
    Ok(())
}
