// conmon/src/commands/evaluate.rs
//
// USE CASE: Evaluate checks over a resource collection, then persist.

use anyhow::Context;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

use conmon_core::application::{Destination, LazyStore, ResultWriter, evaluate_checks};
use conmon_core::domain::check::{Classification, ResourceRecord};
use conmon_core::domain::result::PersistContext;
use conmon_core::infrastructure::templates::JinjaRenderer;

use super::{load_check_set, load_config};
use crate::cli::CheckSource;

fn read_resources(path: &Path) -> anyhow::Result<Vec<ResourceRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read resources from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of resources", path.display()))
}

pub async fn execute(
    project_dir: PathBuf,
    resources: PathBuf,
    output: Option<PathBuf>,
    skip_backlog: bool,
    source: CheckSource,
) -> anyhow::Result<()> {
    let start = std::time::Instant::now();

    // A. Config + checks
    let config = load_config(&project_dir)?;
    let policy = config.evaluation.error_policy;
    let context = PersistContext {
        customer_id: config.results.customer_id,
        connection_id: config.results.connection_id,
    };
    let writer = ResultWriter::new(context, config.results.batch_size);
    let store = LazyStore::new(config, &project_dir);

    let mut set = load_check_set(&source, &store).await?;
    if skip_backlog && !set.backlog.is_empty() {
        let pending: HashSet<i64> = set.backlog.iter().map(|b| b.check_id).collect();
        warn!(checks = ?pending, "Skipping checks awaiting custom-logic migration");
        set.checks.retain(|c| !pending.contains(&c.id));
    }

    // B. Evaluation
    let resources = read_resources(&resources)?;
    println!(
        "🔎 Evaluating {} check(s) over {} resource(s)...",
        set.checks.len(),
        resources.len()
    );
    let renderer = JinjaRenderer::new();
    let aggregates = evaluate_checks(&set.checks, &resources, policy, &renderer)?;

    for aggregate in &aggregates {
        let icon = match aggregate.classification {
            Classification::Success => "✅",
            Classification::Partial => "🟡",
            Classification::Fail => "❌",
            Classification::Error => "💥",
        };
        println!(
            "   {} [{}] {}: {}",
            icon, aggregate.classification, aggregate.check_name, aggregate.message
        );
    }

    // C. Persistence
    let report = match output {
        Some(path) => writer.persist(&aggregates, Destination::File(path)).await?,
        None => {
            let handle = store.get().await?;
            writer
                .persist(&aggregates, Destination::Store(handle.as_ref()))
                .await?
        }
    };

    println!(
        "\n✨ {} result(s) written in {} batch(es), {:.2?}",
        report.rows_written,
        report.batches_committed,
        start.elapsed()
    );
    Ok(())
}
