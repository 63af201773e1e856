// conmon/src/commands/checks.rs
//
// USE CASE: List loaded checks and the migration backlog.

use std::path::PathBuf;

use conmon_core::application::LazyStore;

use super::{load_check_set, load_config};
use crate::cli::CheckSource;

pub async fn execute(project_dir: PathBuf, source: CheckSource) -> anyhow::Result<()> {
    let config = load_config(&project_dir)?;
    let store = LazyStore::new(config, &project_dir);
    let set = load_check_set(&source, &store).await?;

    println!("📋 {} check(s)", set.checks.len());
    for check in &set.checks {
        println!(
            "   #{:<5} {:<40} {:<10} {} {} {}",
            check.id, check.name, check.severity.to_string(), check.field_path, check.operation, check.expected_value
        );
    }

    if !set.backlog.is_empty() {
        println!("\n🛠️  {} custom rule(s) need manual migration:", set.backlog.len());
        for entry in &set.backlog {
            println!("   #{:<5} {}: {}", entry.check_id, entry.check_name, entry.reason);
            println!("          `{}`", entry.snippet);
        }
    }
    Ok(())
}
