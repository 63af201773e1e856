// conmon-core/src/infrastructure/adapters/flatfile/backup.rs

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::infrastructure::error::InfrastructureError;

fn prefix(table: &str) -> String {
    format!("{}.bak_", table)
}

/// Copies the table file to `<table>.bak_<timestamp>`.
/// `None` when the table does not exist yet.
pub fn snapshot(root: &Path, table: &str, file: &Path) -> Result<Option<PathBuf>, InfrastructureError> {
    if !file.exists() {
        return Ok(None);
    }
    let stamp = Utc::now().format("%Y%m%d%H%M%S%6f");
    let mut target = root.join(format!("{}{}", prefix(table), stamp));
    let mut n = 1;
    while target.exists() {
        target = root.join(format!("{}{}_{}", prefix(table), stamp, n));
        n += 1;
    }
    fs::copy(file, &target)?;
    debug!(table, backup = ?target, "Backup taken");
    Ok(Some(target))
}

/// Puts the table back in its pre-call state.
pub fn restore(file: &Path, backup: Option<&Path>) -> Result<(), InfrastructureError> {
    match backup {
        Some(b) => {
            fs::copy(b, file)?;
        }
        None if file.exists() => fs::remove_file(file)?,
        None => {}
    }
    Ok(())
}

/// Sort key of a backup name: timestamp, then collision counter
/// (`None` for the first backup of that instant).
fn backup_order(name: &str, prefix: &str) -> Option<(String, Option<u64>)> {
    let rest = name.strip_prefix(prefix)?;
    match rest.split_once('_') {
        Some((stamp, n)) => Some((stamp.to_string(), Some(n.parse().ok()?))),
        None => Some((rest.to_string(), None)),
    }
}

/// Existing backups of `table`, oldest first.
pub fn list(root: &Path, table: &str) -> Result<Vec<PathBuf>, InfrastructureError> {
    let prefix = prefix(table);
    let mut found: Vec<(String, Option<u64>, PathBuf)> = fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter_map(|p| {
            let (stamp, n) = backup_order(p.file_name()?.to_str()?, &prefix)?;
            Some((stamp, n, p))
        })
        .collect();
    found.sort();
    Ok(found.into_iter().map(|(_, _, p)| p).collect())
}

/// Keeps the `keep` most recent backups.
pub fn prune(root: &Path, table: &str, keep: usize) -> Result<usize, InfrastructureError> {
    let backups = list(root, table)?;
    let excess = backups.len().saturating_sub(keep);
    for old in &backups[..excess] {
        if let Err(e) = fs::remove_file(old) {
            warn!(backup = ?old, error = %e, "Could not prune backup");
        }
    }
    Ok(excess)
}
