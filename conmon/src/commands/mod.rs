// conmon/src/commands/mod.rs

pub mod checks;
pub mod evaluate;
pub mod sync;
pub mod transfer;

use anyhow::Context;
use std::path::{Path, PathBuf};

use conmon_core::application::{LazyStore, load_checks};
use conmon_core::infrastructure::config::{ProjectConfig, load_project_config};
use conmon_core::infrastructure::definitions::{CheckSet, load_definitions};

use crate::cli::CheckSource;

pub fn load_config(project_dir: &Path) -> anyhow::Result<ProjectConfig> {
    load_project_config(project_dir).with_context(|| {
        format!(
            "Failed to load project configuration from {:?}",
            project_dir
        )
    })
}

/// YAML definitions by default, the store when asked.
pub async fn load_check_set(source: &CheckSource, store: &LazyStore) -> anyhow::Result<CheckSet> {
    if source.uses_store() {
        let controls = (!source.controls.is_empty()).then_some(source.controls.as_slice());
        let handle = store.get().await?;
        return load_checks(handle.as_ref(), controls)
            .await
            .context("Failed to load checks from the store");
    }

    let config = store.config();
    let dirs: Vec<PathBuf> = config
        .check_paths
        .iter()
        .map(|p| config.resolve(store.project_dir(), p))
        .collect();
    load_definitions(&dirs).with_context(|| format!("Failed to load check definitions from {:?}", dirs))
}
