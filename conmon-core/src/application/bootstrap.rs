// conmon-core/src/application/bootstrap.rs

// Point de composition: le store est construit une seule fois puis injecté.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use crate::error::ConmonError;
use crate::infrastructure::adapters::{FlatFileStore, PostgresStore};
use crate::infrastructure::config::{ProjectConfig, StorageBackend};
use crate::infrastructure::error::InfrastructureError;
use crate::ports::store::Store;

/// Builds the configured backend.
///
/// A Postgres pool that cannot be built does not fail here: the store comes
/// back unavailable and every call on it fails fast.
pub async fn open_store(config: &ProjectConfig, project_dir: &Path) -> Result<Arc<dyn Store>, ConmonError> {
    let timeout = config.call_timeout();
    match config.storage.backend {
        StorageBackend::File => {
            let root = config.resolve(project_dir, &config.storage.file.root);
            info!(root = ?root, "Using flat-file store");
            Ok(Arc::new(FlatFileStore::new(
                root,
                config.storage.file.backup_retention,
                timeout,
            )))
        }
        StorageBackend::Postgres => {
            let pg = config.storage.postgres.clone();
            // la construction du pool bloque (connexions min_idle)
            let store = tokio::task::spawn_blocking(move || PostgresStore::connect(&pg, timeout))
                .await
                .map_err(InfrastructureError::from)?;
            info!(available = store.is_available(), "Using Postgres store");
            Ok(Arc::new(store))
        }
    }
}

/// Opens the store on first use only.
pub struct LazyStore {
    config: ProjectConfig,
    project_dir: PathBuf,
    cell: OnceCell<Arc<dyn Store>>,
}

impl LazyStore {
    pub fn new(config: ProjectConfig, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            project_dir: project_dir.into(),
            cell: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn is_open(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn get(&self) -> Result<Arc<dyn Store>, ConmonError> {
        self.cell
            .get_or_try_init(|| open_store(&self.config, &self.project_dir))
            .await
            .cloned()
    }
}
