// conmon-core/src/infrastructure/config/project.rs

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::check::ErrorPolicy;
use crate::infrastructure::adapters::flatfile::DEFAULT_RETENTION;
use crate::infrastructure::adapters::postgres::PostgresStoreConfig;
use crate::infrastructure::error::InfrastructureError;

const CANDIDATES: [&str; 2] = ["conmon.yaml", "conmon_project_conf.yaml"];

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Postgres,
}

impl std::str::FromStr for StorageBackend {
    type Err = InfrastructureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "postgres" => Ok(Self::Postgres),
            other => Err(InfrastructureError::ConfigError(format!(
                "unknown storage backend '{}' (expected file or postgres)",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Validate)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileStoreConfig {
    #[validate(length(min = 1, message = "file store root cannot be empty"))]
    pub root: String,
    pub backup_retention: usize,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            root: "data".to_string(),
            backup_retention: DEFAULT_RETENTION,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Validate)]
#[serde(rename_all = "kebab-case", default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[validate(nested)]
    pub file: FileStoreConfig,
    #[validate(nested)]
    pub postgres: PostgresStoreConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct EvaluationConfig {
    pub error_policy: ErrorPolicy,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Validate)]
#[serde(rename_all = "kebab-case", default)]
pub struct ResultsConfig {
    #[validate(range(min = 1, message = "batch size must be at least 1"))]
    pub batch_size: usize,
    pub customer_id: i64,
    pub connection_id: i64,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            customer_id: 0,
            connection_id: 0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Validate)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    #[validate(nested)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    #[validate(nested)]
    pub results: ResultsConfig,

    #[serde(default = "default_call_timeout_ms")]
    #[validate(range(min = 1))]
    pub call_timeout_ms: u64,

    #[serde(default = "default_check_paths")]
    pub check_paths: Vec<String>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}
fn default_call_timeout_ms() -> u64 {
    30_000
}
fn default_check_paths() -> Vec<String> {
    vec!["checks".to_string()]
}

impl ProjectConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            storage: StorageConfig::default(),
            evaluation: EvaluationConfig::default(),
            results: ResultsConfig::default(),
            call_timeout_ms: default_call_timeout_ms(),
            check_paths: default_check_paths(),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Relative paths of the config are resolved against the project dir.
    pub fn resolve(&self, project_dir: &Path, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            project_dir.join(p)
        }
    }
}

// --- LOADER ---

#[instrument(skip(project_dir))]
pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig, InfrastructureError> {
    // 1. Découverte du fichier principal
    let config_path = find_main_config(project_dir)?;
    info!(path = ?config_path, "Loading project configuration");

    // 2. Chargement YAML
    let content = fs::read_to_string(&config_path)?;
    let mut config: ProjectConfig = serde_yaml::from_str(&content)?;

    // 3. Override via variables d'environnement (layering)
    // Permet de faire: CONMON_STORAGE_BACKEND=postgres conmon evaluate ...
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    // 4. Validation après override: la config finale est celle qui compte
    config
        .validate()
        .map_err(|e| InfrastructureError::ConfigError(e.to_string()))?;

    Ok(config)
}

fn find_main_config(root: &Path) -> Result<PathBuf, InfrastructureError> {
    for filename in CANDIDATES {
        let p = root.join(filename);
        if p.exists() {
            return Ok(p);
        }
    }
    Err(InfrastructureError::ConfigNotFound(format!(
        "No configuration file found in {:?}. Checked: {:?}",
        root, CANDIDATES
    )))
}

pub fn apply_env_overrides<F>(config: &mut ProjectConfig, lookup: F) -> Result<(), InfrastructureError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("CONMON_STORAGE_BACKEND") {
        let backend = val.parse::<StorageBackend>()?;
        info!(old = ?config.storage.backend, new = ?backend, "Overriding storage backend via ENV");
        config.storage.backend = backend;
    }
    if let Some(val) = lookup("CONMON_DATABASE_URL") {
        // pas de log de la valeur: elle contient le mot de passe
        info!("Overriding Postgres connection via ENV");
        config.storage.postgres.connection = val;
    }
    if let Some(val) = lookup("CONMON_DATA_DIR") {
        info!(old = ?config.storage.file.root, new = ?val, "Overriding data dir via ENV");
        config.storage.file.root = val;
    }
    if let Some(val) = lookup("CONMON_BATCH_SIZE") {
        match val.trim().parse::<usize>() {
            Ok(size) => {
                info!(old = config.results.batch_size, new = size, "Overriding batch size via ENV");
                config.results.batch_size = size;
            }
            Err(_) => warn!(value = %val, "Ignoring non-numeric CONMON_BATCH_SIZE"),
        }
    }
    Ok(())
}
