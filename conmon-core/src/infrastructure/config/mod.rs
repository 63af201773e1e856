// conmon-core/src/infrastructure/config/mod.rs

pub mod project;

pub use project::{
    EvaluationConfig, FileStoreConfig, ProjectConfig, ResultsConfig, StorageBackend,
    StorageConfig, load_project_config,
};
