// conmon-core/src/infrastructure/adapters/mod.rs

pub mod flatfile;
pub mod postgres;

pub use flatfile::FlatFileStore;
pub use postgres::{PostgresStore, PostgresStoreConfig};
