// conmon-core/src/infrastructure/mod.rs

pub mod adapters;
pub mod config;
pub mod definitions;
pub mod error;
pub mod fs;
pub mod templates;
