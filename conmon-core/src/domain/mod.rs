// conmon-core/src/domain/mod.rs

pub mod check;
pub mod error;
pub mod query;
pub mod result;

// Re-exports pratiques pour simplifier les imports ailleurs
pub use error::DomainError;
