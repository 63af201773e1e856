// conmon-core/src/ports/mod.rs

pub mod store;

pub use store::{ColumnSchema, Store};
