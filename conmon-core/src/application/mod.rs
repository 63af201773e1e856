// conmon-core/src/application/mod.rs

pub mod bootstrap;
pub mod catalog;
pub mod evaluation;
pub mod ports;
pub mod transfer;
pub mod writer;

// --- RE-EXPORTS (FACADE PATTERN) ---
// Le CLI fait `use conmon_core::application::{evaluate_checks, ResultWriter};`
// sans connaître la structure interne des fichiers.

pub use bootstrap::{LazyStore, open_store};
pub use catalog::{UpsertOutcome, load_checks, upsert_check};
pub use evaluation::evaluate_checks;
pub use transfer::{ImportReport, export_table, import_table};
pub use writer::{BulkReport, Destination, ResultWriter, aggregate};
