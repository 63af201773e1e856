// conmon-core/src/infrastructure/adapters/flatfile/mod.rs

//! Directory-of-CSV store: one `<table>.csv` per table.
//!
//! Every mutation runs under a backup scope: the table file is copied to
//! `<table>.bak_<timestamp>` first, restored if the mutation fails, and old
//! backups are pruned once it succeeds. Calls on a table are serialized by a
//! per-table lock and bounded by the configured deadline.

pub mod backup;
pub mod codec;
pub mod filter;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

use crate::domain::query::{FileDialect, FileOperation, Operation, Query, QueryBackend, Row};
use crate::domain::result::{HISTORY_TABLE, RESULTS_TABLE, RESULT_KEY, ResultRecord, latest_per_key};
use crate::error::ConmonError;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::atomic_write;
use crate::ports::store::{ColumnSchema, Store};

use filter::{RowFilter, matches_all, sort_rows};

pub const DEFAULT_RETENTION: usize = 5;

/// In-memory image of one table file: header plus flat, decoded rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl FlatTable {
    fn add_columns<'a>(&mut self, names: impl IntoIterator<Item = &'a String>) {
        for name in names {
            if !self.columns.contains(name) {
                self.columns.push(name.clone());
            }
        }
    }

    /// Nested view of row `i`, padded columns included.
    fn nested(&self, i: usize) -> Row {
        codec::unflatten(&self.padded(&self.rows[i]))
    }

    fn padded(&self, row: &Row) -> Row {
        self.columns
            .iter()
            .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
            .collect()
    }

    /// `name` selects the column itself and every `name.*` child.
    fn project(&self, table: &str, wanted: &[String]) -> Result<Vec<String>, InfrastructureError> {
        if wanted.is_empty() {
            return Ok(self.columns.clone());
        }
        let mut out = Vec::new();
        for name in wanted {
            let prefix = format!("{}.", name);
            let before = out.len();
            for c in &self.columns {
                if (c == name || c.starts_with(&prefix)) && !out.contains(c) {
                    out.push(c.clone());
                }
            }
            if out.len() == before {
                return Err(InfrastructureError::UnknownColumn {
                    table: table.to_string(),
                    column: name.clone(),
                });
            }
        }
        Ok(out)
    }
}

// ============================================================================
// Synchronous engine (runs inside spawn_blocking)
// ============================================================================

#[derive(Debug, Clone)]
pub struct TableFiles {
    root: PathBuf,
    retention: usize,
}

impl TableFiles {
    pub fn new(root: impl Into<PathBuf>, retention: usize) -> Self {
        Self {
            root: root.into(),
            retention,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, table: &str) -> Result<PathBuf, InfrastructureError> {
        let valid = !table.is_empty()
            && !table.starts_with('.')
            && table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(InfrastructureError::ConfigError(format!(
                "Invalid table name '{}'",
                table
            )));
        }
        Ok(self.root.join(format!("{}.csv", table)))
    }

    fn ensure_root(&self) -> Result<(), InfrastructureError> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }

    pub fn load(&self, table: &str) -> Result<FlatTable, InfrastructureError> {
        let path = self.path(table)?;
        if !path.exists() {
            return Ok(FlatTable::default());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&path)?;
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() > columns.len() {
                return Err(InfrastructureError::CorruptTable(format!(
                    "{} (record {} has {} cells for {} columns)",
                    path.display(),
                    line + 1,
                    record.len(),
                    columns.len()
                )));
            }
            let row: Row = columns
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let cell = record.get(i).unwrap_or("");
                    (c.clone(), codec::decode_cell(table, c, cell))
                })
                .collect();
            rows.push(row);
        }
        Ok(FlatTable { columns, rows })
    }

    pub fn save(&self, table: &str, data: &FlatTable) -> Result<(), InfrastructureError> {
        self.ensure_root()?;
        let mut writer = csv::Writer::from_writer(Vec::new());
        if !data.columns.is_empty() {
            writer.write_record(&data.columns)?;
            for row in &data.rows {
                let cells = data.columns.iter().map(|c| {
                    codec::encode_cell(table, c, row.get(c).unwrap_or(&Value::Null))
                });
                writer.write_record(cells)?;
            }
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| InfrastructureError::Io(e.into_error()))?;
        atomic_write(self.path(table)?, bytes)
    }

    /// Runs `work` with every table in `tables` backed up first.
    /// On error all of them are restored, on success old backups are pruned.
    pub(crate) fn with_backups<T>(
        &self,
        tables: &[&str],
        work: impl FnOnce(&Self) -> Result<T, ConmonError>,
    ) -> Result<T, ConmonError> {
        self.ensure_root()?;
        let mut taken = Vec::with_capacity(tables.len());
        for table in tables {
            let file = self.path(table)?;
            let bak = backup::snapshot(&self.root, table, &file)?;
            taken.push((*table, file, bak));
        }

        match work(self) {
            Ok(value) => {
                for (table, _, _) in &taken {
                    if let Err(e) = backup::prune(&self.root, table, self.retention) {
                        warn!(table, error = %e, "Backup pruning failed");
                    }
                }
                Ok(value)
            }
            Err(err) => {
                for (table, file, bak) in &taken {
                    match backup::restore(file, bak.as_deref()) {
                        Ok(()) => warn!(table, "Mutation failed, table restored from backup"),
                        Err(e) => error!(table, error = %e, "Restore from backup failed"),
                    }
                }
                Err(err)
            }
        }
    }

    pub(crate) fn with_backup<T>(
        &self,
        table: &str,
        work: impl FnOnce(&Self) -> Result<T, ConmonError>,
    ) -> Result<T, ConmonError> {
        self.with_backups(&[table], work)
    }

    /// Interprets a file operation descriptor.
    pub fn execute(&self, op: FileOperation) -> Result<Vec<Row>, ConmonError> {
        match op {
            FileOperation::Select {
                table,
                select,
                conditions,
                order_by,
            } => {
                let data = self.load(&table)?;
                let filters = RowFilter::compile(&conditions)?;
                let projection = if data.columns.is_empty() {
                    Vec::new()
                } else {
                    data.project(&table, &select)?
                };

                let mut hits: Vec<(Row, usize)> = (0..data.rows.len())
                    .map(|i| (data.nested(i), i))
                    .filter(|(nested, _)| matches_all(&filters, nested))
                    .collect();
                if let Some(order) = &order_by {
                    sort_rows(&mut hits, order);
                }

                Ok(hits
                    .into_iter()
                    .map(|(nested, i)| {
                        if select.is_empty() {
                            return nested;
                        }
                        let row = &data.rows[i];
                        let flat: Row = projection
                            .iter()
                            .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                            .collect();
                        codec::unflatten(&flat)
                    })
                    .collect())
            }

            FileOperation::Insert { table, values } => self.with_backup(&table, |files| {
                let mut data = files.load(&table)?;
                let inserted = insert_rows(&mut data, std::slice::from_ref(&values));
                files.save(&table, &data)?;
                Ok(inserted)
            }),

            FileOperation::Update {
                table,
                values,
                conditions,
            } => self.with_backup(&table, |files| {
                let mut data = files.load(&table)?;
                let filters = RowFilter::compile(&conditions)?;
                let patch = codec::flatten(&values);
                data.add_columns(patch.keys());

                let mut updated = Vec::new();
                for i in 0..data.rows.len() {
                    if !matches_all(&filters, &data.nested(i)) {
                        continue;
                    }
                    let row = &mut data.rows[i];
                    for parent in values.keys() {
                        // Une mise à jour du parent efface ses enfants.
                        let prefix = format!("{}.", parent);
                        for (column, cell) in row.iter_mut() {
                            if column == parent || column.starts_with(&prefix) {
                                *cell = Value::Null;
                            }
                        }
                    }
                    for (column, value) in &patch {
                        row.insert(column.clone(), value.clone());
                    }
                    updated.push(i);
                }

                if !updated.is_empty() {
                    files.save(&table, &data)?;
                }
                Ok(updated.into_iter().map(|i| data.nested(i)).collect())
            }),

            FileOperation::Delete { table, conditions } => self.with_backup(&table, |files| {
                let mut data = files.load(&table)?;
                let filters = RowFilter::compile(&conditions)?;

                let mut kept = Vec::with_capacity(data.rows.len());
                let mut removed = Vec::new();
                for i in 0..data.rows.len() {
                    let nested = data.nested(i);
                    if matches_all(&filters, &nested) {
                        removed.push(nested);
                    } else {
                        kept.push(data.rows[i].clone());
                    }
                }

                if !removed.is_empty() {
                    data.rows = kept;
                    files.save(&table, &data)?;
                }
                Ok(removed)
            }),
        }
    }

    pub fn columns(&self, table: &str) -> Result<Vec<ColumnSchema>, InfrastructureError> {
        Ok(self
            .load(table)?
            .columns
            .into_iter()
            .map(|name| ColumnSchema {
                name,
                data_type: "text".to_string(),
                is_nullable: true,
            })
            .collect())
    }

    /// History append, current-state replace by key. Both files are restored
    /// together if anything fails.
    pub fn commit_result_batch(&self, records: &[ResultRecord]) -> Result<(), ConmonError> {
        let rows = records
            .iter()
            .map(ResultRecord::to_row)
            .collect::<Result<Vec<_>, _>>()?;
        let latest = latest_per_key(records)
            .into_iter()
            .map(ResultRecord::to_row)
            .collect::<Result<Vec<_>, _>>()?;

        self.with_backups(&[HISTORY_TABLE, RESULTS_TABLE], |files| {
            let mut history = files.load(HISTORY_TABLE)?;
            insert_rows(&mut history, &rows);
            files.save(HISTORY_TABLE, &history)?;

            let mut current = files.load(RESULTS_TABLE)?;
            current.rows.retain(|existing| {
                !records
                    .iter()
                    .any(|r| same_key(existing, &r.key()))
            });
            insert_rows(&mut current, &latest);
            files.save(RESULTS_TABLE, &current)?;
            Ok(())
        })
    }
}

fn insert_rows(data: &mut FlatTable, rows: &[Row]) -> Vec<Row> {
    let mut inserted = Vec::with_capacity(rows.len());
    for values in rows {
        let flat = codec::flatten(values);
        data.add_columns(flat.keys());
        data.rows.push(flat);
        inserted.push(data.nested(data.rows.len() - 1));
    }
    inserted
}

fn same_key(row: &Row, key: &Row) -> bool {
    RESULT_KEY
        .iter()
        .all(|k| matches!((row.get(*k), key.get(*k)), (Some(a), Some(b)) if a == b))
}

// ============================================================================
// Async adapter
// ============================================================================

pub struct FlatFileStore {
    files: TableFiles,
    call_timeout: Duration,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FlatFileStore {
    pub fn new(root: impl Into<PathBuf>, retention: usize, call_timeout: Duration) -> Self {
        Self {
            files: TableFiles::new(root, retention),
            call_timeout,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn files(&self) -> &TableFiles {
        &self.files
    }

    pub(crate) fn table_lock(&self, table: &str) -> Result<Arc<tokio::sync::Mutex<()>>, ConmonError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| ConmonError::InternalError("Flat-file lock table poisoned".into()))?;
        Ok(locks
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }

    /// Locks `tables` (sorted, so two calls never wait on each other in
    /// opposite order), then runs `work` on the blocking pool under the deadline.
    ///
    /// A deadline hit while waiting for the locks leaves the files untouched.
    /// Once `work` has started it runs to completion: a write then reports
    /// [`InfrastructureError::TimedOutMayHaveCommitted`].
    async fn run<T, F>(
        &self,
        operation: &'static str,
        tables: &[&str],
        writes: bool,
        work: F,
    ) -> Result<T, ConmonError>
    where
        T: Send + 'static,
        F: FnOnce(&TableFiles) -> Result<T, ConmonError> + Send + 'static,
    {
        let mut names: Vec<&str> = tables.to_vec();
        names.sort_unstable();
        names.dedup();
        let locks = names
            .iter()
            .map(|t| self.table_lock(t))
            .collect::<Result<Vec<_>, _>>()?;

        let files = self.files.clone();
        let started = Arc::new(AtomicBool::new(false));
        let in_flight = started.clone();
        let task = async move {
            let mut guards = Vec::with_capacity(locks.len());
            for lock in locks {
                guards.push(lock.lock_owned().await);
            }
            // Les verrous suivent le travail bloquant, même si le délai expire.
            tokio::task::spawn_blocking(move || {
                let _guards = guards;
                in_flight.store(true, AtomicOrdering::SeqCst);
                work(&files)
            })
            .await
            .map_err(InfrastructureError::from)?
        };

        let start = Instant::now();
        let result = tokio::time::timeout(self.call_timeout, task)
            .await
            .map_err(|_| {
                InfrastructureError::deadline(
                    operation,
                    self.call_timeout,
                    writes && started.load(AtomicOrdering::SeqCst),
                )
            })?;
        debug!(operation, elapsed = ?start.elapsed(), ok = result.is_ok(), "Flat-file call finished");
        result
    }

    async fn execute(&self, query: &Query, operation: Operation) -> Result<Vec<Row>, ConmonError> {
        let op = query.build(&FileDialect, operation)?;
        let table = op.table().to_string();
        let writes = operation != Operation::Select;
        self.run(op_name(operation), &[table.as_str()], writes, move |files| files.execute(op))
            .await
    }
}

fn op_name(operation: Operation) -> &'static str {
    match operation {
        Operation::Select => "flatfile.select",
        Operation::Insert => "flatfile.insert",
        Operation::Update => "flatfile.update",
        Operation::Delete => "flatfile.delete",
    }
}

#[async_trait]
impl Store for FlatFileStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    #[instrument(skip(self, query), fields(table = query.table_name()))]
    async fn select(&self, query: &Query) -> Result<Vec<Row>, ConmonError> {
        self.execute(query, Operation::Select).await
    }

    #[instrument(skip(self, query), fields(table = query.table_name()))]
    async fn insert(&self, query: &Query) -> Result<Vec<Row>, ConmonError> {
        self.execute(query, Operation::Insert).await
    }

    #[instrument(skip(self, query), fields(table = query.table_name()))]
    async fn update(&self, query: &Query) -> Result<Vec<Row>, ConmonError> {
        self.execute(query, Operation::Update).await
    }

    #[instrument(skip(self, query), fields(table = query.table_name()))]
    async fn delete(&self, query: &Query) -> Result<Vec<Row>, ConmonError> {
        self.execute(query, Operation::Delete).await
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnSchema>, ConmonError> {
        let name = table.to_string();
        self.run("flatfile.columns", &[table], false, move |files| {
            files.columns(&name).map_err(ConmonError::from)
        })
        .await
    }

    #[instrument(skip(self, records), fields(rows = records.len()))]
    async fn commit_result_batch(&self, records: &[ResultRecord]) -> Result<(), ConmonError> {
        let records = records.to_vec();
        self.run(
            "flatfile.commit_result_batch",
            &[HISTORY_TABLE, RESULTS_TABLE],
            true,
            move |files| files.commit_result_batch(&records),
        )
        .await
    }
}
