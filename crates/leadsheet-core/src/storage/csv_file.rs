//! CSV file backend.
//!
//! The document is a directory; each table is a `{name}.csv` file inside it.
//! Every call opens the file afresh, so rows appended by other processes are
//! counted. File I/O runs on tokio's blocking pool. As with the other
//! backends, nothing arbitrates between concurrent writers.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

use tracing::debug;

use super::{StoreFuture, TabularStore};
use crate::{
    error::{StoreError, StoreResult},
    models::{Row, TableRef},
};

/// Directory-backed store with one CSV file per table.
#[derive(Debug, Clone)]
pub struct CsvStore {
    directory: PathBuf,
}

impl CsvStore {
    /// Creates a store over `directory`. The directory is created on first
    /// use.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    /// Directory holding the table files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file backing `name`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Backend` for names that are empty or would
    /// escape the directory.
    pub fn table_path(&self, name: &str) -> StoreResult<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\', '\0']) || name.contains("..") {
            return Err(StoreError::Backend(format!("invalid table name for csv store: {name:?}")));
        }
        Ok(self.directory.join(format!("{name}.csv")))
    }

    /// Reads all rows of a table in file order.
    ///
    /// Intake never reads rows back; this exists for operators and tests.
    ///
    /// # Errors
    ///
    /// Returns a store error if the file is missing or unreadable.
    pub async fn rows(&self, table: &TableRef) -> StoreResult<Vec<Row>> {
        let path = self.table_path(&table.name)?;
        blocking(move || {
            let mut reader = reader_for(&path)?;
            let mut rows = Vec::new();
            for record in reader.records() {
                rows.push(Row(record?.iter().map(str::to_string).collect()));
            }
            Ok(rows)
        })
        .await
    }
}

impl TabularStore for CsvStore {
    fn backend_name(&self) -> &'static str {
        "csv"
    }

    fn get_or_create_table<'a>(&'a self, name: &'a str) -> StoreFuture<'a, TableRef> {
        Box::pin(async move {
            let path = self.table_path(name)?;
            let directory = self.directory.clone();
            blocking(move || {
                fs::create_dir_all(&directory)?;
                // Append mode creates a missing file and never truncates.
                OpenOptions::new().create(true).append(true).open(&path)?;
                Ok(())
            })
            .await?;

            Ok(TableRef::named(name))
        })
    }

    fn row_count<'a>(&'a self, table: &'a TableRef) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let path = self.table_path(&table.name)?;
            blocking(move || {
                let mut reader = reader_for(&path)?;
                let mut count = 0_u64;
                for record in reader.byte_records() {
                    record?;
                    count += 1;
                }
                Ok(count)
            })
            .await
        })
    }

    fn append_row<'a>(&'a self, table: &'a TableRef, row: Row) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let path = self.table_path(&table.name)?;
            blocking(move || {
                let file = OpenOptions::new().append(true).open(&path).map_err(|e| {
                    StoreError::Backend(format!("table file {} not found: {e}", path.display()))
                })?;
                let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
                writer.write_record(row.cells())?;
                writer.flush()?;
                Ok(())
            })
            .await?;

            debug!(table = %table, "Row appended to csv file");
            Ok(())
        })
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let directory = self.directory.clone();
            blocking(move || {
                fs::create_dir_all(&directory)?;
                let metadata = fs::metadata(&directory)?;
                if metadata.permissions().readonly() {
                    return Err(StoreError::PermissionDenied(format!(
                        "{} is read-only",
                        directory.display()
                    )));
                }
                Ok(())
            })
            .await
        })
    }
}

fn reader_for(path: &Path) -> StoreResult<csv::Reader<fs::File>> {
    let file = fs::File::open(path).map_err(|e| {
        StoreError::Backend(format!("table file {} not found: {e}", path.display()))
    })?;
    Ok(csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(file))
}

async fn blocking<T, F>(work: F) -> StoreResult<T>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StoreError::Backend(format!("csv store task failed: {e}")))?
}
