//! Tabular store abstraction over the document leads are written to.
//!
//! The intake operation needs exactly three calls from its backend: resolve a
//! table by name (creating it when absent), read its row count, and append a
//! row. Backends make no promise about concurrent callers; two requests racing
//! on an empty table may both see a row count of zero.

use std::{future::Future, pin::Pin};

use crate::{
    error::StoreResult,
    models::{Row, TableRef},
};

pub mod csv_file;
pub mod memory;
pub mod postgres;
pub mod sheets;

pub use csv_file::CsvStore;
pub use memory::{MemoryStore, StoreOperation};
pub use postgres::PostgresStore;
pub use sheets::{SheetsConfig, SheetsStore};

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Storage operations required by lead intake.
///
/// The document a store writes to is fixed when the store is constructed and
/// never changes afterwards.
pub trait TabularStore: Send + Sync + 'static {
    /// Short backend name for logs and health reports.
    fn backend_name(&self) -> &'static str;

    /// Looks up a table by name, creating it when it does not exist.
    fn get_or_create_table<'a>(&'a self, name: &'a str) -> StoreFuture<'a, TableRef>;

    /// Returns the number of rows currently in the table, header included.
    fn row_count<'a>(&'a self, table: &'a TableRef) -> StoreFuture<'a, u64>;

    /// Appends one row after the last row of the table.
    fn append_row<'a>(&'a self, table: &'a TableRef, row: Row) -> StoreFuture<'a, ()>;

    /// Verifies the backend is reachable.
    fn health_check(&self) -> StoreFuture<'_, ()>;
}
