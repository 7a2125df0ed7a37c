//! In-process tabular store.
//!
//! Keeps every table as a vector of rows behind a `tokio` lock. Used as the
//! default backend for local runs and as the test double for intake logic.
//! A store built with [`MemoryStore::recording`] additionally keeps a log of
//! every call it receives and can be told to fail a specific operation once;
//! a plain store holds nothing but its tables.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use super::{StoreFuture, TabularStore};
use crate::{
    error::StoreError,
    models::{Row, TableRef},
};

/// Store operations, as recorded by [`MemoryStore::operations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    /// `get_or_create_table`
    GetOrCreateTable,
    /// `row_count`
    RowCount,
    /// `append_row`
    AppendRow,
    /// `health_check`
    HealthCheck,
}

/// Call log and pending failures of a recording store.
#[derive(Default)]
struct Journal {
    operations: RwLock<Vec<(StoreOperation, String)>>,
    injected: RwLock<HashMap<StoreOperation, StoreError>>,
}

/// In-memory store holding one implicit document.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,
    journal: Option<Arc<Journal>>,
}

impl MemoryStore {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty document that logs every call and accepts injected
    /// failures.
    pub fn recording() -> Self {
        Self { journal: Some(Arc::default()), ..Self::default() }
    }

    /// Whether calls are being logged.
    pub fn is_recording(&self) -> bool {
        self.journal.is_some()
    }

    /// Creates a table with pre-existing rows, as if edited by hand.
    pub async fn seed_table(&self, name: &str, rows: Vec<Row>) {
        self.tables.write().await.insert(name.to_string(), rows);
    }

    /// Makes the next call of `operation` fail with `error`.
    ///
    /// Has no effect unless the store was created with
    /// [`MemoryStore::recording`].
    pub async fn inject_failure(&self, operation: StoreOperation, error: StoreError) {
        match &self.journal {
            Some(journal) => {
                journal.injected.write().await.insert(operation, error);
            },
            None => tracing::warn!(?operation, "Failure injection ignored on non-recording store"),
        }
    }

    /// Returns a copy of the rows of a table, or `None` if it does not exist.
    pub async fn rows(&self, name: &str) -> Option<Vec<Row>> {
        self.tables.read().await.get(name).cloned()
    }

    /// Number of tables in the document.
    pub async fn table_count(&self) -> usize {
        self.tables.read().await.len()
    }

    /// Every operation received so far with the table it targeted.
    ///
    /// Always empty for a non-recording store.
    pub async fn operations(&self) -> Vec<(StoreOperation, String)> {
        match &self.journal {
            Some(journal) => journal.operations.read().await.clone(),
            None => Vec::new(),
        }
    }

    async fn record(&self, operation: StoreOperation, target: &str) -> Result<(), StoreError> {
        let Some(journal) = &self.journal else {
            return Ok(());
        };

        journal.operations.write().await.push((operation, target.to_string()));
        match journal.injected.write().await.remove(&operation) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl TabularStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn get_or_create_table<'a>(&'a self, name: &'a str) -> StoreFuture<'a, TableRef> {
        Box::pin(async move {
            self.record(StoreOperation::GetOrCreateTable, name).await?;
            self.tables.write().await.entry(name.to_string()).or_default();
            Ok(TableRef::named(name))
        })
    }

    fn row_count<'a>(&'a self, table: &'a TableRef) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            self.record(StoreOperation::RowCount, &table.name).await?;
            let tables = self.tables.read().await;
            let rows = tables
                .get(&table.name)
                .ok_or_else(|| StoreError::Backend(format!("table {table} not found")))?;
            Ok(rows.len() as u64)
        })
    }

    fn append_row<'a>(&'a self, table: &'a TableRef, row: Row) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.record(StoreOperation::AppendRow, &table.name).await?;
            let mut tables = self.tables.write().await;
            let rows = tables
                .get_mut(&table.name)
                .ok_or_else(|| StoreError::Backend(format!("table {table} not found")))?;
            rows.push(row);
            Ok(())
        })
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.record(StoreOperation::HealthCheck, "").await })
    }
}
