//! The lead intake operation.
//!
//! One call resolves the target table, writes the header row if the table is
//! empty, and appends the lead as a data row. Failures propagate unchanged;
//! there is no retry and no cleanup, so a failure after the header write
//! leaves a header-only table that the next call proceeds past.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::{
    error::Result,
    models::{LeadRecord, Row, TableRef, DEFAULT_TABLE_NAME},
    storage::TabularStore,
};

/// Fixed acknowledgment returned for every accepted lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgment {
    /// Always `true`.
    pub ok: bool,
}

impl Acknowledgment {
    /// The `{"ok": true}` payload.
    pub const fn ok() -> Self {
        Self { ok: true }
    }
}

/// What a successful intake wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeOutcome {
    /// Table the row went to.
    pub table: TableRef,
    /// Whether this call wrote the header row first.
    pub header_written: bool,
    /// The appended data row.
    pub row: Row,
}

/// Appends leads to a single table of a single store.
pub struct LeadIntake {
    store: Arc<dyn TabularStore>,
    table_name: String,
    write_lock: Option<Mutex<()>>,
}

impl LeadIntake {
    /// Creates an intake bound to `table_name` in `store`.
    pub fn new(store: Arc<dyn TabularStore>, table_name: impl Into<String>) -> Self {
        Self { store, table_name: table_name.into(), write_lock: None }
    }

    /// Creates an intake bound to the default `Leads` table.
    pub fn with_default_table(store: Arc<dyn TabularStore>) -> Self {
        Self::new(store, DEFAULT_TABLE_NAME)
    }

    /// Serializes intake calls made through this instance.
    ///
    /// Without it two concurrent first requests may both create the table or
    /// both write a header row. The lock is process-local: other processes
    /// writing to the same document still race.
    #[must_use]
    pub fn serialized(mut self) -> Self {
        self.write_lock = Some(Mutex::new(()));
        self
    }

    /// Whether calls are serialized.
    pub fn is_serialized(&self) -> bool {
        self.write_lock.is_some()
    }

    /// Name of the target table.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// The store rows are written to.
    pub fn store(&self) -> &Arc<dyn TabularStore> {
        &self.store
    }

    /// Parses a raw request body and ingests it.
    ///
    /// The body is parsed before any store call, so a malformed body leaves
    /// the store untouched.
    ///
    /// # Errors
    ///
    /// Returns `LeadsheetError::Parse` for bodies that are not a JSON object,
    /// and `LeadsheetError::Store` for any store failure.
    pub async fn ingest_body(&self, body: &[u8]) -> Result<IntakeOutcome> {
        let record = LeadRecord::parse(body)?;
        self.ingest(&record).await
    }

    /// Writes one lead to the table.
    ///
    /// # Errors
    ///
    /// Returns `LeadsheetError::Store` if resolving the table, reading its row
    /// count, or appending fails.
    #[instrument(name = "lead_intake", skip(self, record), fields(table = %self.table_name))]
    pub async fn ingest(&self, record: &LeadRecord) -> Result<IntakeOutcome> {
        let _guard = match &self.write_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let table = self.store.get_or_create_table(&self.table_name).await?;
        let header_written = self.ensure_header(&table).await?;

        let row = record.to_row();
        self.store.append_row(&table, row.clone()).await?;

        debug!(header_written, fields = record.field_count(), "Lead row appended");
        Ok(IntakeOutcome { table, header_written, row })
    }

    /// Writes the header row if the table has no rows. Returns whether it did.
    ///
    /// An existing first row is never inspected or corrected.
    async fn ensure_header(&self, table: &TableRef) -> Result<bool> {
        if self.store.row_count(table).await? > 0 {
            return Ok(false);
        }

        info!(table = %table, backend = self.store.backend_name(), "Writing header row");
        self.store.append_row(table, Row::header()).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        error::{LeadsheetError, StoreError},
        storage::{memory::StoreOperation, MemoryStore},
    };

    fn intake(store: &MemoryStore) -> LeadIntake {
        LeadIntake::with_default_table(Arc::new(store.clone()))
    }

    #[test]
    fn acknowledgment_is_fixed() {
        insta::assert_json_snapshot!(Acknowledgment::ok(), @r###"
        {
          "ok": true
        }
        "###);
    }

    #[tokio::test]
    async fn first_call_writes_header_then_row() {
        let store = MemoryStore::new();

        let outcome = intake(&store).ingest_body(br#"{"name":"Anna"}"#).await.unwrap();

        assert!(outcome.header_written);
        let rows = store.rows("Leads").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_header());
        assert_eq!(rows[1], outcome.row);
    }

    #[tokio::test]
    async fn store_calls_follow_fixed_sequence() {
        let store = MemoryStore::recording();

        intake(&store).ingest_body(b"{}").await.unwrap();

        let operations: Vec<_> = store.operations().await.into_iter().map(|(op, _)| op).collect();
        assert_eq!(operations, [
            StoreOperation::GetOrCreateTable,
            StoreOperation::RowCount,
            StoreOperation::AppendRow,
            StoreOperation::AppendRow,
        ]);
    }

    #[tokio::test]
    async fn existing_first_row_is_left_alone() {
        let store = MemoryStore::new();
        let edited = Row(vec!["Created".into(), "Niche".into()]);
        store.seed_table("Leads", vec![edited.clone()]).await;

        let outcome = intake(&store).ingest(&LeadRecord::default()).await.unwrap();

        assert!(!outcome.header_written);
        let rows = store.rows("Leads").await.unwrap();
        assert_eq!(rows[0], edited);
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn parse_failure_touches_nothing() {
        let store = MemoryStore::recording();

        let result = intake(&store).ingest_body(b"{bad").await;

        assert!(matches!(result, Err(LeadsheetError::Parse { .. })));
        assert!(store.operations().await.is_empty());
        assert_eq!(store.table_count().await, 0);
    }

    #[tokio::test]
    async fn failed_append_after_header_leaves_header_only_table() {
        let store = MemoryStore::recording();
        let intake = intake(&store);
        // Header already present; the data row append is the one that fails.
        let table = store.get_or_create_table("Leads").await.unwrap();
        store.append_row(&table, Row::header()).await.unwrap();
        store
            .inject_failure(StoreOperation::AppendRow, StoreError::QuotaExceeded("quota".into()))
            .await;

        let result = intake.ingest(&LeadRecord::default()).await;
        assert!(matches!(result, Err(LeadsheetError::Store(StoreError::QuotaExceeded(_)))));
        assert_eq!(store.rows("Leads").await.unwrap().len(), 1);

        let retry = intake.ingest(&LeadRecord::default()).await.unwrap();
        assert!(!retry.header_written);
        assert_eq!(store.rows("Leads").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn custom_table_name_is_used() {
        let store = MemoryStore::new();
        let intake = LeadIntake::new(Arc::new(store.clone()), "Inbound");

        intake.ingest(&LeadRecord::from_map(json!({"phone": "1"}).as_object().cloned().unwrap()))
            .await
            .unwrap();

        assert!(store.rows("Leads").await.is_none());
        assert_eq!(store.rows("Inbound").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn serialized_intake_writes_single_header_under_concurrency() {
        let store = MemoryStore::new();
        let intake = Arc::new(intake(&store).serialized());

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let intake = intake.clone();
                tokio::spawn(async move {
                    let body = format!(r#"{{"name":"lead-{i}"}}"#);
                    intake.ingest_body(body.as_bytes()).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let rows = store.rows("Leads").await.unwrap();
        assert_eq!(rows.len(), 17);
        assert_eq!(rows.iter().filter(|row| row.is_header()).count(), 1);
        assert!(rows[0].is_header());
    }
}
