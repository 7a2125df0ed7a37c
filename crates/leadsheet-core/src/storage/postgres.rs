//! PostgreSQL backend.
//!
//! Models the document as two tables: `sheet_tables` lists table names and
//! `sheet_rows` holds rows as JSONB arrays of cells, numbered from 1 in
//! append order. Row numbers are derived from the current count without a
//! lock, so concurrent appends behave like the hosted spreadsheet: no
//! ordering promise between callers.

use sqlx::{types::Json, PgPool};
use tracing::debug;

use super::{StoreFuture, TabularStore};
use crate::{
    error::StoreResult,
    models::{Row, TableRef},
};

/// Database-backed store.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the backing tables if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns a store error if any DDL statement fails.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS sheet_tables (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS sheet_rows (
                id BIGSERIAL PRIMARY KEY,
                table_name TEXT NOT NULL REFERENCES sheet_tables(name),
                row_number BIGINT NOT NULL,
                cells JSONB NOT NULL,
                appended_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_sheet_rows_table
            ON sheet_rows(table_name, row_number)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Reads all rows of a table in row-number order.
    ///
    /// Intake never reads rows back; this exists for operators and tests.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    pub async fn rows(&self, table: &TableRef) -> StoreResult<Vec<Row>> {
        let rows: Vec<(Json<Vec<String>>,)> = sqlx::query_as(
            r"
            SELECT cells
            FROM sheet_rows
            WHERE table_name = $1
            ORDER BY row_number, id
            ",
        )
        .bind(&table.name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(Json(cells),)| Row(cells)).collect())
    }
}

impl TabularStore for PostgresStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    fn get_or_create_table<'a>(&'a self, name: &'a str) -> StoreFuture<'a, TableRef> {
        Box::pin(async move {
            sqlx::query("INSERT INTO sheet_tables (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
                .bind(name)
                .execute(&self.pool)
                .await?;

            let id: i64 = sqlx::query_scalar("SELECT id FROM sheet_tables WHERE name = $1")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;

            Ok(TableRef::named(name).with_id(id))
        })
    }

    fn row_count<'a>(&'a self, table: &'a TableRef) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM sheet_rows WHERE table_name = $1")
                    .bind(&table.name)
                    .fetch_one(&self.pool)
                    .await?;

            Ok(u64::try_from(count).unwrap_or_default())
        })
    }

    fn append_row<'a>(&'a self, table: &'a TableRef, row: Row) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let cells = Json(row.into_cells());

            let row_number: i64 = sqlx::query_scalar(
                r"
                INSERT INTO sheet_rows (table_name, row_number, cells)
                SELECT $1, COUNT(*) + 1, $2
                FROM sheet_rows
                WHERE table_name = $1
                RETURNING row_number
                ",
            )
            .bind(&table.name)
            .bind(cells)
            .fetch_one(&self.pool)
            .await?;

            debug!(table = %table, row_number, "Row appended");
            Ok(())
        })
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
            Ok(())
        })
    }
}
