//! PostgreSQL backend tests against a live database.
//!
//! Set `DATABASE_URL` to run them; without it each test returns early. Every
//! test works on its own uniquely named table, so runs do not interfere.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use leadsheet_core::{LeadIntake, PostgresStore, Row, TableRef, TabularStore};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::OnceCell;
use uuid::Uuid;

// Concurrent CREATE TABLE IF NOT EXISTS can collide in the catalog.
static SCHEMA: OnceCell<()> = OnceCell::const_new();

async fn test_store() -> Option<PostgresStore> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping postgres test");
        return None;
    };

    let pool = PgPoolOptions::new().max_connections(4).connect(&url).await.unwrap();
    let store = PostgresStore::new(pool);
    SCHEMA.get_or_init(|| async { store.ensure_schema().await.unwrap() }).await;
    Some(store)
}

fn unique_table() -> String {
    format!("leads-{}", Uuid::new_v4())
}

fn row(cells: &[&str]) -> Row {
    Row(cells.iter().map(|c| (*c).to_string()).collect())
}

#[tokio::test]
async fn schema_creation_is_idempotent() {
    let Some(store) = test_store().await else { return };

    store.ensure_schema().await.unwrap();
    store.health_check().await.unwrap();
}

#[tokio::test]
async fn get_or_create_returns_same_table() {
    let Some(store) = test_store().await else { return };
    let name = unique_table();

    let first = store.get_or_create_table(&name).await.unwrap();
    let second = store.get_or_create_table(&name).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.name, name);
    assert!(first.id.is_some());
    assert_eq!(store.row_count(&first).await.unwrap(), 0);
}

#[tokio::test]
async fn row_count_tracks_appends() {
    let Some(store) = test_store().await else { return };
    let table = store.get_or_create_table(&unique_table()).await.unwrap();

    store.append_row(&table, Row::header()).await.unwrap();
    assert_eq!(store.row_count(&table).await.unwrap(), 1);

    store.append_row(&table, row(&["2024-05-01", "", "Ann"])).await.unwrap();
    assert_eq!(store.row_count(&table).await.unwrap(), 2);
}

#[tokio::test]
async fn rows_come_back_in_append_order() {
    let Some(store) = test_store().await else { return };
    let table = store.get_or_create_table(&unique_table()).await.unwrap();
    let appended = vec![Row::header(), row(&["a"]), row(&["b", "c"]), row(&["", "quote\"d"])];

    for r in &appended {
        store.append_row(&table, r.clone()).await.unwrap();
    }

    assert_eq!(store.rows(&table).await.unwrap(), appended);
}

#[tokio::test]
async fn tables_are_isolated() {
    let Some(store) = test_store().await else { return };
    let left = store.get_or_create_table(&unique_table()).await.unwrap();
    let right = store.get_or_create_table(&unique_table()).await.unwrap();

    store.append_row(&left, Row::header()).await.unwrap();

    assert_eq!(store.row_count(&left).await.unwrap(), 1);
    assert_eq!(store.row_count(&right).await.unwrap(), 0);
    assert!(store.rows(&TableRef::named(unique_table())).await.unwrap().is_empty());
}

#[tokio::test]
async fn intake_writes_header_then_rows() {
    let Some(store) = test_store().await else { return };
    let name = unique_table();
    let intake = LeadIntake::new(Arc::new(store.clone()), name.clone());

    let first = intake.ingest_body(br#"{"name":"Ann","budget":1e3}"#).await.unwrap();
    let second = intake.ingest_body(br#"{"name":"Bob"}"#).await.unwrap();

    assert!(first.header_written);
    assert!(!second.header_written);
    let rows = store.rows(&TableRef::named(name)).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].is_header());
    assert_eq!(rows[1].cells()[5], "1000");
    assert_eq!(rows[2].cells()[2], "Bob");
}
