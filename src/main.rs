//! Lead intake webhook.
//!
//! Main entry point. Loads configuration, connects the configured tabular
//! store and serves the intake endpoint until shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use leadsheet_api::{AppState, Config, StoreBackend};
use leadsheet_core::{CsvStore, MemoryStore, PostgresStore, SheetsStore, TabularStore};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_tracing(&config.rust_log)?;

    info!("Starting lead intake service");
    info!(
        backend = ?config.store_backend,
        document = %config.document_description(),
        table = %config.table_name,
        serialize_intake = config.serialize_intake,
        "Configuration loaded"
    );

    if let Some(warning) = config.durability_warning() {
        warn!("{warning}");
    }

    let store = create_store(&config).await?;
    info!(backend = store.backend_name(), "Store ready");

    let addr = config.parse_server_addr()?;
    let state = AppState::from_config(&config, store);

    leadsheet_api::start_server(state, addr, config.request_timeout())
        .await
        .context("HTTP server failed")?;

    info!("Lead intake shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
///
/// `RUST_LOG` from the process environment wins over the configured level.
fn init_tracing(configured: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{configured},leadsheet=debug,tower_http=debug")))
        .context("Invalid log filter")?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    Ok(())
}

/// Builds the store selected by configuration.
async fn create_store(config: &Config) -> Result<Arc<dyn TabularStore>> {
    let store: Arc<dyn TabularStore> = match config.store_backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Sheets => Arc::new(
            SheetsStore::new(config.to_sheets_config())
                .context("Failed to create Sheets client")?,
        ),
        StoreBackend::Postgres => {
            let pool = create_database_pool(config).await?;
            let store = PostgresStore::new(pool);
            store.ensure_schema().await.context("Failed to create lead tables")?;
            Arc::new(store)
        },
        StoreBackend::Csv => Arc::new(CsvStore::new(&config.csv_directory)),
    };
    Ok(store)
}

/// Creates the database connection pool with retry logic.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    let mut retries = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                info!(database_url = %config.database_url_masked(), "Database connection pool established");
                return Ok(pool);
            },
            Err(_e) if retries < MAX_RETRIES => {
                retries += 1;
                info!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    "Database connection failed, retrying..."
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}
