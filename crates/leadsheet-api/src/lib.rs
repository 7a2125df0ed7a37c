//! Leadsheet HTTP API.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use leadsheet_core::{LeadIntake, TabularStore};

pub mod config;
pub mod handlers;
pub mod server;

pub use config::{Config, StoreBackend};
pub use server::{create_router, start_server};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Intake bound to the configured table.
    pub intake: Arc<LeadIntake>,
    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl AppState {
    /// Creates state over an intake with the given body limit.
    pub fn new(intake: LeadIntake, max_body_bytes: usize) -> Self {
        Self { intake: Arc::new(intake), max_body_bytes }
    }

    /// Builds state from configuration and an already-constructed store.
    pub fn from_config(config: &Config, store: Arc<dyn TabularStore>) -> Self {
        let intake = LeadIntake::new(store, config.table_name.clone());
        let intake = if config.serialize_intake { intake.serialized() } else { intake };
        Self::new(intake, config.max_body_bytes)
    }

    /// The store the intake writes to.
    pub fn store(&self) -> &Arc<dyn TabularStore> {
        self.intake.store()
    }
}
