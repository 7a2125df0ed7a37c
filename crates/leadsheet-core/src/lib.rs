//! Lead intake core.
//!
//! Domain model for submitted leads, the tabular store abstraction they are
//! written through, and the intake operation tying the two together.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod intake;
pub mod models;
pub mod storage;

pub use error::{LeadsheetError, Result, StoreError, StoreResult};
pub use intake::{Acknowledgment, IntakeOutcome, LeadIntake};
pub use models::{coerce_cell, LeadRecord, Row, TableRef, DEFAULT_TABLE_NAME, HEADER_ROW};
pub use storage::{
    CsvStore, MemoryStore, PostgresStore, SheetsConfig, SheetsStore, StoreOperation,
    TabularStore,
};
