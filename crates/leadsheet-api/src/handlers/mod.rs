//! HTTP request handlers.
//!
//! - `intake` - lead intake endpoint
//! - `health` - health, readiness and liveness checks
//!
//! Error responses share one shape: `{"error": {"code", "message"}}`.

pub mod health;
pub mod intake;

pub use health::{health_check, liveness_check, readiness_check};
pub use intake::intake_lead;
