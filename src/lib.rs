//! News-driven stock sentiment engine: de-duplicated article ingestion,
//! per-ticker mention evidence, multi-strategy sentiment aggregation,
//! horizon-based price predictions, and reconciliation of predictions
//! against realized moves.
//!
//! All mutating operations are idempotent against their unique keys, so
//! concurrent or re-entrant ingestion workers can safely replay work.

pub mod config;
pub mod db;
pub mod error;
pub mod forecast;
pub mod models;
pub mod outcome;
pub mod pipeline;
pub mod sentiment;

pub use config::Config;
pub use db::Repository;
pub use error::{AppError, Result};
