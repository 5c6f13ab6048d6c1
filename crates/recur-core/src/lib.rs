//! Recur Core Library
//!
//! Shared functionality for the Recur recurring-transaction detector:
//! - Merchant key extraction from raw transaction descriptions
//! - Recurrence grouping (cadence inference, projected amounts, staleness)
//! - Ingestion validation for submitted transaction batches
//! - Database access and migrations

pub mod db;
pub mod detect;
pub mod error;
pub mod merchant;
pub mod models;
pub mod validate;

pub use db::Database;
pub use detect::{detect_recurring, DetectionConfig, RecurrenceDetector};
pub use error::{Error, Result};
pub use merchant::extract_merchant;
pub use models::{Cadence, NewTransaction, RecurringGroup, Transaction};
pub use validate::validate_batch;
