//! Import command implementation

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use recur_core::{db::Database, validate_batch, NewTransaction, RecurrenceDetector};
use tracing::info;

/// Validate and store a JSON batch for `user`; returns the number stored.
///
/// The whole file is rejected if any item is invalid or belongs to another user.
pub fn cmd_import(db: &Database, file: &Path, user: &str) -> Result<usize> {
    let reader = BufReader::new(
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?,
    );
    let batch: Vec<NewTransaction> = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse JSON batch: {}", file.display()))?;

    println!("📥 Importing {} transactions for {}...", batch.len(), user);

    let now = Utc::now();
    let transactions = validate_batch(&batch, user, now).context("Batch rejected")?;
    let stored = db.upsert_transactions(&transactions)?;
    info!(user = %user, count = stored, "Imported batch from {}", file.display());

    let groups = RecurrenceDetector::new(db).recurring_for_owner(user, now)?;

    println!("   Stored: {}", stored);
    println!("   Total on file: {}", db.count_transactions(user)?);
    println!("✅ {} active recurring groups", groups.len());
    if !groups.is_empty() {
        println!("   Run 'recur recurring --user {}' to see them", user);
    }

    Ok(stored)
}
