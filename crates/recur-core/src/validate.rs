//! Ingestion validation for submitted transaction batches
//!
//! A batch is accepted or rejected as a whole. Nothing reaches the store or
//! the grouper until every item has passed.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::merchant::extract_merchant;
use crate::models::{NewTransaction, Transaction};

/// Characters rejected in any text field
pub const DISALLOWED_CHARS: &[char] = &['<', '>', '`', '"', '/', ':', '?', '(', ')', '#', ';'];

/// Validate a submitted batch on behalf of `caller`.
///
/// Every item must belong to the caller; an ownership mismatch is reported
/// as [`Error::Forbidden`] ahead of any structural problem with that item.
/// Missing dates default to `now`.
pub fn validate_batch(
    batch: &[NewTransaction],
    caller: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Transaction>> {
    if batch.is_empty() {
        return Err(Error::EmptyBatch);
    }

    let validated = batch
        .iter()
        .enumerate()
        .map(|(index, item)| validate_item(index, item, caller, now))
        .collect::<Result<Vec<_>>>()?;

    debug!("Validated {} transactions for {}", validated.len(), caller);
    Ok(validated)
}

fn validate_item(
    index: usize,
    item: &NewTransaction,
    caller: &str,
    now: DateTime<Utc>,
) -> Result<Transaction> {
    if let Some(owner) = item.owner_id.as_deref().map(str::trim) {
        if !owner.is_empty() && owner != caller {
            warn!("Rejected transaction {} owned by another user", index);
            return Err(Error::Forbidden(format!(
                "transaction {} belongs to another user",
                index
            )));
        }
    }

    let id = required_text(index, "trans_id", item.id.as_deref())?;
    let owner_id = required_text(index, "user_id", item.owner_id.as_deref())?;
    let description = required_text(index, "name", item.description.as_deref())?;

    let amount = match &item.amount {
        None => return Err(invalid(index, "amount", "is required")),
        Some(input) => input
            .value()
            .ok_or_else(|| invalid(index, "amount", "must be a number"))?,
    };

    let merchant = extract_merchant(&description);
    check_chars(index, "company", &merchant)?;

    Ok(Transaction {
        id,
        owner_id,
        description,
        amount,
        date: item.date.unwrap_or(now),
        merchant,
    })
}

fn required_text(index: usize, field: &str, value: Option<&str>) -> Result<String> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(invalid(index, field, "is required"));
    }
    check_chars(index, field, value)?;
    Ok(value.to_string())
}

fn check_chars(index: usize, field: &str, value: &str) -> Result<()> {
    match value.chars().find(|c| DISALLOWED_CHARS.contains(c)) {
        Some(c) => Err(invalid(
            index,
            field,
            &format!("contains disallowed character '{}'", c),
        )),
        None => Ok(()),
    }
}

fn invalid(index: usize, field: &str, problem: &str) -> Error {
    Error::Validation(format!("transaction {}: {} {}", index, field, problem))
}
