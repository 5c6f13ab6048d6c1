//! Transaction operations

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info, warn};

use super::Database;
use crate::error::{Error, Result};
use crate::models::Transaction;

/// Dates are stored in one fixed-width format so text order equals time order
fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_date(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

impl Database {
    /// Insert or replace a batch of validated transactions, keyed on transaction id.
    ///
    /// The batch is written in a single SQL transaction: either every row is
    /// stored or none is. An id already stored for a different owner fails
    /// the whole batch with [`Error::Forbidden`].
    pub fn upsert_transactions(&self, transactions: &[Transaction]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO transactions (trans_id, user_id, name, amount, date, company)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(trans_id) DO UPDATE SET
                    name = excluded.name,
                    amount = excluded.amount,
                    date = excluded.date,
                    company = excluded.company,
                    updated_at = CURRENT_TIMESTAMP
                WHERE transactions.user_id = excluded.user_id
                "#,
            )?;

            for t in transactions {
                let changed = stmt.execute(params![
                    t.id,
                    t.owner_id,
                    t.description,
                    t.amount,
                    format_date(&t.date),
                    t.merchant,
                ])?;

                // Zero rows changed: the id is stored under another owner.
                // Dropping `tx` without commit rolls the batch back.
                if changed == 0 {
                    warn!(
                        "Rejected batch for {}: transaction {} is owned by another user",
                        t.owner_id, t.id
                    );
                    return Err(Error::Forbidden(format!(
                        "transaction {} belongs to another user",
                        t.id
                    )));
                }
            }
        }

        tx.commit()?;
        info!("Upserted {} transactions", transactions.len());
        Ok(transactions.len())
    }

    /// All of an owner's transactions in detection order:
    /// merchant key, newest first, then amount
    pub fn list_transactions_for_detection(&self, owner_id: &str) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT trans_id, user_id, name, amount, date, company
            FROM transactions
            WHERE user_id = ?
            ORDER BY company, date DESC, amount
            "#,
        )?;

        let transactions = stmt
            .query_map(params![owner_id], |row| Self::row_to_transaction(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(
            "Loaded {} transactions for {}",
            transactions.len(),
            owner_id
        );
        Ok(transactions)
    }

    /// Get a single transaction by id
    pub fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let transaction = conn
            .query_row(
                "SELECT trans_id, user_id, name, amount, date, company FROM transactions WHERE trans_id = ?",
                params![id],
                |row| Self::row_to_transaction(row),
            )
            .optional()?;
        Ok(transaction)
    }

    /// Count an owner's stored transactions
    pub fn count_transactions(&self, owner_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?",
            params![owner_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete all of an owner's transactions, returning how many were removed
    pub fn delete_transactions(&self, owner_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM transactions WHERE user_id = ?",
            params![owner_id],
        )?;
        info!("Deleted {} transactions for {}", deleted, owner_id);
        Ok(deleted)
    }

    fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let date: String = row.get(4)?;
        Ok(Transaction {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            description: row.get(2)?,
            amount: row.get(3)?,
            date: parse_date(&date)?,
            merchant: row.get(5)?,
        })
    }
}
