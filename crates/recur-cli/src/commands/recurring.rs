//! Recurring group report

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use recur_core::{db::Database, RecurrenceDetector};

use super::truncate;

/// Parse `--as-of` (YYYY-MM-DD) as midnight UTC, defaulting to the current time
pub fn parse_as_of(as_of: Option<&str>) -> Result<DateTime<Utc>> {
    match as_of {
        None => Ok(Utc::now()),
        Some(s) => {
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .context("Invalid --as-of date format (use YYYY-MM-DD)")?;
            let midnight = date
                .and_hms_opt(0, 0, 0)
                .context("Invalid --as-of date")?;
            Ok(Utc.from_utc_datetime(&midnight))
        }
    }
}

pub fn cmd_recurring(db: &Database, user: &str, as_of: Option<&str>, json: bool) -> Result<()> {
    let now = parse_as_of(as_of)?;
    let groups = RecurrenceDetector::new(db).recurring_for_owner(user, now)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }

    if groups.is_empty() {
        println!("No active recurring transactions for {}.", user);
        println!("Import more history with:");
        println!("  recur import --file batch.json --user {}", user);
        return Ok(());
    }

    println!();
    println!("🔁 Recurring Transactions for {}", user);
    println!("   ─────────────────────────────────────────────────────────────");

    for group in &groups {
        let next = group
            .projected_next_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "?".to_string());

        println!(
            "   {:28} │ {:>10.2} │ next {} │ {} charges",
            truncate(&group.label, 28),
            group.projected_amount,
            next,
            group.members.len()
        );
    }

    Ok(())
}
