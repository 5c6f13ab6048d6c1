//! Recurring transaction detection
//!
//! Groups a user's transactions into recurring charges (subscriptions, bills,
//! paychecks) in a single forward scan:
//! - Transactions are partitioned by owner and merchant key
//! - Each transaction joins the first open group with a similar amount and a
//!   date that fits the group's cadence (inferring the cadence on the second
//!   member)
//! - Groups whose projected next charge is more than the grace period in the
//!   past stop accepting members
//! - Only groups with more than one member are reported

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::Result;
use crate::models::{Cadence, RecurringGroup, Transaction};

const MS_PER_DAY: i64 = 86_400_000;

/// Detection configuration
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Allowed relative distance from the group's average amount (exclusive)
    pub amount_variance: f64,
    /// Days a projected charge may be overdue before the group counts as inactive
    pub grace_days: i64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            amount_variance: 0.25,
            grace_days: 4,
        }
    }
}

/// Outcome of a successful date comparison against a group
#[derive(Debug, Clone, Copy, PartialEq)]
enum DateMatch {
    /// First gap for the group: cadence and projection are now known
    Inferred {
        cadence: Cadence,
        next_date: DateTime<Utc>,
    },
    /// Candidate lands where the known cadence expects it
    OnCadence,
}

/// A recurring group under construction during one detection pass
#[derive(Debug)]
struct GroupBuilder {
    label: String,
    owner_id: String,
    projected_amount: f64,
    projected_next_date: Option<DateTime<Utc>>,
    cadence: Cadence,
    most_recent_date: DateTime<Utc>,
    members: Vec<Transaction>,
}

impl GroupBuilder {
    fn seed(tx: &Transaction) -> Self {
        Self {
            label: tx.description.clone(),
            owner_id: tx.owner_id.clone(),
            projected_amount: tx.amount,
            projected_next_date: None,
            cadence: Cadence::Unknown,
            most_recent_date: tx.date,
            members: vec![tx.clone()],
        }
    }

    /// Amounts match when equal, or when they share a sign and the candidate
    /// lies strictly inside the variance band around the group average.
    fn amount_matches(&self, amount: f64, variance: f64) -> bool {
        let average = self.projected_amount;
        if amount == average {
            return true;
        }
        if (amount > 0.0 && average < 0.0) || (amount < 0.0 && average > 0.0) {
            return false;
        }
        let offset = (average * variance).abs();
        amount > average - offset && amount < average + offset
    }

    fn date_matches(&self, date: DateTime<Utc>) -> Option<DateMatch> {
        match (self.cadence.period_days(), self.cadence.tolerance_days()) {
            (Some(period), Some(tolerance)) => {
                let expected = self.most_recent_date - Duration::days(period);
                let tolerance = Duration::days(tolerance);
                (date > expected - tolerance && date < expected + tolerance)
                    .then_some(DateMatch::OnCadence)
            }
            _ => {
                // Scan order is newest first, so the gap is normally non-negative
                let gap_days = (self.most_recent_date - date)
                    .num_milliseconds()
                    .div_euclid(MS_PER_DAY);
                let cadence = Cadence::from_gap_days(gap_days)?;
                let period = cadence.period_days()?;
                Some(DateMatch::Inferred {
                    cadence,
                    next_date: self.most_recent_date + Duration::days(period),
                })
            }
        }
    }

    fn evaluate(&self, tx: &Transaction, config: &DetectionConfig) -> Option<DateMatch> {
        if !self.amount_matches(tx.amount, config.amount_variance) {
            return None;
        }
        self.date_matches(tx.date)
    }

    fn is_active(&self, now: DateTime<Utc>, grace_days: i64) -> bool {
        self.projected_next_date
            .is_some_and(|next| next > now - Duration::days(grace_days))
    }

    /// Record a matched candidate. Returns false when the group is stale and
    /// the candidate was dropped.
    fn accept(
        &mut self,
        tx: &Transaction,
        matched: DateMatch,
        now: DateTime<Utc>,
        config: &DetectionConfig,
    ) -> bool {
        if let DateMatch::Inferred { cadence, next_date } = matched {
            self.cadence = cadence;
            self.projected_next_date = Some(next_date);
        }
        self.most_recent_date = tx.date;

        if !self.is_active(now, config.grace_days) {
            return false;
        }

        let count = self.members.len() as f64;
        self.projected_amount = (self.projected_amount * count + tx.amount) / (count + 1.0);
        self.members.push(tx.clone());
        true
    }

    fn finish(self) -> Option<RecurringGroup> {
        if self.members.len() < 2 {
            return None;
        }
        Some(RecurringGroup {
            label: self.label,
            owner_id: self.owner_id,
            projected_amount: self.projected_amount,
            projected_next_date: self.projected_next_date,
            members: self.members,
        })
    }
}

/// Ordering required by the scan: owner, merchant key, newest first, then amount
fn detection_order(a: &Transaction, b: &Transaction) -> Ordering {
    a.owner_id
        .cmp(&b.owner_id)
        .then_with(|| a.merchant.cmp(&b.merchant))
        .then_with(|| b.date.cmp(&a.date))
        .then_with(|| a.amount.total_cmp(&b.amount))
}

/// Sort transactions into the order `detect_recurring` scans them in
pub fn sort_for_detection(transactions: &mut [Transaction]) {
    transactions.sort_by(detection_order);
}

/// Check the scan precondition. Amount order among same-day charges is not
/// significant and is not checked.
pub fn is_detection_ordered(transactions: &[Transaction]) -> bool {
    transactions.windows(2).all(|pair| {
        let (a, b) = (&pair[0], &pair[1]);
        a.owner_id
            .cmp(&b.owner_id)
            .then_with(|| a.merchant.cmp(&b.merchant))
            .then_with(|| b.date.cmp(&a.date))
            != Ordering::Greater
    })
}

fn flush(open: &mut Vec<GroupBuilder>, recurring: &mut Vec<RecurringGroup>) {
    recurring.extend(open.drain(..).filter_map(GroupBuilder::finish));
}

fn scan(
    transactions: &[Transaction],
    now: DateTime<Utc>,
    config: &DetectionConfig,
) -> Vec<RecurringGroup> {
    let mut recurring = Vec::new();
    let mut open: Vec<GroupBuilder> = Vec::new();
    let mut current: Option<(&str, &str)> = None;

    for tx in transactions {
        let key = (tx.owner_id.as_str(), tx.merchant.as_str());
        if current != Some(key) {
            flush(&mut open, &mut recurring);
            current = Some(key);
            open.push(GroupBuilder::seed(tx));
            continue;
        }

        let matched = open
            .iter()
            .enumerate()
            .find_map(|(i, group)| group.evaluate(tx, config).map(|m| (i, m)));

        match matched {
            Some((i, m)) => {
                if !open[i].accept(tx, m, now, config) {
                    debug!(
                        "Dropping transaction {} ({}) - group is no longer active",
                        tx.id, tx.merchant
                    );
                }
            }
            None => open.push(GroupBuilder::seed(tx)),
        }
    }
    flush(&mut open, &mut recurring);

    recurring
}

/// Detect active recurring groups in a set of transactions.
///
/// Input is expected in detection order (see [`sort_for_detection`]); input
/// that is not ordered is sorted first. `now` is the reference time for the
/// staleness check.
pub fn detect_recurring(
    transactions: &[Transaction],
    now: DateTime<Utc>,
    config: &DetectionConfig,
) -> Vec<RecurringGroup> {
    if is_detection_ordered(transactions) {
        return scan(transactions, now, config);
    }

    warn!(
        "Transactions not in detection order, sorting {} transactions",
        transactions.len()
    );
    let mut sorted = transactions.to_vec();
    sort_for_detection(&mut sorted);
    scan(&sorted, now, config)
}

/// Runs detection against the transactions stored for an owner
pub struct RecurrenceDetector<'a> {
    db: &'a Database,
    config: DetectionConfig,
}

impl<'a> RecurrenceDetector<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            config: DetectionConfig::default(),
        }
    }

    pub fn with_config(db: &'a Database, config: DetectionConfig) -> Self {
        Self { db, config }
    }

    /// Recompute the owner's active recurring groups from their full history
    pub fn recurring_for_owner(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecurringGroup>> {
        let transactions = self.db.list_transactions_for_detection(owner_id)?;
        let recurring = detect_recurring(&transactions, now, &self.config);

        info!(
            "Detection complete for {}: {} transactions, {} recurring groups",
            owner_id,
            transactions.len(),
            recurring.len()
        );

        Ok(recurring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 8, 0, 0).unwrap()
    }

    fn tx(id: &str, description: &str, amount: f64, date: DateTime<Utc>) -> Transaction {
        Transaction {
            id: id.to_string(),
            owner_id: "user1".to_string(),
            description: description.to_string(),
            amount,
            date,
            merchant: crate::merchant::extract_merchant(description),
        }
    }

    fn detect(transactions: &[Transaction], now: DateTime<Utc>) -> Vec<RecurringGroup> {
        detect_recurring(transactions, now, &DetectionConfig::default())
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    fn assert_mean_invariant(group: &RecurringGroup) {
        let sum: f64 = group.members.iter().map(|m| m.amount).sum();
        assert_close(group.projected_amount, sum / group.members.len() as f64);
    }

    #[test]
    fn test_monthly_group() {
        let txns = vec![
            tx("3", "Amazon 181015", 12.99, day(2018, 10, 15)),
            tx("2", "Amazon 180915", 12.99, day(2018, 9, 15)),
            tx("1", "Amazon 180816", 13.99, day(2018, 8, 16)),
        ];

        let groups = detect(&txns, day(2018, 11, 1));

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.members.len(), 3);
        assert_eq!(group.label, "Amazon 181015");
        assert_eq!(group.owner_id, "user1");
        assert_eq!(group.projected_next_date, Some(day(2018, 11, 14)));
        assert_close(group.projected_amount, (12.99 + 12.99 + 13.99) / 3.0);
        assert_mean_invariant(group);
        let ids: Vec<&str> = group.members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
    }

    #[test]
    fn test_weekly_negative_amounts() {
        let txns = vec![
            tx("2", "Payroll Deposit", -100.0, day(2024, 3, 8)),
            tx("1", "Payroll Deposit", -101.0, day(2024, 3, 1)),
        ];

        let groups = detect(&txns, day(2024, 3, 10));

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 2);
        assert_eq!(groups[0].projected_amount, -100.5);
        assert_eq!(groups[0].projected_next_date, Some(day(2024, 3, 15)));
    }

    #[test]
    fn test_biweekly_and_semiannual_projection() {
        let paychecks = vec![
            tx("2", "ACME Payroll", 2000.0, day(2024, 3, 15)),
            tx("1", "ACME Payroll", 2000.0, day(2024, 3, 1)),
        ];
        let groups = detect(&paychecks, day(2024, 3, 20));
        assert_eq!(groups[0].projected_next_date, Some(day(2024, 3, 29)));

        let insurance = vec![
            tx("2", "Geico Auto", -600.0, day(2024, 7, 1)),
            tx("1", "Geico Auto", -580.0, day(2024, 1, 1)),
        ];
        let groups = detect(&insurance, day(2024, 8, 1));
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].projected_next_date,
            Some(day(2024, 7, 1) + Duration::days(183))
        );
    }

    #[test]
    fn test_stale_annual_group_is_dropped() {
        let txns = vec![
            tx("3", "Costco Membership", 60.0, day(2021, 1, 10)),
            tx("2", "Costco Membership", 60.0, day(2020, 1, 11)),
            tx("1", "Costco Membership", 60.0, day(2019, 1, 12)),
        ];

        // Next renewal projected for 2022-01-10, long past
        let groups = detect(&txns, day(2024, 1, 1));
        assert!(groups.is_empty());

        // Same history while the membership is still active
        let groups = detect(&txns, day(2021, 6, 1));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 3);
        assert_eq!(groups[0].projected_next_date, Some(day(2022, 1, 10)));
    }

    #[test]
    fn test_staleness_grace_period_boundary() {
        let txns = vec![
            tx("2", "Hulu", 17.99, day(2024, 1, 31)),
            tx("1", "Hulu", 17.99, day(2024, 1, 1)),
        ];
        // Projected 2024-03-01 08:00

        let exactly_stale = day(2024, 3, 5);
        assert!(detect(&txns, exactly_stale).is_empty());

        let within_grace = day(2024, 3, 5) - Duration::seconds(1);
        assert_eq!(detect(&txns, within_grace).len(), 1);
    }

    #[test]
    fn test_single_transaction_not_reported() {
        let txns = vec![tx("1", "Corner Bakery", 8.5, day(2024, 2, 2))];
        assert!(detect(&txns, day(2024, 2, 3)).is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(detect(&[], day(2024, 1, 1)).is_empty());
    }

    #[test]
    fn test_amount_band_is_strict() {
        let txns = vec![
            tx("2", "Gym", 100.0, day(2024, 2, 1)),
            tx("1", "Gym", 125.0, day(2024, 1, 2)),
        ];
        assert!(detect(&txns, day(2024, 2, 5)).is_empty());

        let txns = vec![
            tx("2", "Gym", 100.0, day(2024, 2, 1)),
            tx("1", "Gym", 124.99, day(2024, 1, 2)),
        ];
        assert_eq!(detect(&txns, day(2024, 2, 5)).len(), 1);
    }

    #[test]
    fn test_band_uses_group_average_for_negative_amounts() {
        let group = GroupBuilder::seed(&tx("1", "Utility", -80.0, day(2024, 1, 1)));
        assert!(group.amount_matches(-99.0, 0.25));
        assert!(group.amount_matches(-61.0, 0.25));
        assert!(!group.amount_matches(-100.0, 0.25));
        assert!(!group.amount_matches(-60.0, 0.25));
    }

    #[test]
    fn test_opposite_signs_never_match() {
        let txns = vec![
            tx("2", "Venmo", 50.0, day(2024, 2, 1)),
            tx("1", "Venmo", -50.0, day(2024, 1, 2)),
        ];
        assert!(detect(&txns, day(2024, 2, 2)).is_empty());

        let group = GroupBuilder::seed(&tx("1", "Venmo", 0.0, day(2024, 1, 1)));
        assert!(group.amount_matches(0.0, 0.25));
        assert!(!group.amount_matches(1.0, 0.25));
    }

    #[test]
    fn test_gap_outside_buckets_opens_new_group() {
        let txns = vec![
            tx("2", "Barber Shop", 30.0, day(2024, 3, 1)),
            tx("1", "Barber Shop", 30.0, day(2024, 1, 15)),
        ];
        assert!(detect(&txns, day(2024, 3, 2)).is_empty());
    }

    #[test]
    fn test_known_cadence_tolerance_is_strict() {
        // Weekly from 03-15 and 03-08; the next earlier charge is expected on 03-01 08:00
        let within = vec![
            tx("3", "Lawn Care", 40.0, day(2024, 3, 15)),
            tx("2", "Lawn Care", 40.0, day(2024, 3, 8)),
            tx("1", "Lawn Care", 40.0, day(2024, 2, 29)),
        ];
        let groups = detect(&within, day(2024, 3, 16));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 3);

        let on_edge = vec![
            tx("3", "Lawn Care", 40.0, day(2024, 3, 15)),
            tx("2", "Lawn Care", 40.0, day(2024, 3, 8)),
            tx("1", "Lawn Care", 40.0, day(2024, 2, 28)),
        ];
        let groups = detect(&on_edge, day(2024, 3, 16));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 2);
    }

    #[test]
    fn test_cadence_is_fixed_once_inferred() {
        // 7-day gap sets weekly; a later 30-day gap must not turn it monthly
        let txns = vec![
            tx("3", "Meal Kit", 60.0, day(2024, 4, 8)),
            tx("2", "Meal Kit", 60.0, day(2024, 4, 1)),
            tx("1", "Meal Kit", 60.0, day(2024, 3, 2)),
        ];
        let groups = detect(&txns, day(2024, 4, 9));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 2);
        assert_eq!(groups[0].projected_next_date, Some(day(2024, 4, 15)));
    }

    #[test]
    fn test_distinct_amount_clusters_within_merchant() {
        // Same merchant, two independent monthly charges plus a one-off
        let txns = vec![
            tx("5", "Apple Services", 9.99, day(2024, 5, 3)),
            tx("4", "Apple Services", 99.0, day(2024, 5, 2)),
            tx("3", "Apple Services", 1299.0, day(2024, 4, 20)),
            tx("2", "Apple Services", 9.99, day(2024, 4, 3)),
            tx("1", "Apple Services", 99.0, day(2024, 4, 2)),
        ];

        let groups = detect(&txns, day(2024, 5, 10));

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].projected_amount, 9.99);
        assert_eq!(groups[1].projected_amount, 99.0);
        for group in &groups {
            assert_eq!(group.members.len(), 2);
            assert_mean_invariant(group);
        }
    }

    #[test]
    fn test_output_follows_merchant_order() {
        let mut txns = vec![
            tx("1", "Netflix 111", 15.49, day(2024, 5, 1)),
            tx("2", "Netflix 222", 15.49, day(2024, 4, 1)),
            tx("3", "Spotify USA", 10.99, day(2024, 5, 5)),
            tx("4", "Spotify USA", 10.99, day(2024, 4, 5)),
            tx("5", "Adobe 9", 54.99, day(2024, 5, 9)),
            tx("6", "Adobe 8", 54.99, day(2024, 4, 9)),
        ];
        sort_for_detection(&mut txns);

        let groups = detect(&txns, day(2024, 5, 12));

        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Adobe 9", "Netflix 111", "Spotify USA"]);
        for group in &groups {
            let merchant = &group.members[0].merchant;
            assert!(group.members.iter().all(|m| &m.merchant == merchant));
        }
    }

    #[test]
    fn test_owners_never_share_groups() {
        let mut other = tx("2", "Netflix 222", 15.49, day(2024, 4, 1));
        other.owner_id = "user2".to_string();
        let txns = vec![tx("1", "Netflix 111", 15.49, day(2024, 5, 1)), other];

        assert!(detect(&txns, day(2024, 5, 2)).is_empty());
    }

    #[test]
    fn test_unordered_input_is_sorted() {
        let ordered = vec![
            tx("3", "Amazon 181015", 12.99, day(2018, 10, 15)),
            tx("2", "Amazon 180915", 12.99, day(2018, 9, 15)),
            tx("1", "Amazon 180816", 12.99, day(2018, 8, 16)),
        ];
        let mut reversed = ordered.clone();
        reversed.reverse();
        assert!(is_detection_ordered(&ordered));
        assert!(!is_detection_ordered(&reversed));

        let now = day(2018, 11, 1);
        assert_eq!(detect(&reversed, now), detect(&ordered, now));
    }

    #[test]
    fn test_detection_is_idempotent() {
        let txns = vec![
            tx("4", "Spotify USA", 10.99, day(2024, 5, 5)),
            tx("3", "Spotify USA", 10.99, day(2024, 4, 5)),
            tx("2", "Spotify USA", 11.99, day(2024, 3, 6)),
            tx("1", "Spotify USA", 10.99, day(2024, 1, 1)),
        ];
        let now = day(2024, 5, 20);

        let first = detect(&txns, now);
        let second = detect(&txns, now);
        assert_eq!(first, second);
        assert_eq!(first[0].members.len(), 3);
        assert_mean_invariant(&first[0]);
    }

    #[test]
    fn test_custom_config() {
        let txns = vec![
            tx("2", "Gym", 100.0, day(2024, 2, 1)),
            tx("1", "Gym", 140.0, day(2024, 1, 2)),
        ];
        let config = DetectionConfig {
            amount_variance: 0.5,
            grace_days: 4,
        };
        assert_eq!(detect_recurring(&txns, day(2024, 2, 5), &config).len(), 1);
        assert!(detect(&txns, day(2024, 2, 5)).is_empty());
    }

    #[test]
    fn test_detection_config_defaults() {
        let config = DetectionConfig::default();
        assert_eq!(config.amount_variance, 0.25);
        assert_eq!(config.grace_days, 4);
    }
}
