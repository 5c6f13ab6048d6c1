//! Domain models for Recur
//!
//! Wire names follow the public API (`trans_id`, `user_id`, `name`, ...) so
//! existing clients can submit and read batches unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A validated, persisted financial transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "trans_id")]
    pub id: String,
    #[serde(rename = "user_id")]
    pub owner_id: String,
    /// Raw description as supplied by the bank
    #[serde(rename = "name")]
    pub description: String,
    /// Negative = debit, positive = credit
    pub amount: f64,
    pub date: DateTime<Utc>,
    /// Merchant key derived from the description at ingestion
    #[serde(rename = "company")]
    pub merchant: String,
}

/// A transaction as submitted by a client (before validation)
///
/// Every field is optional at the wire level so that missing values are
/// reported by the validator with a useful message instead of a serde error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTransaction {
    #[serde(rename = "trans_id", alias = "id", default)]
    pub id: Option<String>,
    #[serde(rename = "user_id", alias = "owner_id", default)]
    pub owner_id: Option<String>,
    #[serde(rename = "name", alias = "description", default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Option<AmountInput>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

/// Submitted amount: a JSON number or a numeric string (`"12.99"`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    /// Numeric value, if the input is a finite number
    pub fn value(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for AmountInput {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Recurrence interval inferred for a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Not yet determined; the group has a single member
    Unknown,
    Weekly,
    Biweekly,
    Monthly,
    SemiAnnual,
    Annual,
}

impl Cadence {
    /// Classify the whole-day gap between two consecutive charges.
    ///
    /// Monthly and longer buckets are wider to absorb short months.
    pub fn from_gap_days(days: i64) -> Option<Self> {
        match days {
            5..=9 => Some(Self::Weekly),
            12..=16 => Some(Self::Biweekly),
            26..=34 => Some(Self::Monthly),
            179..=187 => Some(Self::SemiAnnual),
            360..=369 => Some(Self::Annual),
            _ => None,
        }
    }

    /// Days between occurrences, `None` while undetermined
    pub fn period_days(&self) -> Option<i64> {
        match self {
            Self::Unknown => None,
            Self::Weekly => Some(7),
            Self::Biweekly => Some(14),
            Self::Monthly => Some(30),
            Self::SemiAnnual => Some(183),
            Self::Annual => Some(365),
        }
    }

    /// Allowed drift (exclusive) around the expected date once the cadence is known
    pub fn tolerance_days(&self) -> Option<i64> {
        match self {
            Self::Unknown => None,
            Self::Weekly | Self::Biweekly => Some(2),
            Self::Monthly | Self::SemiAnnual | Self::Annual => Some(4),
        }
    }
}

/// An active recurring group, as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringGroup {
    /// Description of the most recent member
    #[serde(rename = "name")]
    pub label: String,
    #[serde(rename = "user_id")]
    pub owner_id: String,
    /// Mean amount across members
    #[serde(rename = "next_amt")]
    pub projected_amount: f64,
    #[serde(rename = "next_date")]
    pub projected_next_date: Option<DateTime<Utc>>,
    /// Most recent first
    #[serde(rename = "transactions")]
    pub members: Vec<Transaction>,
}
