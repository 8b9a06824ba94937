//! Core data models for gamechurn
//!
//! These models are shared by ingestion, feature extraction, training
//! and prediction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One raw activity row: a user touched a project on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub user_id: String,
    pub project: String,
    pub activity_date: NaiveDate,
    /// Defaults to 1 when the source has no count column.
    #[serde(default = "default_transaction_count")]
    pub transaction_count: u64,
}

fn default_transaction_count() -> u64 {
    1
}

impl ActivityRecord {
    pub fn new(
        user_id: impl Into<String>,
        project: impl Into<String>,
        activity_date: NaiveDate,
        transaction_count: u64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            project: project.into(),
            activity_date,
            transaction_count,
        }
    }
}

/// All transactions of one group on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub transactions: u64,
}

/// All activity for one `(user_id, project)` pair, one entry per active day,
/// sorted ascending by date.
#[derive(Debug, Clone)]
pub struct ActivityGroup {
    pub user_id: String,
    pub project: String,
    days: Vec<DailyActivity>,
}

impl ActivityGroup {
    /// Build a group from raw records. Records landing on the same day are summed.
    pub fn from_records<'a>(
        user_id: impl Into<String>,
        project: impl Into<String>,
        records: impl IntoIterator<Item = &'a ActivityRecord>,
    ) -> Self {
        let mut by_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for record in records {
            *by_day.entry(record.activity_date).or_insert(0) += record.transaction_count;
        }

        Self {
            user_id: user_id.into(),
            project: project.into(),
            days: by_day
                .into_iter()
                .map(|(date, transactions)| DailyActivity { date, transactions })
                .collect(),
        }
    }

    /// Active days, ascending.
    pub fn days(&self) -> &[DailyActivity] {
        &self.days
    }

    /// Number of distinct active days.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.days.last().map(|d| d.date)
    }
}

/// Churn risk tier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn all() -> [RiskTier; 3] {
        [RiskTier::High, RiskTier::Medium, RiskTier::Low]
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTier::Low => write!(f, "Low"),
            RiskTier::Medium => write!(f, "Medium"),
            RiskTier::High => write!(f, "High"),
        }
    }
}

/// A scored group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub user_id: String,
    pub project: String,
    /// P(no activity in the next target window), 0.0..=1.0
    pub churn_probability: f64,
    pub churn_risk: RiskTier,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_group_sums_same_day_records() {
        let records = vec![
            ActivityRecord::new("u1", "p", day(2), 3),
            ActivityRecord::new("u1", "p", day(1), 1),
            ActivityRecord::new("u1", "p", day(2), 4),
        ];
        let group = ActivityGroup::from_records("u1", "p", &records);

        assert_eq!(group.len(), 2);
        assert_eq!(group.days()[0].date, day(1));
        assert_eq!(group.days()[1].transactions, 7);
        assert_eq!(group.last_date(), Some(day(2)));
    }

    #[test]
    fn test_risk_tier_display_and_order() {
        assert_eq!(RiskTier::High.to_string(), "High");
        assert!(RiskTier::High > RiskTier::Medium);
        assert!(RiskTier::Medium > RiskTier::Low);
    }
}
