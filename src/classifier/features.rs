//! Activity feature extractor
//!
//! Turns one `(user, project)` activity history into a fixed 10-wide
//! feature vector.
//!
//! Two modes:
//! - **Training**: the history is split at a synthetic cutoff. Features come
//!   from the days up to the cutoff, the label from the target window right
//!   after it.
//! - **Prediction**: no split. Windows are anchored to the group's most
//!   recent day, recency is measured against the caller-supplied `as_of`.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::{ActivityGroup, DailyActivity};

/// Number of features produced by the extractor.
pub const NUM_FEATURES: usize = 10;

/// Human-readable names for each feature, in extraction order.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "active_days_last_7",
    "transactions_last_7",
    "total_active_days",
    "total_transactions",
    "avg_transactions_per_day",
    "days_since_last_activity",
    "early_to_late_momentum",
    "consistency_score",
    "week1_transactions",
    "week_last_transactions",
];

/// Feature indices (must match `FEATURE_NAMES` order).
pub mod idx {
    pub const ACTIVE_DAYS_LAST_7: usize = 0;
    pub const TRANSACTIONS_LAST_7: usize = 1;
    pub const TOTAL_ACTIVE_DAYS: usize = 2;
    pub const TOTAL_TRANSACTIONS: usize = 3;
    pub const AVG_TRANSACTIONS_PER_DAY: usize = 4;
    pub const DAYS_SINCE_LAST_ACTIVITY: usize = 5;
    pub const EARLY_TO_LATE_MOMENTUM: usize = 6;
    pub const CONSISTENCY_SCORE: usize = 7;
    pub const WEEK1_TRANSACTIONS: usize = 8;
    pub const WEEK_LAST_TRANSACTIONS: usize = 9;
}

/// Width of the "recent week" and "first week" slices, in days.
const WEEK_DAYS: i64 = 7;

/// Window parameters for the extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureWindows {
    /// Days of history kept before the cutoff
    pub lookback_days: i64,
    /// Total span the lookback is carved from; cutoff = last day - (window - lookback)
    pub observation_window_days: i64,
    /// Days after the cutoff that decide the churn label
    pub target_window_days: i64,
    /// Minimum active days before a group is usable
    pub min_history_rows: usize,
}

impl Default for FeatureWindows {
    fn default() -> Self {
        Self {
            lookback_days: 45,
            observation_window_days: 60,
            target_window_days: 14,
            min_history_rows: 5,
        }
    }
}

/// Fixed-width feature vector plus the group identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub user_id: String,
    pub project: String,
    pub values: [f64; NUM_FEATURES],
}

impl FeatureVector {
    /// Look a feature up by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }
}

/// Training row: features plus the churn label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledFeatureVector {
    pub features: FeatureVector,
    /// `true` when the group was silent for the whole target window.
    pub will_churn: bool,
}

/// How the first/last week slices are taken.
#[derive(Debug, Clone, Copy)]
enum WeekSlicing {
    /// Calendar windows relative to the first day and the anchor day.
    DateWindows,
    /// First and last 7 active days.
    Rows,
}

/// Stateless extractor over `ActivityGroup`s.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    windows: FeatureWindows,
}

impl FeatureExtractor {
    pub fn new(windows: FeatureWindows) -> Self {
        Self { windows }
    }

    pub fn windows(&self) -> &FeatureWindows {
        &self.windows
    }

    /// Cutoff separating a group's training history from its target window.
    pub fn cutoff_date(&self, group: &ActivityGroup) -> Option<NaiveDate> {
        let offset = (self.windows.observation_window_days - self.windows.lookback_days).max(0);
        group.last_date().map(|last| last - Duration::days(offset))
    }

    /// Training mode. Returns `None` when the history before the cutoff is too short.
    pub fn extract_training(&self, group: &ActivityGroup) -> Option<LabeledFeatureVector> {
        let cutoff = self.cutoff_date(group)?;
        let target_end = cutoff + Duration::days(self.windows.target_window_days);

        let split = group.days().partition_point(|d| d.date <= cutoff);
        let (training, after) = group.days().split_at(split);

        if training.len() < self.windows.min_history_rows {
            tracing::debug!(
                "{}/{}: {} active days before cutoff {}, need {}",
                group.user_id,
                group.project,
                training.len(),
                cutoff,
                self.windows.min_history_rows
            );
            return None;
        }

        let returned = after.iter().any(|d| d.date <= target_end);
        let last_training = training.last()?.date;
        let days_since = (cutoff - last_training).num_days() as f64;

        let values = compute_values(training, cutoff, days_since, WeekSlicing::DateWindows);

        Some(LabeledFeatureVector {
            features: FeatureVector {
                user_id: group.user_id.clone(),
                project: group.project.clone(),
                values,
            },
            will_churn: !returned,
        })
    }

    /// Prediction mode. `as_of` is the naive "now" recency is measured against.
    pub fn extract_prediction(
        &self,
        group: &ActivityGroup,
        as_of: NaiveDateTime,
    ) -> Option<FeatureVector> {
        if group.len() < self.windows.min_history_rows {
            return None;
        }

        let latest = group.last_date()?;
        let elapsed = as_of - latest.and_hms_opt(0, 0, 0)?;
        let days_since = elapsed.num_days() as f64;

        let values = compute_values(group.days(), latest, days_since, WeekSlicing::Rows);

        Some(FeatureVector {
            user_id: group.user_id.clone(),
            project: group.project.clone(),
            values,
        })
    }
}

/// Shared formulas. `days` is non-empty and sorted; `anchor` is the cutoff
/// (training) or the most recent day (prediction).
fn compute_values(
    days: &[DailyActivity],
    anchor: NaiveDate,
    days_since_last_activity: f64,
    slicing: WeekSlicing,
) -> [f64; NUM_FEATURES] {
    let recent_start = anchor - Duration::days(WEEK_DAYS);
    let recent: Vec<DailyActivity> = days
        .iter()
        .filter(|d| d.date >= recent_start && d.date <= anchor)
        .copied()
        .collect();

    let active_days_last_7 = recent.len() as f64;
    let transactions_last_7 = sum_transactions(&recent);

    let total_active_days = days.len() as f64;
    let total_transactions = sum_transactions(days);
    let avg_transactions_per_day = ratio_or_zero(total_transactions, total_active_days);

    let (week1, week_last) = match slicing {
        WeekSlicing::DateWindows => {
            let first = days.first().map(|d| d.date).unwrap_or(anchor);
            let first_end = first + Duration::days(WEEK_DAYS);
            let week1: Vec<DailyActivity> =
                days.iter().filter(|d| d.date <= first_end).copied().collect();
            (sum_transactions(&week1), transactions_last_7)
        }
        WeekSlicing::Rows => {
            let n = WEEK_DAYS as usize;
            let head = &days[..days.len().min(n)];
            let tail = &days[days.len().saturating_sub(n)..];
            (sum_transactions(head), sum_transactions(tail))
        }
    };

    let momentum = ratio_or_zero(week_last, week1);
    let consistency = consistency_score(days);

    let mut values = [0.0; NUM_FEATURES];
    values[idx::ACTIVE_DAYS_LAST_7] = active_days_last_7;
    values[idx::TRANSACTIONS_LAST_7] = transactions_last_7;
    values[idx::TOTAL_ACTIVE_DAYS] = total_active_days;
    values[idx::TOTAL_TRANSACTIONS] = total_transactions;
    values[idx::AVG_TRANSACTIONS_PER_DAY] = avg_transactions_per_day;
    values[idx::DAYS_SINCE_LAST_ACTIVITY] = days_since_last_activity;
    values[idx::EARLY_TO_LATE_MOMENTUM] = momentum;
    values[idx::CONSISTENCY_SCORE] = consistency;
    values[idx::WEEK1_TRANSACTIONS] = week1;
    values[idx::WEEK_LAST_TRANSACTIONS] = week_last;

    for v in values.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
    }
    values
}

fn sum_transactions(days: &[DailyActivity]) -> f64 {
    days.iter().map(|d| d.transactions as f64).sum()
}

fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// `1 / (stdev(gaps) + 1)`, or exactly 1 when the stdev is undefined or zero.
///
/// A single active day and a perfectly regular cadence both land on 1.0.
fn consistency_score(days: &[DailyActivity]) -> f64 {
    let gaps: Vec<f64> = days
        .windows(2)
        .map(|w| (w[1].date - w[0].date).num_days() as f64)
        .collect();

    match sample_stddev(&gaps) {
        Some(sd) if sd > 0.0 => 1.0 / (sd + 1.0),
        _ => 1.0,
    }
}

/// Sample standard deviation (n - 1); `None` for fewer than two values.
fn sample_stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}
