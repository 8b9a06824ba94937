//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use gamechurn::classifier::ModelStore;
use gamechurn::config::ChurnConfig;
use gamechurn::models::ActivityRecord;
use gamechurn::pipeline::ChurnService;

pub const DAYS: i64 = 90;

pub fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// Prediction anchor used by every test: midnight after the last synthetic day
pub fn as_of() -> NaiveDateTime {
    (base_date() + Duration::days(DAYS)).and_hms_opt(0, 0, 0).unwrap()
}

/// 90 days of activity for `users` users split across two projects.
/// Every user whose index is in `churners` fades out after day 30, goes quiet
/// after day 56 and comes back exactly once on day 75.
pub fn synthetic_log(users: usize, churners: &[usize]) -> Vec<ActivityRecord> {
    let mut out = Vec::new();
    for u in 0..users {
        let project = if u < users / 2 { "arena" } else { "farm" };
        let churner = churners.contains(&u);
        for day in 0..DAYS {
            let active = if churner {
                day < 30 || (day < 56 && day % 4 == 0) || day == 75
            } else {
                day % 7 != 6 || u % 3 == 0
            };
            if active {
                let tx = 1 + ((u as u64 + day as u64) % 5);
                out.push(ActivityRecord::new(
                    format!("0x{u:04x}"),
                    project,
                    base_date() + Duration::days(day),
                    tx,
                ));
            }
        }
    }
    out
}

/// 20 users, 10 per project, 4 churners (20%)
pub fn twenty_users() -> Vec<ActivityRecord> {
    synthetic_log(20, &[3, 8, 12, 17])
}

pub fn small_config() -> ChurnConfig {
    let mut config = ChurnConfig::default();
    config.training.min_training_samples = 10;
    config.training.forest_trees = 20;
    config
}

pub fn service_at(dir: &Path) -> ChurnService {
    ChurnService::with_store(small_config(), ModelStore::new(dir))
}

pub fn write_csv(path: &Path, records: &[ActivityRecord]) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer
        .write_record(["gamer", "game", "day", "number_of_transactions"])
        .unwrap();
    for r in records {
        writer
            .write_record([
                r.user_id.clone(),
                r.project.clone(),
                format!("{} 00:00:00.000 UTC", r.activity_date),
                r.transaction_count.to_string(),
            ])
            .unwrap();
    }
    writer.flush().unwrap();
}
