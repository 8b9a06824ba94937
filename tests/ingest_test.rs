//! Loading activity exports from disk and training on them

mod common;

use common::{as_of, service_at, twenty_users, write_csv};
use gamechurn::classifier::PredictionMethod;
use gamechurn::ingest::{self, IngestError};

#[test]
fn test_csv_export_round_trips_into_training() {
    let tmp = tempfile::tempdir().unwrap();
    let csv_path = tmp.path().join("activity.csv");
    let records = twenty_users();
    write_csv(&csv_path, &records);

    let loaded = ingest::load_activity(&csv_path).unwrap();
    assert_eq!(loaded, records);

    let service = service_at(&tmp.path().join("models"));
    assert!(service.train(&loaded).is_trained());
    let batch = service
        .predict(&loaded, PredictionMethod::Champion, as_of())
        .unwrap();
    assert_eq!(batch.len(), 20);
}

#[test]
fn test_json_export_with_result_rows() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("export.json");
    let rows: Vec<serde_json::Value> = twenty_users()
        .iter()
        .map(|r| {
            serde_json::json!({
                "user_wallet": r.user_id,
                "project": r.project,
                "activity_date": r.activity_date.to_string(),
                "daily_transactions": r.transaction_count,
            })
        })
        .collect();
    let body = serde_json::json!({ "result": { "rows": rows } });
    std::fs::write(&path, serde_json::to_string(&body).unwrap()).unwrap();

    let loaded = ingest::load_activity(&path).unwrap();
    assert_eq!(loaded, twenty_users());
}

#[test]
fn test_missing_required_column_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("activity.csv");
    std::fs::write(&path, "wallet,date\n0x1,2024-01-01\n").unwrap();

    match ingest::load_activity(&path).unwrap_err() {
        IngestError::MissingColumn { role, .. } => assert_eq!(role, "project"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = ingest::load_activity(&tmp.path().join("nope.csv")).unwrap_err();
    assert!(matches!(err, IngestError::Io { .. }));
}
