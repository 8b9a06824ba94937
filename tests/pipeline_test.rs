//! End-to-end tests for the churn pipeline
//!
//! Trains on synthetic activity logs with a known churn split and checks
//! selection, persistence and scoring through the public library API.

mod common;

use common::{as_of, service_at, synthetic_log, twenty_users};
use gamechurn::classifier::{PredictError, PredictionMethod};
use gamechurn::models::RiskTier;
use gamechurn::pipeline::{ModelStatus, RunStatus};

#[test]
fn test_end_to_end_twenty_users() {
    let tmp = tempfile::tempdir().unwrap();
    let service = service_at(tmp.path());
    let records = twenty_users();

    let report = service.train(&records);
    assert!(report.is_trained(), "training failed: {}", report.message);
    assert_eq!(report.training_samples, 20);
    assert!(report.persisted);
    assert!(report.roc_auc.is_some(), "champion ROC-AUC should be defined");
    assert!(!report.auc_warning);
    assert_eq!(report.ensemble.len(), report.models_trained.min(3));

    let state = service.registry().snapshot().unwrap();
    assert!(!state.roster.is_empty());
    assert_eq!(state.roster.ensemble().len(), state.roster.len().min(3));
    assert_eq!(
        state.roster.champion().map(|c| c.name().to_string()),
        report.champion
    );

    for method in [PredictionMethod::Champion, PredictionMethod::Ensemble] {
        let batch = service.predict(&records, method, as_of()).unwrap();
        assert_eq!(batch.len(), 20);
        assert!(batch
            .predictions
            .iter()
            .all(|p| (0.0..=1.0).contains(&p.churn_probability)));

        let rollup = batch.by_project();
        assert_eq!(rollup.len(), 2);
        assert_eq!(rollup.iter().map(|p| p.total_users).sum::<usize>(), 20);
        for project in &rollup {
            assert_eq!(
                project.high.users + project.medium.users + project.low.users,
                project.total_users
            );
        }

        let summary = batch.summary();
        assert_eq!(
            summary.high_risk + summary.medium_risk + summary.low_risk,
            20
        );
        assert!((0.5..=0.8).contains(&summary.thresholds.high));
        assert!((0.2..=0.5).contains(&summary.thresholds.medium));
    }
}

#[test]
fn test_prediction_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let service = service_at(tmp.path());
    let records = twenty_users();
    service.train(&records);

    for method in [PredictionMethod::Champion, PredictionMethod::Ensemble] {
        let first = service.predict(&records, method, as_of()).unwrap();
        let second = service.predict(&records, method, as_of()).unwrap();
        assert_eq!(first.predictions, second.predictions);
        assert_eq!(first.thresholds, second.thresholds);
    }
}

#[test]
fn test_reloaded_roster_scores_like_the_trained_one() {
    let tmp = tempfile::tempdir().unwrap();
    let records = twenty_users();

    let trained = service_at(tmp.path());
    trained.train(&records);
    let before = trained
        .predict(&records, PredictionMethod::Ensemble, as_of())
        .unwrap();

    let reloaded = service_at(tmp.path());
    assert_eq!(reloaded.info().status, ModelStatus::Trained);
    let after = reloaded
        .predict(&records, PredictionMethod::Ensemble, as_of())
        .unwrap();

    assert_eq!(before.models, after.models);
    for (a, b) in before.predictions.iter().zip(&after.predictions) {
        assert_eq!(a.user_id, b.user_id);
        assert!((a.churn_probability - b.churn_probability).abs() < 1e-6);
    }
}

#[test]
fn test_single_class_training_warns() {
    let tmp = tempfile::tempdir().unwrap();
    let service = service_at(tmp.path());

    // Nobody churns.
    let report = service.train(&synthetic_log(16, &[]));
    assert!(report.is_trained());
    assert!(report.auc_warning);
    assert_eq!(report.roc_auc, None);
    assert_eq!(report.status, RunStatus::PartialSuccess);
    assert!(!report.skipped.is_empty());

    // The roster still scores; with undefined weights the ensemble averages uniformly.
    let batch = service
        .predict(&synthetic_log(16, &[]), PredictionMethod::Ensemble, as_of())
        .unwrap();
    assert_eq!(batch.len(), 16);
}

#[test]
fn test_not_ready_before_training() {
    let tmp = tempfile::tempdir().unwrap();
    let service = service_at(tmp.path());
    let err = service
        .predict(&twenty_users(), PredictionMethod::Ensemble, as_of())
        .unwrap_err();
    assert_eq!(err, PredictError::NotReady);
}

#[test]
fn test_short_histories_are_not_scored() {
    let tmp = tempfile::tempdir().unwrap();
    let service = service_at(tmp.path());
    let mut records = twenty_users();
    service.train(&records);

    // Four active days is below the five-row minimum.
    let newcomer_day = records[0].activity_date;
    for i in 0..4 {
        records.push(gamechurn::models::ActivityRecord::new(
            "0xnew",
            "arena",
            newcomer_day + chrono::Duration::days(i),
            3,
        ));
    }
    let batch = service
        .predict(&records, PredictionMethod::Champion, as_of())
        .unwrap();
    assert_eq!(batch.len(), 20);
    assert!(batch.predictions.iter().all(|p| p.user_id != "0xnew"));
}

#[test]
fn test_churners_rank_above_retained_users() {
    let tmp = tempfile::tempdir().unwrap();
    let service = service_at(tmp.path());
    let records = twenty_users();
    service.train(&records);

    let batch = service
        .predict(&records, PredictionMethod::Ensemble, as_of())
        .unwrap();
    let churners = ["0x0003", "0x0008", "0x000c", "0x0011"];
    let mean = |want: bool| {
        let probs: Vec<f64> = batch
            .predictions
            .iter()
            .filter(|p| churners.contains(&p.user_id.as_str()) == want)
            .map(|p| p.churn_probability)
            .collect();
        probs.iter().sum::<f64>() / probs.len() as f64
    };
    assert!(mean(true) > mean(false));
    assert!(batch
        .predictions
        .iter()
        .filter(|p| churners.contains(&p.user_id.as_str()))
        .any(|p| p.churn_risk != RiskTier::Low));
}

#[test]
fn test_failed_retrain_keeps_previous_roster() {
    let tmp = tempfile::tempdir().unwrap();
    let service = service_at(tmp.path());
    let first = service.train(&twenty_users());
    assert!(first.is_trained());
    let before = service.registry().snapshot().unwrap();

    // No data, then too few samples: both runs leave the roster alone.
    let empty = service.train(&[]);
    let small = service.train(&synthetic_log(6, &[2]));
    for report in [&empty, &small] {
        assert!(!report.is_trained());
        assert_eq!(report.status, RunStatus::PartialSuccess);
        assert_eq!(report.generation, None);
    }

    let after = service.registry().snapshot().unwrap();
    assert!(std::sync::Arc::ptr_eq(&before, &after));
    assert_eq!(service.info().generation, first.generation);
    assert_eq!(
        service.leaderboard()[0].model,
        first.champion.clone().unwrap()
    );

    // The persisted generation is untouched too.
    let reopened = service_at(tmp.path());
    assert_eq!(reopened.info().generation, first.generation);
    assert!(reopened
        .predict(&twenty_users(), PredictionMethod::Champion, as_of())
        .is_ok());
}
