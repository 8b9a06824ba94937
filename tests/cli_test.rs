//! CLI contract tests
//!
//! Runs the real binary against a synthetic export in an isolated temp
//! directory: config lookups, the model store and HOME all point inside it.

mod common;

use std::path::Path;
use std::process::{Command, Output};

use common::{twenty_users, write_csv};

fn gamechurn(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gamechurn"))
        .current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .env("XDG_DATA_HOME", dir.join("data"))
        .env("MIN_TRAINING_SAMPLES", "10")
        .env_remove("GAMECHURN_MODELS_DIR")
        .env_remove("PREDICTION_WINDOW_DAYS")
        .env_remove("RUST_LOG")
        .args(["--log-level", "warn", "--models-dir", "models"])
        .args(args)
        .output()
        .expect("failed to run gamechurn")
}

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_csv(&dir.path().join("activity.csv"), &twenty_users());
    dir
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[test]
fn test_info_before_training() {
    let dir = workspace();
    let info = stdout_json(&gamechurn(dir.path(), &["info", "--format", "json"]));
    assert_eq!(info["status"], "not_trained");
    assert_eq!(info["prediction_window_days"], 14);
    assert_eq!(info["features"].as_array().unwrap().len(), 10);
}

#[test]
fn test_predict_before_training_fails_cleanly() {
    let dir = workspace();
    let output = gamechurn(dir.path(), &["predict", "activity.csv"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("gamechurn train"), "stderr: {stderr}");
}

#[test]
fn test_train_predict_leaderboard() {
    let dir = workspace();
    let train = stdout_json(&gamechurn(
        dir.path(),
        &["train", "activity.csv", "--format", "json"],
    ));
    assert!(train["models_trained"].as_u64().unwrap() >= 1);
    assert_eq!(train["training_samples"], 20);
    assert!(dir.path().join("models/CURRENT").is_file());

    let predict = stdout_json(&gamechurn(
        dir.path(),
        &[
            "predict",
            "activity.csv",
            "--format",
            "json",
            "--by-project",
            "--high-risk",
            "5",
        ],
    ));
    assert_eq!(predict["method"], "ensemble");
    assert_eq!(predict["summary"]["total_users"], 20);
    assert_eq!(predict["by_project"].as_array().unwrap().len(), 2);
    assert!(predict["high_risk_users"].as_array().unwrap().len() <= 5);

    let board = stdout_json(&gamechurn(dir.path(), &["leaderboard", "--format", "json"]));
    assert_eq!(board["total_models"], train["models_trained"]);
    assert_eq!(board["models"][0]["is_champion"], true);
}

#[test]
fn test_predict_writes_output_file() {
    let dir = workspace();
    assert!(gamechurn(dir.path(), &["train", "activity.csv"]).status.success());

    let output = gamechurn(
        dir.path(),
        &[
            "predict",
            "activity.csv",
            "--method",
            "champion",
            "--format",
            "json",
            "--output",
            "out/predictions.json",
        ],
    );
    assert!(output.status.success());
    let written = std::fs::read_to_string(dir.path().join("out/predictions.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(parsed["method"], "champion");
}

#[test]
fn test_refresh_exports_both_methods() {
    let dir = workspace();
    let report = stdout_json(&gamechurn(
        dir.path(),
        &["refresh", "activity.csv", "--format", "json", "--export-dir", "exports"],
    ));
    assert_eq!(report["predictions_generated"], 40);
    assert!(dir.path().join("exports/predictions-champion.json").is_file());
    assert!(dir.path().join("exports/predictions-ensemble.json").is_file());
}

#[test]
fn test_project_config_is_applied() {
    let dir = workspace();
    std::fs::write(
        dir.path().join("gamechurn.toml"),
        "[features]\ntarget_window_days = 21\n",
    )
    .unwrap();
    let info = stdout_json(&gamechurn(dir.path(), &["info", "--format", "json"]));
    assert_eq!(info["prediction_window_days"], 21);
    assert!(info["config_sources"][0]
        .as_str()
        .unwrap()
        .ends_with("gamechurn.toml"));
}
