//! JSON reporter
//!
//! Pretty-printed JSON for piping to jq or storing alongside the models.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::PredictionView;
use crate::classifier::{PredictionBatch, PredictionMethod, PredictionSummary, ProjectRollup};
use crate::models::Prediction;
use crate::pipeline::LeaderboardEntry;

/// Render any serialisable report as JSON
pub fn render<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[derive(Serialize)]
struct PredictionOutput<'a> {
    method: PredictionMethod,
    generated_at: DateTime<Utc>,
    models: &'a [String],
    summary: PredictionSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    by_project: Option<Vec<ProjectRollup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    high_risk_users: Option<Vec<&'a Prediction>>,
    predictions: &'a [Prediction],
}

pub fn predictions(batch: &PredictionBatch, view: PredictionView) -> Result<String> {
    let output = PredictionOutput {
        method: batch.method,
        generated_at: batch.generated_at,
        models: &batch.models,
        summary: batch.summary(),
        by_project: view.by_project.then(|| batch.by_project()),
        high_risk_users: view.high_risk.map(|limit| batch.high_risk(limit)),
        predictions: &batch.predictions,
    };
    render(&output)
}

#[derive(Serialize)]
struct LeaderboardOutput<'a> {
    total_models: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    models: &'a [LeaderboardEntry],
}

pub fn leaderboard(entries: &[LeaderboardEntry]) -> Result<String> {
    render(&LeaderboardOutput {
        total_models: entries.len(),
        message: entries.is_empty().then_some("No models trained yet"),
        models: entries,
    })
}
