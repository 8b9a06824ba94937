//! Output reporters for gamechurn results
//!
//! Supports two output formats:
//! - `text` - Terminal output with colors
//! - `json` - Machine-readable JSON

mod json;
mod text;

use anyhow::{anyhow, Result};
use std::str::FromStr;

use crate::classifier::PredictionBatch;
use crate::pipeline::{LeaderboardEntry, ModelInfo, RefreshReport, TrainReport};

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!("Unknown format '{}'. Valid formats: text, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Which extra sections a prediction report carries
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictionView {
    pub by_project: bool,
    /// Include the high-risk list, at most this many users
    pub high_risk: Option<usize>,
}

pub fn train(report: &TrainReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text::train(report)),
        OutputFormat::Json => json::render(report),
    }
}

pub fn predictions(
    batch: &PredictionBatch,
    view: PredictionView,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text::predictions(batch, view)),
        OutputFormat::Json => json::predictions(batch, view),
    }
}

pub fn refresh(report: &RefreshReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text::refresh(report)),
        OutputFormat::Json => json::render(report),
    }
}

pub fn leaderboard(entries: &[LeaderboardEntry], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text::leaderboard(entries)),
        OutputFormat::Json => json::leaderboard(entries),
    }
}

pub fn info(info: &ModelInfo, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text::info(info)),
        OutputFormat::Json => json::render(info),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classifier::{PredictionMethod, RiskThresholds};
    use crate::models::{Prediction, RiskTier};
    use crate::pipeline::RunStatus;
    use chrono::{TimeZone, Utc};

    fn prediction(user: &str, project: &str, p: f64, tier: RiskTier) -> Prediction {
        Prediction {
            user_id: user.into(),
            project: project.into(),
            churn_probability: p,
            churn_risk: tier,
        }
    }

    /// Small scored batch across two projects
    pub(crate) fn test_batch() -> PredictionBatch {
        PredictionBatch {
            method: PredictionMethod::Ensemble,
            generated_at: Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
            models: vec!["random_forest".into(), "logistic_regression".into()],
            thresholds: RiskThresholds {
                high: 0.5,
                medium: 0.2,
            },
            predictions: vec![
                prediction("w1", "arena", 0.91, RiskTier::High),
                prediction("w2", "arena", 0.35, RiskTier::Medium),
                prediction("w3", "farm", 0.05, RiskTier::Low),
                prediction("w4", "farm", 0.72, RiskTier::High),
            ],
        }
    }

    pub(crate) fn test_train_report() -> TrainReport {
        TrainReport {
            status: RunStatus::Success,
            message: "Trained 3 models".into(),
            generation: Some(4),
            models_trained: 3,
            champion: Some("random_forest".into()),
            roc_auc: Some(0.875),
            accuracy: Some(0.8),
            ensemble: vec![
                "random_forest".into(),
                "gradient_boosting".into(),
                "logistic_regression".into(),
            ],
            training_samples: 120,
            test_samples: 30,
            imbalance: None,
            skipped: Vec::new(),
            auc_warning: false,
            persisted: true,
        }
    }

    pub(crate) fn test_leaderboard() -> Vec<LeaderboardEntry> {
        vec![
            LeaderboardEntry {
                rank: 1,
                model: "random_forest".into(),
                roc_auc: Some(0.875),
                accuracy: 0.8,
                precision: 0.75,
                recall: 0.6,
                training_seconds: 0.42,
                is_champion: true,
                in_ensemble: true,
            },
            LeaderboardEntry {
                rank: 2,
                model: "logistic_regression".into(),
                roc_auc: None,
                accuracy: 0.7,
                precision: 0.0,
                recall: 0.0,
                training_seconds: 0.01,
                is_champion: false,
                in_ensemble: true,
            },
        ]
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert!(OutputFormat::from_str("sarif").is_err());
    }
}
