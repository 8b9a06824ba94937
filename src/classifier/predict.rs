//! Champion and ensemble scoring
//!
//! Both methods read a `ModelState` snapshot and never mutate it, so the
//! same snapshot and input always yield identical probabilities and tiers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PredictError;
use super::features::{FeatureVector, NUM_FEATURES};
use super::roster::ModelState;
use super::thresholds::{RiskConfig, RiskThresholds};
use super::train::TrainedModel;
use crate::models::{Prediction, RiskTier};

/// Default and maximum size of the high-risk list
pub const DEFAULT_HIGH_RISK_LIMIT: usize = 100;
pub const MAX_HIGH_RISK_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMethod {
    /// Best single model
    Champion,
    /// ROC-AUC weighted average of the top models
    #[default]
    Ensemble,
}

impl fmt::Display for PredictionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Champion => write!(f, "champion"),
            Self::Ensemble => write!(f, "ensemble"),
        }
    }
}

impl FromStr for PredictionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "champion" => Ok(Self::Champion),
            "ensemble" => Ok(Self::Ensemble),
            other => Err(format!("unknown prediction method '{other}'")),
        }
    }
}

/// Count and mean probability for one tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierRollup {
    pub users: usize,
    pub avg_churn_probability: f64,
}

/// Aggregate for one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRollup {
    pub project: String,
    pub total_users: usize,
    pub avg_churn_probability: f64,
    pub high: TierRollup,
    pub medium: TierRollup,
    pub low: TierRollup,
}

/// Batch-level counts plus the cut points that produced them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSummary {
    pub total_users: usize,
    pub high_risk: usize,
    pub medium_risk: usize,
    pub low_risk: usize,
    pub avg_churn_probability: f64,
    pub thresholds: RiskThresholds,
}

/// One scored batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionBatch {
    pub method: PredictionMethod,
    pub generated_at: DateTime<Utc>,
    /// Model names whose output went into the probabilities
    pub models: Vec<String>,
    pub thresholds: RiskThresholds,
    pub predictions: Vec<Prediction>,
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

impl PredictionBatch {
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn count(&self, tier: RiskTier) -> usize {
        self.predictions.iter().filter(|p| p.churn_risk == tier).count()
    }

    pub fn summary(&self) -> PredictionSummary {
        PredictionSummary {
            total_users: self.len(),
            high_risk: self.count(RiskTier::High),
            medium_risk: self.count(RiskTier::Medium),
            low_risk: self.count(RiskTier::Low),
            avg_churn_probability: mean(self.predictions.iter().map(|p| p.churn_probability)),
            thresholds: self.thresholds,
        }
    }

    /// Per-project rollup, sorted by project name.
    pub fn by_project(&self) -> Vec<ProjectRollup> {
        let mut groups: BTreeMap<&str, Vec<&Prediction>> = BTreeMap::new();
        for p in &self.predictions {
            groups.entry(p.project.as_str()).or_default().push(p);
        }

        groups
            .into_iter()
            .map(|(project, preds)| {
                let tier = |t: RiskTier| {
                    let probs: Vec<f64> = preds
                        .iter()
                        .filter(|p| p.churn_risk == t)
                        .map(|p| p.churn_probability)
                        .collect();
                    TierRollup {
                        users: probs.len(),
                        avg_churn_probability: mean(probs.into_iter()),
                    }
                };
                ProjectRollup {
                    project: project.to_string(),
                    total_users: preds.len(),
                    avg_churn_probability: mean(preds.iter().map(|p| p.churn_probability)),
                    high: tier(RiskTier::High),
                    medium: tier(RiskTier::Medium),
                    low: tier(RiskTier::Low),
                }
            })
            .collect()
    }

    /// High-tier predictions, most likely churner first, at most `limit`
    /// (clamped to `1..=MAX_HIGH_RISK_LIMIT`).
    pub fn high_risk(&self, limit: usize) -> Vec<&Prediction> {
        let limit = limit.clamp(1, MAX_HIGH_RISK_LIMIT);
        let mut high: Vec<&Prediction> = self
            .predictions
            .iter()
            .filter(|p| p.churn_risk == RiskTier::High)
            .collect();
        high.sort_by(|a, b| {
            b.churn_probability
                .total_cmp(&a.churn_probability)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        high.truncate(limit);
        high
    }
}

/// Scores feature rows against a model snapshot.
#[derive(Debug, Clone, Default)]
pub struct Predictor {
    risk: RiskConfig,
}

impl Predictor {
    pub fn new(risk: RiskConfig) -> Self {
        Self { risk }
    }

    pub fn predict(
        &self,
        state: Option<&ModelState>,
        rows: &[FeatureVector],
        method: PredictionMethod,
    ) -> Result<PredictionBatch, PredictError> {
        match method {
            PredictionMethod::Champion => self.predict_champion(state, rows),
            PredictionMethod::Ensemble => self.predict_ensemble(state, rows),
        }
    }

    pub fn predict_champion(
        &self,
        state: Option<&ModelState>,
        rows: &[FeatureVector],
    ) -> Result<PredictionBatch, PredictError> {
        let state = state.ok_or(PredictError::NotReady)?;
        let champion = state.roster.champion().ok_or(PredictError::NotReady)?;

        let scaled = scale(state, rows);
        let probabilities = model_output(champion, &scaled)?;
        Ok(self.assemble(
            PredictionMethod::Champion,
            vec![champion.name().to_string()],
            rows,
            probabilities,
        ))
    }

    /// Weighted by each member's ROC-AUC. Undefined ROC-AUC weighs 0; when
    /// every weight is 0 the members are averaged uniformly.
    pub fn predict_ensemble(
        &self,
        state: Option<&ModelState>,
        rows: &[FeatureVector],
    ) -> Result<PredictionBatch, PredictError> {
        let state = state.ok_or(PredictError::NotReady)?;
        let members = state.roster.ensemble();
        if members.is_empty() {
            return Err(PredictError::NotReady);
        }

        let scaled = scale(state, rows);
        let mut weights: Vec<f64> = members.iter().map(|m| m.metrics.ensemble_weight()).collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            tracing::warn!("Every ensemble member has zero weight; averaging uniformly");
            weights = vec![1.0; members.len()];
        }
        let total: f64 = weights.iter().sum();

        let mut combined = vec![0.0; rows.len()];
        for (member, w) in members.iter().zip(&weights) {
            let probs = model_output(member, &scaled)?;
            for (c, p) in combined.iter_mut().zip(probs) {
                *c += w * p;
            }
        }
        for c in combined.iter_mut() {
            *c /= total;
        }

        Ok(self.assemble(
            PredictionMethod::Ensemble,
            members.iter().map(|m| m.name().to_string()).collect(),
            rows,
            combined,
        ))
    }

    fn assemble(
        &self,
        method: PredictionMethod,
        models: Vec<String>,
        rows: &[FeatureVector],
        probabilities: Vec<f64>,
    ) -> PredictionBatch {
        let thresholds = RiskThresholds::from_probabilities(&probabilities, &self.risk);
        let predictions: Vec<Prediction> = rows
            .iter()
            .zip(probabilities)
            .map(|(row, p)| {
                let churn_probability = p.clamp(0.0, 1.0);
                Prediction {
                    user_id: row.user_id.clone(),
                    project: row.project.clone(),
                    churn_probability,
                    churn_risk: thresholds.tier(churn_probability),
                }
            })
            .collect();

        tracing::info!(
            "Scored {} users with {} (high > {:.3}, medium > {:.3})",
            predictions.len(),
            method,
            thresholds.high,
            thresholds.medium
        );

        PredictionBatch {
            method,
            generated_at: Utc::now(),
            models,
            thresholds,
            predictions,
        }
    }
}

fn scale(state: &ModelState, rows: &[FeatureVector]) -> Vec<[f64; NUM_FEATURES]> {
    rows.iter().map(|r| state.scaler.transform_row(&r.values)).collect()
}

fn model_output(model: &TrainedModel, scaled: &[[f64; NUM_FEATURES]]) -> Result<Vec<f64>, PredictError> {
    let probs = model.predict_proba(scaled);
    if probs.len() != scaled.len() {
        return Err(PredictError::OutputLength {
            model: model.name().to_string(),
            expected: scaled.len(),
            actual: probs.len(),
        });
    }
    Ok(probs)
}
