//! Gradient-boosted tree families
//!
//! Wraps the `gbdt` crate with the `LogLikelyhood` loss (binary
//! classification), label 1.0 = churned and -1.0 = retained. Three presets
//! share the wrapper:
//! - `gradient_boosting`: 100 trees, depth 6, learning rate 0.1, balanced
//!   sample weights
//! - `weighted_boosting`: same shape, positive rows weighted by
//!   `negatives / positives` counted right before the fit
//! - `shallow_boosting`: 200 depth-3 trees at learning rate 0.05, balanced
//!   sample weights
//!
//! Note: the gbdt crate internally uses `f32` (`ValueType`), while our
//! feature rows store `f64`. Conversions happen at the crate boundary.

use std::fmt;

use gbdt::config::Config;
use gbdt::decision_tree::Data;
use gbdt::gradient_boost::GBDT;
use serde::{Deserialize, Serialize};

use super::error::ModelError;
use super::features::NUM_FEATURES;
use super::imbalance::balanced_weights;

#[inline]
fn row_to_f32(row: &[f64; NUM_FEATURES]) -> Vec<f32> {
    row.iter().map(|&v| v as f32).collect()
}

/// How training rows are weighted before boosting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleWeighting {
    /// `n / (2 * n_class)` per row
    Balanced,
    /// Positives weigh `negatives / positives`, negatives weigh 1
    PositiveRatio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingConfig {
    pub iterations: usize,
    pub max_depth: u32,
    pub learning_rate: f64,
    pub weighting: SampleWeighting,
}

impl BoostingConfig {
    pub fn gradient_boosting() -> Self {
        Self {
            iterations: 100,
            max_depth: 6,
            learning_rate: 0.1,
            weighting: SampleWeighting::Balanced,
        }
    }

    pub fn weighted_boosting() -> Self {
        Self {
            weighting: SampleWeighting::PositiveRatio,
            ..Self::gradient_boosting()
        }
    }

    pub fn shallow_boosting() -> Self {
        Self {
            iterations: 200,
            max_depth: 3,
            learning_rate: 0.05,
            weighting: SampleWeighting::Balanced,
        }
    }
}

/// Per-row weights for `labels` under `weighting`.
pub fn sample_weights(labels: &[bool], weighting: SampleWeighting) -> Vec<f64> {
    match weighting {
        SampleWeighting::Balanced => balanced_weights(labels),
        SampleWeighting::PositiveRatio => {
            let positives = labels.iter().filter(|l| **l).count();
            let negatives = labels.len() - positives;
            let ratio = if positives > 0 {
                negatives as f64 / positives as f64
            } else {
                1.0
            };
            tracing::debug!("positive-class weight = {} / {} = {:.3}", negatives, positives, ratio);
            labels.iter().map(|&l| if l { ratio } else { 1.0 }).collect()
        }
    }
}

/// Thin wrapper around `gbdt::gradient_boost::GBDT`.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct GbdtClassifier {
    model: GBDT,
}

impl fmt::Debug for GbdtClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GbdtClassifier").finish_non_exhaustive()
    }
}

impl GbdtClassifier {
    /// Train a new model on scaled rows.
    pub fn fit(
        features: &[[f64; NUM_FEATURES]],
        labels: &[bool],
        config: &BoostingConfig,
    ) -> Result<Self, ModelError> {
        if features.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if features.len() != labels.len() {
            return Err(ModelError::LengthMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }
        if labels.iter().all(|l| *l) || labels.iter().all(|l| !*l) {
            return Err(ModelError::SingleClass);
        }

        let mut cfg = Config::new();
        cfg.set_feature_size(NUM_FEATURES);
        cfg.set_max_depth(config.max_depth);
        cfg.set_iterations(config.iterations);
        cfg.set_shrinkage(config.learning_rate as f32);
        cfg.set_loss("LogLikelyhood");
        cfg.set_debug(false);
        cfg.set_training_optimization_level(2);
        cfg.set_min_leaf_size(1);

        let mut model = GBDT::new(&cfg);

        let weights = sample_weights(labels, config.weighting);
        let mut training_data: Vec<Data> = features
            .iter()
            .zip(labels)
            .zip(&weights)
            .map(|((row, &label), &w)| {
                let y = if label { 1.0_f32 } else { -1.0_f32 };
                Data::new_training_data(row_to_f32(row), w as f32, y, None)
            })
            .collect();

        model.fit(&mut training_data);

        Ok(Self { model })
    }

    /// P(churn) per row.
    pub fn predict_proba(&self, rows: &[[f64; NUM_FEATURES]]) -> Vec<f64> {
        if rows.is_empty() {
            return Vec::new();
        }

        let data: Vec<Data> = rows
            .iter()
            .map(|r| Data::new_test_data(row_to_f32(r), None))
            .collect();

        self.model
            .predict(&data)
            .into_iter()
            .map(|p| (p as f64).clamp(0.0, 1.0))
            .collect()
    }
}
