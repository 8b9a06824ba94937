//! Model panel training and selection
//!
//! One run:
//! 1. stratified 75/25 split
//! 2. imbalance correction on the training side only
//! 3. scaler fitted on the (possibly rebalanced) training rows
//! 4. every available family is fitted and scored on the untouched test side
//! 5. successful families are ranked by (ROC-AUC, accuracy)
//!
//! A family that fails to fit or score becomes `FamilyOutcome::Skipped` and
//! does not affect the others.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dataset::TrainingTable;
use super::error::ModelError;
use super::features::NUM_FEATURES;
use super::forest::{ForestConfig, RandomForest};
use super::gbdt_model::{BoostingConfig, GbdtClassifier};
use super::imbalance::{rebalance, ImbalanceConfig, ImbalanceDecision};
use super::logistic::{LogisticConfig, LogisticRegression};
use super::metrics::{self, Scores};
use super::roster::ModelRoster;
use super::scaler::StandardScaler;
use super::split::{select, stratified_split};

/// Classifier families in the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    LogisticRegression,
    RandomForest,
    GradientBoosting,
    /// Boosting with an explicit positive-class weight
    WeightedBoosting,
    /// Many shallow trees at a small learning rate
    ShallowBoosting,
}

impl ModelFamily {
    pub fn all() -> &'static [ModelFamily] {
        &[
            Self::LogisticRegression,
            Self::RandomForest,
            Self::GradientBoosting,
            Self::WeightedBoosting,
            Self::ShallowBoosting,
        ]
    }

    /// Families compiled into this build.
    pub fn available() -> Vec<ModelFamily> {
        Self::all()
            .iter()
            .copied()
            .filter(|f| f.is_available())
            .collect()
    }

    pub fn is_available(&self) -> bool {
        match self {
            Self::WeightedBoosting => cfg!(feature = "weighted-boosting"),
            Self::ShallowBoosting => cfg!(feature = "shallow-boosting"),
            _ => true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LogisticRegression => "logistic_regression",
            Self::RandomForest => "random_forest",
            Self::GradientBoosting => "gradient_boosting",
            Self::WeightedBoosting => "weighted_boosting",
            Self::ShallowBoosting => "shallow_boosting",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| format!("unknown model family '{s}'"))
    }
}

/// Fitted parameters for one family
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum FittedModel {
    Logistic(LogisticRegression),
    Forest(RandomForest),
    Boosted(GbdtClassifier),
}

impl FittedModel {
    /// P(churn) per scaled row.
    pub fn predict_proba(&self, rows: &[[f64; NUM_FEATURES]]) -> Vec<f64> {
        match self {
            Self::Logistic(m) => m.predict_proba(rows),
            Self::Forest(m) => m.predict_proba(rows),
            Self::Boosted(m) => m.predict_proba(rows),
        }
    }
}

/// Held-out metrics plus bookkeeping for one trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub roc_auc: Option<f64>,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub training_seconds: f64,
    pub trained_at: DateTime<Utc>,
}

impl ModelMetrics {
    fn from_scores(scores: Scores, training_seconds: f64, trained_at: DateTime<Utc>) -> Self {
        Self {
            roc_auc: scores.roc_auc,
            accuracy: scores.accuracy,
            precision: scores.precision,
            recall: scores.recall,
            training_seconds,
            trained_at,
        }
    }

    /// Weight used when this model sits in the ensemble.
    pub fn ensemble_weight(&self) -> f64 {
        self.roc_auc.unwrap_or(0.0)
    }
}

/// Ranking order: ROC-AUC descending, undefined ROC-AUC last, then accuracy descending.
pub fn ranking_order(a: &ModelMetrics, b: &ModelMetrics) -> Ordering {
    let auc = match (a.roc_auc, b.roc_auc) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    auc.then_with(|| b.accuracy.total_cmp(&a.accuracy))
}

/// Immutable (family, parameters, metrics) triple
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedModel {
    pub family: ModelFamily,
    pub metrics: ModelMetrics,
    pub model: FittedModel,
}

impl TrainedModel {
    pub fn name(&self) -> &'static str {
        self.family.name()
    }

    pub fn predict_proba(&self, rows: &[[f64; NUM_FEATURES]]) -> Vec<f64> {
        self.model.predict_proba(rows)
    }
}

/// A family that did not make it into the roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFamily {
    pub family: ModelFamily,
    pub reason: String,
}

/// Per-family result
#[derive(Debug)]
pub enum FamilyOutcome {
    Trained(TrainedModel),
    Skipped(SkippedFamily),
}

/// Why a run produced no roster
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoTrainableData,
    InsufficientSamples { found: usize, required: usize },
    NoModelTrained { failures: Vec<SkippedFamily> },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTrainableData => write!(f, "no trainable data"),
            Self::InsufficientSamples { found, required } => write!(
                f,
                "insufficient training samples: {found} found, {required} required"
            ),
            Self::NoModelTrained { failures } => {
                write!(f, "no model family trained successfully")?;
                for s in failures {
                    write!(f, "; {}: {}", s.family, s.reason)?;
                }
                Ok(())
            }
        }
    }
}

/// Everything one successful run produced
#[derive(Debug)]
pub struct TrainingRun {
    pub roster: ModelRoster,
    pub scaler: StandardScaler,
    pub imbalance: ImbalanceDecision,
    pub skipped: Vec<SkippedFamily>,
    pub training_samples: usize,
    pub test_samples: usize,
}

impl TrainingRun {
    /// The champion's ROC-AUC is undefined (single-class test data).
    pub fn auc_undefined(&self) -> bool {
        self.roster
            .champion()
            .is_some_and(|c| c.metrics.roc_auc.is_none())
    }
}

#[derive(Debug)]
pub enum TrainOutcome {
    Trained(TrainingRun),
    Skipped(SkipReason),
}

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub test_fraction: f64,
    pub seed: u64,
    /// Tables smaller than this are not trained on
    pub min_training_samples: usize,
    pub ensemble_size: usize,
    pub imbalance: ImbalanceConfig,
    pub logistic: LogisticConfig,
    pub forest: ForestConfig,
    pub families: Vec<ModelFamily>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.25,
            seed: 42,
            min_training_samples: 100,
            ensemble_size: 3,
            imbalance: ImbalanceConfig::default(),
            logistic: LogisticConfig::default(),
            forest: ForestConfig::default(),
            families: ModelFamily::available(),
        }
    }
}

/// Fits the panel and selects champion + ensemble.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainConfig,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn train(&self, table: &TrainingTable) -> TrainOutcome {
        if table.is_empty() {
            tracing::warn!("Training skipped: no trainable data");
            return TrainOutcome::Skipped(SkipReason::NoTrainableData);
        }
        if table.len() < self.config.min_training_samples {
            let reason = SkipReason::InsufficientSamples {
                found: table.len(),
                required: self.config.min_training_samples,
            };
            tracing::warn!("Training skipped: {reason}");
            return TrainOutcome::Skipped(reason);
        }

        let features = table.features();
        let labels = table.labels();
        let split = stratified_split(&labels, self.config.test_fraction, self.config.seed);

        let train_x = select(&features, &split.train);
        let train_y = select(&labels, &split.train);
        let test_x = select(&features, &split.test);
        let test_y = select(&labels, &split.test);

        tracing::info!(
            "Split {} samples: {} train / {} test",
            table.len(),
            train_x.len(),
            test_x.len()
        );

        let rebalanced = rebalance(&train_x, &train_y, &self.config.imbalance);
        let scaler = StandardScaler::fit(&rebalanced.features);
        let fit_x = scaler.transform(&rebalanced.features);
        let eval_x = scaler.transform(&test_x);

        let mut trained = Vec::new();
        let mut skipped = Vec::new();
        for &family in &self.config.families {
            match self.train_family(family, &fit_x, &rebalanced.labels, &eval_x, &test_y) {
                FamilyOutcome::Trained(model) => trained.push(model),
                FamilyOutcome::Skipped(s) => skipped.push(s),
            }
        }

        if trained.is_empty() {
            tracing::error!("No model family trained successfully; keeping the previous roster");
            return TrainOutcome::Skipped(SkipReason::NoModelTrained { failures: skipped });
        }

        let roster = ModelRoster::ranked(trained, self.config.ensemble_size);
        if let Some(champion) = roster.champion() {
            tracing::info!(
                "Champion: {} (ROC-AUC={}, accuracy={:.4})",
                champion.name(),
                fmt_auc(champion.metrics.roc_auc),
                champion.metrics.accuracy
            );
        }
        tracing::info!("Ensemble: {}", roster.ensemble_names().join(", "));

        TrainOutcome::Trained(TrainingRun {
            roster,
            scaler,
            imbalance: rebalanced.decision,
            skipped,
            training_samples: table.len(),
            test_samples: test_x.len(),
        })
    }

    fn train_family(
        &self,
        family: ModelFamily,
        fit_x: &[[f64; NUM_FEATURES]],
        fit_y: &[bool],
        eval_x: &[[f64; NUM_FEATURES]],
        eval_y: &[bool],
    ) -> FamilyOutcome {
        tracing::info!("Training {}...", family);
        let start = Instant::now();

        let result = self.fit(family, fit_x, fit_y).and_then(|model| {
            let training_seconds = start.elapsed().as_secs_f64();
            let probabilities = model.predict_proba(eval_x);
            if probabilities.iter().any(|p| !p.is_finite()) {
                return Err(ModelError::NonFiniteOutput);
            }
            let scores = metrics::evaluate(eval_y, &probabilities);
            Ok(TrainedModel {
                family,
                metrics: ModelMetrics::from_scores(scores, training_seconds, Utc::now()),
                model,
            })
        });

        match result {
            Ok(model) => {
                tracing::info!(
                    "  {}: ROC-AUC={}, accuracy={:.4} ({:.2}s)",
                    family,
                    fmt_auc(model.metrics.roc_auc),
                    model.metrics.accuracy,
                    model.metrics.training_seconds
                );
                FamilyOutcome::Trained(model)
            }
            Err(e) => {
                tracing::error!("  Failed to train {}: {}", family, e);
                FamilyOutcome::Skipped(SkippedFamily {
                    family,
                    reason: e.to_string(),
                })
            }
        }
    }

    fn fit(
        &self,
        family: ModelFamily,
        x: &[[f64; NUM_FEATURES]],
        y: &[bool],
    ) -> Result<FittedModel, ModelError> {
        let model = match family {
            ModelFamily::LogisticRegression => {
                FittedModel::Logistic(LogisticRegression::fit(x, y, &self.config.logistic)?)
            }
            ModelFamily::RandomForest => {
                let forest = ForestConfig {
                    seed: self.config.seed,
                    ..self.config.forest.clone()
                };
                FittedModel::Forest(RandomForest::fit(x, y, &forest)?)
            }
            ModelFamily::GradientBoosting => FittedModel::Boosted(GbdtClassifier::fit(
                x,
                y,
                &BoostingConfig::gradient_boosting(),
            )?),
            ModelFamily::WeightedBoosting => FittedModel::Boosted(GbdtClassifier::fit(
                x,
                y,
                &BoostingConfig::weighted_boosting(),
            )?),
            ModelFamily::ShallowBoosting => FittedModel::Boosted(GbdtClassifier::fit(
                x,
                y,
                &BoostingConfig::shallow_boosting(),
            )?),
        };
        Ok(model)
    }
}

/// Render an optional ROC-AUC for logs and reports.
pub fn fmt_auc(auc: Option<f64>) -> String {
    match auc {
        Some(v) => format!("{v:.4}"),
        None => "undefined".to_string(),
    }
}
