//! Churn classifier
//!
//! Feature extraction, dataset assembly, imbalance correction, the model
//! panel, selection, persistence and batch scoring.
//!
//! Pipeline: activity rows → `DatasetBuilder` → `TrainingTable` →
//! `Trainer` (split, rebalance, scale, fit, rank) → `ModelState` →
//! `Predictor` → `PredictionBatch`.

pub mod dataset;
pub mod error;
pub mod features;
pub mod forest;
pub mod gbdt_model;
pub mod imbalance;
pub mod logistic;
pub mod metrics;
pub mod predict;
pub mod roster;
pub mod scaler;
pub mod split;
pub mod store;
pub mod thresholds;
pub mod train;

pub use dataset::{group_activity, DatasetBuilder, TrainingTable};
pub use error::{ModelError, PredictError, StoreError};
pub use features::{
    FeatureExtractor, FeatureVector, FeatureWindows, LabeledFeatureVector, FEATURE_NAMES,
    NUM_FEATURES,
};
pub use imbalance::{ImbalanceConfig, ImbalanceDecision};
pub use predict::{
    PredictionBatch, PredictionMethod, PredictionSummary, Predictor, ProjectRollup, TierRollup,
    DEFAULT_HIGH_RISK_LIMIT, MAX_HIGH_RISK_LIMIT,
};
pub use roster::{HistoryEntry, ModelRegistry, ModelRoster, ModelState};
pub use scaler::StandardScaler;
pub use store::{ModelStore, StoreMetadata};
pub use thresholds::{RiskConfig, RiskThresholds};
pub use train::{
    fmt_auc, FamilyOutcome, FittedModel, ModelFamily, ModelMetrics, SkipReason, SkippedFamily,
    TrainConfig, TrainOutcome, TrainedModel, Trainer, TrainingRun,
};
