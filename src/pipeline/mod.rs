//! Churn pipeline
//!
//! Orchestrates a full run against one activity table:
//! 1. Group rows and build the labelled training table
//! 2. Train the panel and select champion + ensemble
//! 3. Persist the new generation and swap it into the registry
//! 4. Score the same users with the fresh roster (`refresh` only)
//!
//! Training and refresh are serialised through the registry's refresh lock.
//! Predictions read a snapshot and never block on a running refresh.

use std::time::Instant;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classifier::{
    HistoryEntry, ImbalanceDecision, ModelFamily, ModelRegistry, ModelState, ModelStore,
    PredictError, PredictionBatch, PredictionMethod, Predictor, SkippedFamily, TrainOutcome,
    Trainer, FEATURE_NAMES,
};
use crate::config::ChurnConfig;
use crate::models::ActivityRecord;

/// Overall result of a train or refresh run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// The run stopped early or a stage degraded; see the message
    PartialSuccess,
}

/// What a training run produced, for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub status: RunStatus,
    pub message: String,
    pub generation: Option<u64>,
    pub models_trained: usize,
    pub champion: Option<String>,
    pub roc_auc: Option<f64>,
    pub accuracy: Option<f64>,
    pub ensemble: Vec<String>,
    pub training_samples: usize,
    pub test_samples: usize,
    pub imbalance: Option<ImbalanceDecision>,
    pub skipped: Vec<SkippedFamily>,
    /// Champion ROC-AUC undefined because the held-out labels are one class
    pub auc_warning: bool,
    pub persisted: bool,
}

impl TrainReport {
    fn skipped(message: String, training_samples: usize) -> Self {
        Self {
            status: RunStatus::PartialSuccess,
            message,
            generation: None,
            models_trained: 0,
            champion: None,
            roc_auc: None,
            accuracy: None,
            ensemble: Vec::new(),
            training_samples,
            test_samples: 0,
            imbalance: None,
            skipped: Vec::new(),
            auc_warning: false,
            persisted: false,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.models_trained > 0
    }
}

/// Training followed by champion and ensemble scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshReport {
    pub status: RunStatus,
    pub message: String,
    pub elapsed_seconds: f64,
    pub models_trained: usize,
    pub champion: Option<String>,
    pub roc_auc: Option<f64>,
    pub accuracy: Option<f64>,
    pub ensemble: Vec<String>,
    pub training_samples: usize,
    pub predictions_generated: usize,
    pub auc_warning: bool,
    #[serde(skip)]
    pub batches: Vec<PredictionBatch>,
}

/// One row of the leaderboard, rank 1 is the champion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub model: String,
    pub roc_auc: Option<f64>,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub training_seconds: f64,
    pub is_champion: bool,
    pub in_ensemble: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChampionInfo {
    pub name: String,
    pub roc_auc: Option<f64>,
    pub accuracy: f64,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    NotTrained,
    Trained,
}

/// Current model state plus the effective configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub status: ModelStatus,
    pub generation: Option<u64>,
    pub champion: Option<ChampionInfo>,
    pub ensemble: Vec<String>,
    pub ensemble_size: usize,
    pub features: Vec<String>,
    pub prediction_window_days: i64,
    pub available_models: Vec<ModelFamily>,
    pub history: Vec<HistoryEntry>,
    pub models_dir: String,
    pub config_sources: Vec<String>,
}

/// Owns the model registry and store for one process.
pub struct ChurnService {
    config: ChurnConfig,
    store: ModelStore,
    registry: ModelRegistry,
}

impl ChurnService {
    /// Open the configured store and load whatever generation it publishes.
    pub fn open(config: ChurnConfig) -> Self {
        let store = config.store();
        Self::with_store(config, store)
    }

    pub fn with_store(config: ChurnConfig, store: ModelStore) -> Self {
        let registry = ModelRegistry::new(store.load_or_none());
        Self {
            config,
            store,
            registry,
        }
    }

    pub fn config(&self) -> &ChurnConfig {
        &self.config
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn is_trained(&self) -> bool {
        self.registry.snapshot().is_some()
    }

    /// Train on `records`, persist, and publish the new roster.
    pub fn train(&self, records: &[ActivityRecord]) -> TrainReport {
        let _guard = self.registry.refresh_lock();
        self.train_locked(records)
    }

    fn train_locked(&self, records: &[ActivityRecord]) -> TrainReport {
        let table = self.config.dataset_builder().build_training(records);
        let trainer = Trainer::new(self.config.train_config());

        let run = match trainer.train(&table) {
            TrainOutcome::Trained(run) => run,
            TrainOutcome::Skipped(reason) => {
                return TrainReport::skipped(format!("Training skipped: {reason}"), table.len());
            }
        };

        let previous = self.registry.snapshot();
        let mut state = ModelState {
            generation: self
                .registry
                .next_generation()
                .max(self.store.latest_generation().map_or(1, |g| g + 1)),
            roster: run.roster,
            scaler: run.scaler,
            trained_at: Utc::now(),
            history: Vec::new(),
        };
        let prior_history = previous.as_ref().map(|p| p.history.as_slice()).unwrap_or(&[]);
        state.extend_history(prior_history, self.config.storage.history_limit);

        let persisted = match self.store.save(&state) {
            Ok(dir) => {
                debug!("Published generation {} at {}", state.generation, dir.display());
                true
            }
            Err(e) => {
                warn!("Failed to persist models, keeping them in memory only: {}", e);
                false
            }
        };

        let auc_warning = state
            .roster
            .champion()
            .is_some_and(|c| c.metrics.roc_auc.is_none());
        let champion = state.roster.champion();
        let mut report = TrainReport {
            status: RunStatus::Success,
            message: String::new(),
            generation: Some(state.generation),
            models_trained: state.roster.len(),
            champion: champion.map(|c| c.name().to_string()),
            roc_auc: champion.and_then(|c| c.metrics.roc_auc),
            accuracy: champion.map(|c| c.metrics.accuracy),
            ensemble: state
                .roster
                .ensemble_names()
                .into_iter()
                .map(String::from)
                .collect(),
            training_samples: run.training_samples,
            test_samples: run.test_samples,
            imbalance: Some(run.imbalance.clone()),
            skipped: run.skipped,
            auc_warning,
            persisted,
        };

        let mut notes = Vec::new();
        if auc_warning {
            notes.push("ROC-AUC is undefined (held-out labels contain a single class)".to_string());
        }
        if run.imbalance.is_degraded() {
            notes.push("imbalance correction was not applied".to_string());
        }
        if !report.skipped.is_empty() {
            notes.push(format!("{} model families failed", report.skipped.len()));
        }
        if !persisted {
            notes.push("models were not persisted".to_string());
        }
        if !notes.is_empty() {
            report.status = RunStatus::PartialSuccess;
        }
        report.message = if notes.is_empty() {
            format!("Trained {} models", report.models_trained)
        } else {
            format!("Trained {} models; {}", report.models_trained, notes.join("; "))
        };

        self.registry.replace(state);
        info!("{}", report.message);
        report
    }

    /// Score `records` anchored at `as_of` with the current snapshot.
    pub fn predict(
        &self,
        records: &[ActivityRecord],
        method: PredictionMethod,
        as_of: NaiveDateTime,
    ) -> Result<PredictionBatch, PredictError> {
        let snapshot = self.registry.snapshot();
        let state = snapshot.as_deref().ok_or(PredictError::NotReady)?;
        let rows = self.config.dataset_builder().build_prediction(records, as_of);
        Predictor::new(self.config.risk.clone()).predict(Some(state), &rows, method)
    }

    /// Train, then score the same input with both methods.
    pub fn refresh(&self, records: &[ActivityRecord], as_of: NaiveDateTime) -> RefreshReport {
        let _guard = self.registry.refresh_lock();
        let start = Instant::now();
        info!("Starting refresh on {} activity rows", records.len());

        let train = self.train_locked(records);
        let mut report = RefreshReport {
            status: train.status,
            message: train.message.clone(),
            elapsed_seconds: 0.0,
            models_trained: train.models_trained,
            champion: train.champion.clone(),
            roc_auc: train.roc_auc,
            accuracy: train.accuracy,
            ensemble: train.ensemble.clone(),
            training_samples: train.training_samples,
            predictions_generated: 0,
            auc_warning: train.auc_warning,
            batches: Vec::new(),
        };

        if train.is_trained() {
            for method in [PredictionMethod::Champion, PredictionMethod::Ensemble] {
                match self.predict(records, method, as_of) {
                    Ok(batch) => {
                        report.predictions_generated += batch.len();
                        report.batches.push(batch);
                    }
                    Err(e) => {
                        warn!("{} prediction failed: {}", method, e);
                        report.status = RunStatus::PartialSuccess;
                        report.message =
                            format!("{}; {} prediction failed: {}", report.message, method, e);
                    }
                }
            }
        }

        report.elapsed_seconds = start.elapsed().as_secs_f64();
        info!(
            "Refresh finished in {:.2}s: {} predictions",
            report.elapsed_seconds, report.predictions_generated
        );
        report
    }

    /// Every model in the current roster, best first.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let Some(state) = self.registry.snapshot() else {
            return Vec::new();
        };
        let ensemble_size = state.roster.ensemble_size();
        state
            .roster
            .models()
            .iter()
            .enumerate()
            .map(|(i, m)| LeaderboardEntry {
                rank: i + 1,
                model: m.name().to_string(),
                roc_auc: m.metrics.roc_auc,
                accuracy: m.metrics.accuracy,
                precision: m.metrics.precision,
                recall: m.metrics.recall,
                training_seconds: m.metrics.training_seconds,
                is_champion: i == 0,
                in_ensemble: i < ensemble_size,
            })
            .collect()
    }

    pub fn info(&self) -> ModelInfo {
        let snapshot = self.registry.snapshot();
        let features = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        let mut info = ModelInfo {
            status: ModelStatus::NotTrained,
            generation: None,
            champion: None,
            ensemble: Vec::new(),
            ensemble_size: self.config.training.ensemble_size,
            features,
            prediction_window_days: self.config.prediction_window_days(),
            available_models: ModelFamily::available(),
            history: Vec::new(),
            models_dir: self.store.root().display().to_string(),
            config_sources: self
                .config
                .sources
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
        };

        if let Some(state) = snapshot {
            info.status = ModelStatus::Trained;
            info.generation = Some(state.generation);
            info.champion = state.roster.champion().map(|c| ChampionInfo {
                name: c.name().to_string(),
                roc_auc: c.metrics.roc_auc,
                accuracy: c.metrics.accuracy,
                trained_at: state.trained_at,
            });
            info.ensemble = state
                .roster
                .ensemble_names()
                .into_iter()
                .map(String::from)
                .collect();
            info.ensemble_size = state.roster.ensemble().len();
            info.history = state.history.clone();
        }
        info
    }
}

/// Current UTC time without a zone; the default prediction anchor.
pub fn default_as_of() -> NaiveDateTime {
    Utc::now().naive_utc()
}
