//! Ranked model roster and the shared, versioned model state
//!
//! Training produces a whole new `ModelState`; readers take an
//! `Arc<ModelState>` snapshot and keep using it even if a refresh swaps in
//! a newer one mid-prediction. Only one refresh may run at a time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::scaler::StandardScaler;
use super::train::{ranking_order, TrainedModel};

/// Trained models ordered best-first.
#[derive(Debug)]
pub struct ModelRoster {
    models: Vec<TrainedModel>,
    ensemble_size: usize,
}

impl ModelRoster {
    /// Rank `models` by (ROC-AUC, accuracy). Ties keep panel order.
    pub fn ranked(mut models: Vec<TrainedModel>, ensemble_size: usize) -> Self {
        models.sort_by(|a, b| ranking_order(&a.metrics, &b.metrics));
        Self {
            models,
            ensemble_size: ensemble_size.max(1),
        }
    }

    pub fn champion(&self) -> Option<&TrainedModel> {
        self.models.first()
    }

    /// Top `ensemble_size` models, fewer if fewer were trained.
    pub fn ensemble(&self) -> &[TrainedModel] {
        &self.models[..self.ensemble_size.min(self.models.len())]
    }

    pub fn ensemble_names(&self) -> Vec<&'static str> {
        self.ensemble().iter().map(|m| m.name()).collect()
    }

    pub fn ensemble_size(&self) -> usize {
        self.ensemble_size
    }

    pub fn models(&self) -> &[TrainedModel] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// One entry of the bounded training history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub champion: String,
    pub roc_auc: Option<f64>,
}

/// Everything prediction needs, produced by one training run
#[derive(Debug)]
pub struct ModelState {
    /// Monotonic run counter, also the on-disk generation
    pub generation: u64,
    pub roster: ModelRoster,
    pub scaler: StandardScaler,
    pub trained_at: DateTime<Utc>,
    /// Most recent runs, oldest first
    pub history: Vec<HistoryEntry>,
}

impl ModelState {
    /// Append this run to `previous` and keep the last `limit` entries.
    pub fn extend_history(&mut self, previous: &[HistoryEntry], limit: usize) {
        let mut history = previous.to_vec();
        if let Some(champion) = self.roster.champion() {
            history.push(HistoryEntry {
                timestamp: self.trained_at,
                champion: champion.name().to_string(),
                roc_auc: champion.metrics.roc_auc,
            });
        }
        let excess = history.len().saturating_sub(limit);
        history.drain(..excess);
        self.history = history;
    }
}

/// Process-wide holder for the current `ModelState`.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    current: RwLock<Option<Arc<ModelState>>>,
    refresh: Mutex<()>,
}

impl ModelRegistry {
    pub fn new(initial: Option<ModelState>) -> Self {
        Self {
            current: RwLock::new(initial.map(Arc::new)),
            refresh: Mutex::new(()),
        }
    }

    /// Consistent view of the current state, `None` before the first training.
    pub fn snapshot(&self) -> Option<Arc<ModelState>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a whole new state.
    pub fn replace(&self, state: ModelState) -> Arc<ModelState> {
        let state = Arc::new(state);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&state));
        state
    }

    /// Held for the duration of a refresh.
    pub fn refresh_lock(&self) -> MutexGuard<'_, ()> {
        self.refresh.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn next_generation(&self) -> u64 {
        self.snapshot().map_or(1, |s| s.generation + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::forest::RandomForest;
    use crate::classifier::train::{FittedModel, ModelFamily, ModelMetrics};

    fn model(family: ModelFamily, auc: Option<f64>, acc: f64) -> TrainedModel {
        TrainedModel {
            family,
            metrics: ModelMetrics {
                roc_auc: auc,
                accuracy: acc,
                precision: 0.0,
                recall: 0.0,
                training_seconds: 0.0,
                trained_at: Utc::now(),
            },
            model: FittedModel::Forest(
                RandomForest::fit(&[[0.0; 10]], &[false], &Default::default()).unwrap(),
            ),
        }
    }

    fn state(generation: u64, models: Vec<TrainedModel>) -> ModelState {
        ModelState {
            generation,
            roster: ModelRoster::ranked(models, 3),
            scaler: StandardScaler::fit(&[]),
            trained_at: Utc::now(),
            history: Vec::new(),
        }
    }

    #[test]
    fn test_champion_and_ensemble() {
        let roster = ModelRoster::ranked(
            vec![
                model(ModelFamily::LogisticRegression, Some(0.8), 0.9),
                model(ModelFamily::RandomForest, Some(0.8), 0.95),
                model(ModelFamily::GradientBoosting, Some(0.75), 0.99),
                model(ModelFamily::ShallowBoosting, None, 1.0),
            ],
            3,
        );
        assert_eq!(roster.champion().unwrap().family, ModelFamily::RandomForest);
        assert_eq!(
            roster.ensemble_names(),
            vec!["random_forest", "logistic_regression", "gradient_boosting"]
        );
    }

    #[test]
    fn test_ensemble_shrinks_with_roster() {
        let roster = ModelRoster::ranked(vec![model(ModelFamily::RandomForest, Some(0.7), 0.7)], 3);
        assert_eq!(roster.ensemble().len(), 1);
    }

    #[test]
    fn test_history_is_capped() {
        let previous: Vec<HistoryEntry> = (0..12)
            .map(|i| HistoryEntry {
                timestamp: Utc::now(),
                champion: format!("m{i}"),
                roc_auc: Some(0.5),
            })
            .collect();
        let mut s = state(1, vec![model(ModelFamily::RandomForest, Some(0.9), 0.9)]);
        s.extend_history(&previous, 10);

        assert_eq!(s.history.len(), 10);
        assert_eq!(s.history.last().unwrap().champion, "random_forest");
        assert_eq!(s.history.first().unwrap().champion, "m3");
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let registry = ModelRegistry::new(None);
        assert!(registry.snapshot().is_none());
        assert_eq!(registry.next_generation(), 1);

        registry.replace(state(1, vec![model(ModelFamily::RandomForest, Some(0.6), 0.6)]));
        let old = registry.snapshot().unwrap();
        registry.replace(state(2, vec![model(ModelFamily::GradientBoosting, Some(0.9), 0.9)]));

        // The earlier reader still sees a complete old state.
        assert_eq!(old.generation, 1);
        assert_eq!(old.roster.champion().unwrap().family, ModelFamily::RandomForest);
        assert_eq!(registry.snapshot().unwrap().generation, 2);
        assert_eq!(registry.next_generation(), 3);
    }
}
