//! Layered configuration for gamechurn
//!
//! Sources, lowest priority first:
//! 1. built-in defaults
//! 2. user config (`~/.config/gamechurn/config.toml`)
//! 3. project config (`./gamechurn.toml`, or the file passed with `--config`)
//! 4. environment variables
//!
//! ```toml
//! # gamechurn.toml
//! [features]
//! lookback_days = 45
//! observation_window_days = 60
//! target_window_days = 14
//! min_history_rows = 5
//!
//! [training]
//! min_training_samples = 100
//! test_fraction = 0.25
//! seed = 42
//!
//! [risk]
//! high_percentile = 85.0
//! high_min = 0.5
//! high_max = 0.8
//!
//! [storage]
//! models_dir = "/var/lib/gamechurn/models"
//! history_limit = 10
//! ```
//!
//! Environment: `MIN_TRAINING_SAMPLES`, `PREDICTION_WINDOW_DAYS` (the target
//! window), `GAMECHURN_MODELS_DIR`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::paths;
use crate::classifier::forest::ForestConfig;
use crate::classifier::{
    DatasetBuilder, FeatureExtractor, FeatureWindows, ImbalanceConfig, ModelFamily, ModelStore,
    RiskConfig, TrainConfig,
};

pub const PROJECT_CONFIG_FILE: &str = "gamechurn.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub min_training_samples: usize,
    pub test_fraction: f64,
    pub seed: u64,
    pub ensemble_size: usize,
    /// Oversample churners when their share is strictly below this
    pub imbalance_threshold: f64,
    pub smote_max_neighbors: usize,
    pub forest_trees: usize,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            min_training_samples: 100,
            test_fraction: 0.25,
            seed: 42,
            ensemble_size: 3,
            imbalance_threshold: 0.15,
            smote_max_neighbors: 5,
            forest_trees: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Defaults to the platform data directory
    pub models_dir: Option<PathBuf>,
    pub history_limit: usize,
    pub keep_generations: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            models_dir: None,
            history_limit: 10,
            keep_generations: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChurnConfig {
    pub features: FeatureWindows,
    pub training: TrainingSettings,
    pub risk: RiskConfig,
    pub storage: StorageSettings,
    /// Files that contributed, in load order
    #[serde(skip)]
    pub sources: Vec<PathBuf>,
}

/// Overlay `overlay` onto `base`, table by table.
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

impl ChurnConfig {
    /// Load from the standard locations. `explicit` replaces `./gamechurn.toml`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let project = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Some(PathBuf::from(PROJECT_CONFIG_FILE)).filter(|p| p.exists()),
        };
        let user = Self::user_config_path().filter(|p| p.exists());
        Self::load_from(user.as_deref(), project.as_deref(), |key| std::env::var(key).ok())
    }

    /// Layer the given files and environment lookup over the defaults.
    pub fn load_from(
        user: Option<&Path>,
        project: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut merged =
            toml::Value::try_from(ChurnConfig::default()).context("Failed to encode defaults")?;
        let mut sources = Vec::new();

        if let Some(path) = user {
            match read_layer(path) {
                Ok(layer) => {
                    merge_toml(&mut merged, layer);
                    sources.push(path.to_path_buf());
                    debug!("Loaded user config from {}", path.display());
                }
                Err(e) => warn!("Failed to load {}: {:#}", path.display(), e),
            }
        }
        if let Some(path) = project {
            // An explicitly chosen file must be valid.
            let layer = read_layer(path)?;
            merge_toml(&mut merged, layer);
            sources.push(path.to_path_buf());
            debug!("Loaded project config from {}", path.display());
        }

        let mut config: ChurnConfig = merged.try_into().context("Invalid configuration")?;
        config.sources = sources;
        config.apply_env(env);
        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = env("MIN_TRAINING_SAMPLES") {
            match raw.trim().parse() {
                Ok(n) => self.training.min_training_samples = n,
                Err(_) => warn!("Ignoring MIN_TRAINING_SAMPLES={raw:?}: not a number"),
            }
        }
        if let Some(raw) = env("PREDICTION_WINDOW_DAYS") {
            match raw.trim().parse::<i64>() {
                Ok(n) if n > 0 => self.features.target_window_days = n,
                _ => warn!("Ignoring PREDICTION_WINDOW_DAYS={raw:?}: not a positive number"),
            }
        }
        if let Some(raw) = env("GAMECHURN_MODELS_DIR").filter(|s| !s.trim().is_empty()) {
            self.storage.models_dir = Some(PathBuf::from(raw));
        }
    }

    /// Get the user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gamechurn").join("config.toml"))
    }

    pub fn models_dir(&self) -> PathBuf {
        self.storage
            .models_dir
            .clone()
            .unwrap_or_else(paths::default_models_dir)
    }

    pub fn store(&self) -> ModelStore {
        ModelStore::new(self.models_dir()).with_keep_generations(self.storage.keep_generations)
    }

    pub fn dataset_builder(&self) -> DatasetBuilder {
        DatasetBuilder::new(FeatureExtractor::new(self.features.clone()))
    }

    pub fn train_config(&self) -> TrainConfig {
        let t = &self.training;
        TrainConfig {
            test_fraction: t.test_fraction,
            seed: t.seed,
            min_training_samples: t.min_training_samples,
            ensemble_size: t.ensemble_size,
            imbalance: ImbalanceConfig {
                threshold: t.imbalance_threshold,
                max_neighbors: t.smote_max_neighbors,
                seed: t.seed,
            },
            forest: ForestConfig {
                n_trees: t.forest_trees,
                seed: t.seed,
                ..ForestConfig::default()
            },
            families: ModelFamily::available(),
            ..TrainConfig::default()
        }
    }

    /// Days in the churn-label window
    pub fn prediction_window_days(&self) -> i64 {
        self.features.target_window_days
    }
}

fn read_layer(path: &Path) -> Result<toml::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: toml::Value =
        toml::from_str(&content).with_context(|| format!("Invalid TOML in {}", path.display()))?;
    Ok(value)
}
