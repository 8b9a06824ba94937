//! On-disk model state
//!
//! ```text
//! <models_dir>/
//!   CURRENT               name of the live generation
//!   gen-000007/
//!     metadata.json
//!     scaler.json
//!     random_forest.json  one file per trained family
//!     ...
//! ```
//!
//! A run is written into a scratch directory, renamed to its generation
//! name, and only then published by replacing `CURRENT` (write temp file,
//! rename). Readers never see a half-written generation. Generations other
//! than the newest `keep_generations` are pruned after a successful publish.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{StoreError, StoreResult};
use super::roster::{HistoryEntry, ModelRoster, ModelState};
use super::scaler::StandardScaler;
use super::train::{ModelFamily, TrainedModel};

const CURRENT_FILE: &str = "CURRENT";
const METADATA_FILE: &str = "metadata.json";
const SCALER_FILE: &str = "scaler.json";
const GENERATION_PREFIX: &str = "gen-";

/// Selection metadata written next to the artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub generation: u64,
    pub champion: Option<String>,
    pub champion_roc_auc: Option<f64>,
    /// Ensemble members, best first
    pub ensemble: Vec<String>,
    pub ensemble_size: usize,
    /// Every stored family, in rank order
    pub models: Vec<ModelFamily>,
    pub last_trained: DateTime<Utc>,
    pub history: Vec<HistoryEntry>,
}

impl StoreMetadata {
    fn from_state(state: &ModelState) -> Self {
        let champion = state.roster.champion();
        Self {
            generation: state.generation,
            champion: champion.map(|c| c.name().to_string()),
            champion_roc_auc: champion.and_then(|c| c.metrics.roc_auc),
            ensemble: state
                .roster
                .ensemble_names()
                .into_iter()
                .map(String::from)
                .collect(),
            ensemble_size: state.roster.ensemble_size(),
            models: state.roster.models().iter().map(|m| m.family).collect(),
            last_trained: state.trained_at,
            history: state.history.clone(),
        }
    }
}

fn generation_name(generation: u64) -> String {
    format!("{GENERATION_PREFIX}{generation:06}")
}

fn parse_generation(name: &str) -> Option<u64> {
    name.strip_prefix(GENERATION_PREFIX)?.parse().ok()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| StoreError::serde(path, e))?;
    fs::write(path, json).map_err(|e| StoreError::io(path, e))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> StoreResult<T> {
    let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| StoreError::serde(path, e))
}

/// Directory-backed store for `ModelState`.
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
    keep_generations: usize,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            keep_generations: 2,
        }
    }

    pub fn with_keep_generations(mut self, keep: usize) -> Self {
        self.keep_generations = keep.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a whole state and publish it. Returns the generation directory.
    pub fn save(&self, state: &ModelState) -> StoreResult<PathBuf> {
        fs::create_dir_all(&self.root).map_err(|e| StoreError::io(&self.root, e))?;

        let name = generation_name(state.generation);
        let final_dir = self.root.join(&name);
        let scratch = self.root.join(format!(".{name}.tmp"));
        if scratch.exists() {
            fs::remove_dir_all(&scratch).map_err(|e| StoreError::io(&scratch, e))?;
        }
        fs::create_dir_all(&scratch).map_err(|e| StoreError::io(&scratch, e))?;

        write_json(&scratch.join(SCALER_FILE), &state.scaler)?;
        for model in state.roster.models() {
            write_json(&scratch.join(format!("{}.json", model.name())), model)?;
        }
        write_json(&scratch.join(METADATA_FILE), &StoreMetadata::from_state(state))?;

        if final_dir.exists() {
            fs::remove_dir_all(&final_dir).map_err(|e| StoreError::io(&final_dir, e))?;
        }
        fs::rename(&scratch, &final_dir).map_err(|e| StoreError::io(&final_dir, e))?;

        let current = self.root.join(CURRENT_FILE);
        let current_tmp = self.root.join(format!(".{CURRENT_FILE}.tmp"));
        fs::write(&current_tmp, &name).map_err(|e| StoreError::io(&current_tmp, e))?;
        fs::rename(&current_tmp, &current).map_err(|e| StoreError::io(&current, e))?;

        tracing::info!(
            "Saved {} models to {}",
            state.roster.len(),
            final_dir.display()
        );

        if let Err(e) = self.prune(state.generation) {
            tracing::warn!("Failed to prune old model generations: {}", e);
        }
        Ok(final_dir)
    }

    /// Read the published generation. `Ok(None)` when nothing was published yet.
    pub fn load(&self) -> StoreResult<Option<ModelState>> {
        let current = self.root.join(CURRENT_FILE);
        let name = match fs::read_to_string(&current) {
            Ok(name) => name.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&current, e)),
        };
        let generation = parse_generation(&name)
            .ok_or_else(|| StoreError::Corrupt(format!("bad generation name '{name}' in CURRENT")))?;

        let dir = self.root.join(&name);
        let metadata: StoreMetadata = read_json(&dir.join(METADATA_FILE))?;
        if metadata.generation != generation {
            return Err(StoreError::Corrupt(format!(
                "CURRENT names generation {} but metadata says {}",
                generation, metadata.generation
            )));
        }
        let scaler: StandardScaler = read_json(&dir.join(SCALER_FILE))?;

        let mut models = Vec::with_capacity(metadata.models.len());
        for family in &metadata.models {
            let model: TrainedModel = read_json(&dir.join(format!("{}.json", family.name())))?;
            if model.family != *family {
                return Err(StoreError::Corrupt(format!(
                    "{}.json holds a {} model",
                    family, model.family
                )));
            }
            models.push(model);
        }
        if models.is_empty() {
            return Err(StoreError::Corrupt("generation has no models".into()));
        }

        Ok(Some(ModelState {
            generation,
            roster: ModelRoster::ranked(models, metadata.ensemble_size),
            scaler,
            trained_at: metadata.last_trained,
            history: metadata.history,
        }))
    }

    /// `load` with every failure downgraded to "not trained yet".
    pub fn load_or_none(&self) -> Option<ModelState> {
        match self.load() {
            Ok(Some(state)) => {
                tracing::info!(
                    "Loaded model generation {}. Champion: {}",
                    state.generation,
                    state.roster.champion().map_or("none", |c| c.name())
                );
                Some(state)
            }
            Ok(None) => {
                tracing::info!("No persisted models under {}", self.root.display());
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable model state: {}", e);
                None
            }
        }
    }

    /// Metadata of the published generation, if readable.
    pub fn metadata(&self) -> Option<StoreMetadata> {
        let name = fs::read_to_string(self.root.join(CURRENT_FILE)).ok()?;
        read_json(&self.root.join(name.trim()).join(METADATA_FILE)).ok()
    }

    /// Highest generation directory on disk, published or not.
    pub fn latest_generation(&self) -> Option<u64> {
        self.generations().ok()?.into_iter().max()
    }

    fn generations(&self) -> StoreResult<Vec<u64>> {
        let entries = fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        Ok(entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().and_then(parse_generation))
            .collect())
    }

    /// Keep `live` and the newest older generations up to `keep_generations`.
    /// Anything newer than `live` is left over from an abandoned counter.
    fn prune(&self, live: u64) -> StoreResult<()> {
        let generations = self.generations()?;
        let mut older: Vec<u64> = generations.iter().copied().filter(|g| *g < live).collect();
        older.sort_unstable_by(|a, b| b.cmp(a));
        older.truncate(self.keep_generations.saturating_sub(1));

        for g in generations {
            if g == live || older.contains(&g) {
                continue;
            }
            let dir = self.root.join(generation_name(g));
            fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
            tracing::debug!("Pruned {}", dir.display());
        }
        Ok(())
    }
}
