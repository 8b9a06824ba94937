//! Class-imbalance correction
//!
//! When churned rows make up less than `threshold` of the training split,
//! synthetic churn rows are interpolated between each churned row and one
//! of its nearest churned neighbours (SMOTE) until the classes are even.
//!
//! The corrected data is only ever used for fitting. Evaluation always runs
//! on the untouched held-out split.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::features::NUM_FEATURES;

/// Oversampling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImbalanceConfig {
    /// Oversample when the positive rate is strictly below this
    pub threshold: f64,
    /// Upper bound on the neighbour count
    pub max_neighbors: usize,
    pub seed: u64,
}

impl Default for ImbalanceConfig {
    fn default() -> Self {
        Self {
            threshold: 0.15,
            max_neighbors: 5,
            seed: 42,
        }
    }
}

/// What the corrector did with the split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ImbalanceDecision {
    /// Positive rate at or above the threshold
    NotNeeded { positive_rate: f64 },
    Oversampled {
        positive_rate: f64,
        synthetic: usize,
        neighbors: usize,
    },
    /// Fewer than two positives, nothing to interpolate between
    TooFewPositives { positives: usize },
    /// Oversampling failed; the original split is used
    Fallback { reason: String },
}

impl ImbalanceDecision {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::TooFewPositives { .. } | Self::Fallback { .. })
    }
}

/// Possibly rebalanced fitting data
#[derive(Debug, Clone)]
pub struct Rebalanced {
    pub features: Vec<[f64; NUM_FEATURES]>,
    pub labels: Vec<bool>,
    pub decision: ImbalanceDecision,
}

/// Inspect the label distribution and oversample the positive class if needed.
pub fn rebalance(
    features: &[[f64; NUM_FEATURES]],
    labels: &[bool],
    config: &ImbalanceConfig,
) -> Rebalanced {
    let positives = labels.iter().filter(|l| **l).count();
    let positive_rate = if labels.is_empty() {
        0.0
    } else {
        positives as f64 / labels.len() as f64
    };

    let original = |decision: ImbalanceDecision| Rebalanced {
        features: features.to_vec(),
        labels: labels.to_vec(),
        decision,
    };

    if positive_rate >= config.threshold {
        tracing::debug!("Positive rate {:.3} >= {:.3}, no resampling", positive_rate, config.threshold);
        return original(ImbalanceDecision::NotNeeded { positive_rate });
    }

    let neighbors = config.max_neighbors.min(positives.saturating_sub(1));
    if neighbors < 1 {
        tracing::warn!(
            "Positive rate {:.3} is below {:.3} but only {} positive rows; training on the imbalanced split",
            positive_rate,
            config.threshold,
            positives
        );
        return original(ImbalanceDecision::TooFewPositives { positives });
    }

    match smote(features, labels, neighbors, config.seed) {
        Ok(synthetic_rows) => {
            let synthetic = synthetic_rows.len();
            let mut out_features = features.to_vec();
            let mut out_labels = labels.to_vec();
            out_features.extend(synthetic_rows);
            out_labels.extend(std::iter::repeat(true).take(synthetic));

            tracing::info!(
                "Positive rate {:.3} below {:.3}: added {} synthetic churn rows (k={})",
                positive_rate,
                config.threshold,
                synthetic,
                neighbors
            );
            Rebalanced {
                features: out_features,
                labels: out_labels,
                decision: ImbalanceDecision::Oversampled {
                    positive_rate,
                    synthetic,
                    neighbors,
                },
            }
        }
        Err(reason) => {
            tracing::warn!("Oversampling failed ({reason}); using the original split");
            original(ImbalanceDecision::Fallback { reason })
        }
    }
}

/// Per-row weights `n / (2 * n_class)`, so both classes carry equal total weight.
///
/// A class that is absent gets no rows and so no weight; every row of the
/// present class weighs 1.0 in that case.
pub fn balanced_weights(labels: &[bool]) -> Vec<f64> {
    let n = labels.len() as f64;
    let positives = labels.iter().filter(|l| **l).count() as f64;
    let negatives = n - positives;
    if positives == 0.0 || negatives == 0.0 {
        return vec![1.0; labels.len()];
    }

    let w_pos = n / (2.0 * positives);
    let w_neg = n / (2.0 * negatives);
    labels
        .iter()
        .map(|&l| if l { w_pos } else { w_neg })
        .collect()
}

/// Generate enough synthetic positive rows to match the negative count.
fn smote(
    features: &[[f64; NUM_FEATURES]],
    labels: &[bool],
    k: usize,
    seed: u64,
) -> Result<Vec<[f64; NUM_FEATURES]>, String> {
    if features.len() != labels.len() {
        return Err(format!(
            "feature count ({}) does not match label count ({})",
            features.len(),
            labels.len()
        ));
    }

    let minority: Vec<&[f64; NUM_FEATURES]> = features
        .iter()
        .zip(labels)
        .filter(|(_, l)| **l)
        .map(|(f, _)| f)
        .collect();
    let majority = labels.len() - minority.len();
    let needed = majority.saturating_sub(minority.len());
    if minority.len() <= k {
        return Err(format!("{} positives cannot supply {} neighbours", minority.len(), k));
    }

    let neighbor_table: Vec<Vec<usize>> = (0..minority.len())
        .map(|i| nearest_neighbors(&minority, i, k))
        .collect();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut synthetic = Vec::with_capacity(needed);
    for _ in 0..needed {
        let base_idx = rng.random_range(0..minority.len());
        let nb_idx = neighbor_table[base_idx][rng.random_range(0..k)];
        let gap: f64 = rng.random();

        let base = minority[base_idx];
        let nb = minority[nb_idx];
        let mut row = [0.0; NUM_FEATURES];
        for (j, v) in row.iter_mut().enumerate() {
            *v = base[j] + gap * (nb[j] - base[j]);
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err("non-finite synthetic row".into());
        }
        synthetic.push(row);
    }

    Ok(synthetic)
}

/// Indices of the `k` nearest rows to `points[target]`, excluding itself.
fn nearest_neighbors(points: &[&[f64; NUM_FEATURES]], target: usize, k: usize) -> Vec<usize> {
    let origin = points[target];
    let mut distances: Vec<(usize, f64)> = points
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != target)
        .map(|(i, p)| {
            let d: f64 = p
                .iter()
                .zip(origin.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            (i, d)
        })
        .collect();
    distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    distances.into_iter().take(k).map(|(i, _)| i).collect()
}
