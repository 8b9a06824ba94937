//! Random forest of weighted-Gini CART trees
//!
//! Each tree is grown on a bootstrap sample with a random feature subset
//! considered at every split. Leaves store the weighted churn fraction and
//! the forest averages leaf fractions across trees.
//!
//! Trees are independent and grown on the rayon pool. Tree `i` draws from
//! its own RNG seeded with `seed + i`, so output does not depend on the
//! thread count.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::ModelError;
use super::features::NUM_FEATURES;
use super::imbalance::balanced_weights;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Features tried per split; `None` means `floor(sqrt(NUM_FEATURES))`
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 8,
            min_samples_split: 10,
            max_features: None,
            seed: 42,
        }
    }
}

impl ForestConfig {
    fn features_per_split(&self) -> usize {
        self.max_features
            .unwrap_or_else(|| (NUM_FEATURES as f64).sqrt() as usize)
            .clamp(1, NUM_FEATURES)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        probability: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Arena-allocated tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn predict_row(&self, row: &[f64; NUM_FEATURES]) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes.get(id) {
                Some(TreeNode::Leaf { probability }) => return *probability,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], id: usize) -> usize {
            match nodes.get(id) {
                Some(TreeNode::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit(
        features: &[[f64; NUM_FEATURES]],
        labels: &[bool],
        config: &ForestConfig,
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

        let weights = balanced_weights(labels);
        let n = features.len();

        let trees: Vec<DecisionTree> = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(i as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                let mut builder = TreeBuilder {
                    features,
                    labels,
                    weights: &weights,
                    config,
                    max_features: config.features_per_split(),
                    nodes: Vec::new(),
                };
                builder.grow(&sample, 0, &mut rng);
                DecisionTree {
                    nodes: builder.nodes,
                }
            })
            .collect();

        Ok(Self { trees })
    }

    pub fn predict_row(&self, row: &[f64; NUM_FEATURES]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        total / self.trees.len() as f64
    }

    pub fn predict_proba(&self, rows: &[[f64; NUM_FEATURES]]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

struct TreeBuilder<'a> {
    features: &'a [[f64; NUM_FEATURES]],
    labels: &'a [bool],
    weights: &'a [f64],
    config: &'a ForestConfig,
    max_features: usize,
    nodes: Vec<TreeNode>,
}

fn gini(positive_weight: f64, total_weight: f64) -> f64 {
    if total_weight <= 0.0 {
        return 0.0;
    }
    let p = positive_weight / total_weight;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}

impl TreeBuilder<'_> {
    fn weighted_totals(&self, samples: &[usize]) -> (f64, f64) {
        samples.iter().fold((0.0, 0.0), |(pos, total), &i| {
            let w = self.weights[i];
            (if self.labels[i] { pos + w } else { pos }, total + w)
        })
    }

    /// Grow a subtree and return its node id.
    fn grow(&mut self, samples: &[usize], depth: usize, rng: &mut ChaCha8Rng) -> usize {
        let (w_pos, w_total) = self.weighted_totals(samples);
        let probability = if w_total > 0.0 { w_pos / w_total } else { 0.0 };
        let pure = w_pos <= 0.0 || w_pos >= w_total;

        let id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { probability });

        if depth >= self.config.max_depth || samples.len() < self.config.min_samples_split || pure {
            return id;
        }

        let Some((feature, threshold)) = self.best_split(samples, w_pos, w_total, rng) else {
            return id;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .copied()
            .partition(|&i| self.features[i][feature] <= threshold);

        let left = self.grow(&left_samples, depth + 1, rng);
        let right = self.grow(&right_samples, depth + 1, rng);
        self.nodes[id] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn best_split(
        &self,
        samples: &[usize],
        w_pos: f64,
        w_total: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64)> {
        let parent = gini(w_pos, w_total);
        let mut candidates: Vec<usize> = (0..NUM_FEATURES).collect();
        candidates.shuffle(rng);
        candidates.truncate(self.max_features);

        let mut best: Option<(usize, f64, f64)> = None;
        let mut sorted: Vec<usize> = samples.to_vec();

        for &feature in &candidates {
            sorted.sort_by(|&a, &b| self.features[a][feature].total_cmp(&self.features[b][feature]));

            let mut left_pos = 0.0;
            let mut left_total = 0.0;
            for k in 0..sorted.len().saturating_sub(1) {
                let i = sorted[k];
                let w = self.weights[i];
                left_total += w;
                if self.labels[i] {
                    left_pos += w;
                }

                let here = self.features[i][feature];
                let next = self.features[sorted[k + 1]][feature];
                if here == next {
                    continue;
                }

                let right_pos = w_pos - left_pos;
                let right_total = w_total - left_total;
                let child = (left_total * gini(left_pos, left_total)
                    + right_total * gini(right_pos, right_total))
                    / w_total;
                let gain = parent - child;

                let improves = match best {
                    Some((_, _, g)) => gain > g,
                    None => true,
                };
                if gain > 1e-12 && improves {
                    let mid = here + (next - here) / 2.0;
                    let threshold = if mid < next { mid } else { here };
                    best = Some((feature, threshold, gain));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustered(n: usize) -> (Vec<[f64; NUM_FEATURES]>, Vec<bool>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n {
            let positive = i % 5 == 0;
            let mut row = [0.0; NUM_FEATURES];
            for (j, v) in row.iter_mut().enumerate() {
                let base = if positive { 2.0 } else { -1.0 };
                *v = base + ((i * 7 + j * 3) % 11) as f64 * 0.05;
            }
            features.push(row);
            labels.push(positive);
        }
        (features, labels)
    }

    #[test]
    fn test_forest_learns_clusters() {
        let (features, labels) = clustered(100);
        let forest = RandomForest::fit(&features, &labels, &ForestConfig::default()).unwrap();
        let probs = forest.predict_proba(&features);

        for (p, l) in probs.iter().zip(&labels) {
            assert!((0.0..=1.0).contains(p));
            if *l {
                assert!(*p > 0.5, "positive scored {p}");
            } else {
                assert!(*p < 0.5, "negative scored {p}");
            }
        }
        assert_eq!(forest.trees().len(), 100);
    }

    #[test]
    fn test_depth_is_bounded() {
        let (features, labels) = clustered(200);
        let config = ForestConfig {
            n_trees: 5,
            max_depth: 2,
            ..Default::default()
        };
        let forest = RandomForest::fit(&features, &labels, &config).unwrap();
        assert!(forest.trees().iter().all(|t| t.depth() <= 2));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (features, labels) = clustered(60);
        let config = ForestConfig {
            n_trees: 10,
            ..Default::default()
        };
        let a = RandomForest::fit(&features, &labels, &config).unwrap();
        let b = RandomForest::fit(&features, &labels, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_features_give_single_leaf() {
        let features = vec![[1.0; NUM_FEATURES]; 20];
        let labels: Vec<bool> = (0..20).map(|i| i % 2 == 0).collect();
        let config = ForestConfig {
            n_trees: 3,
            ..Default::default()
        };
        let forest = RandomForest::fit(&features, &labels, &config).unwrap();
        assert!(forest.trees().iter().all(|t| t.depth() == 0));
    }
}
