//! Batch-relative risk thresholds
//!
//! Tier cut points are the 85th and 50th percentiles of the batch being
//! scored, each clamped into a fixed band. The same probability can land in
//! different tiers across batches; `RiskThresholds` is returned alongside
//! every batch so consumers can see which cut points applied.

use serde::{Deserialize, Serialize};

use crate::models::RiskTier;

/// Percentile and clamp band for each tier boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub high_percentile: f64,
    pub high_min: f64,
    pub high_max: f64,
    pub medium_percentile: f64,
    pub medium_min: f64,
    pub medium_max: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            high_percentile: 85.0,
            high_min: 0.5,
            high_max: 0.8,
            medium_percentile: 50.0,
            medium_min: 0.2,
            medium_max: 0.5,
        }
    }
}

/// Cut points used for one batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub high: f64,
    pub medium: f64,
}

impl RiskThresholds {
    /// Derive thresholds from the batch's own score distribution.
    pub fn from_probabilities(probabilities: &[f64], config: &RiskConfig) -> Self {
        let mut sorted: Vec<f64> = probabilities.iter().copied().filter(|p| p.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);

        let high = percentile(&sorted, config.high_percentile).clamp(config.high_min, config.high_max);
        let medium =
            percentile(&sorted, config.medium_percentile).clamp(config.medium_min, config.medium_max);
        Self { high, medium }
    }

    /// `High` above the high cut, `Medium` above the medium cut, else `Low`.
    pub fn tier(&self, probability: f64) -> RiskTier {
        if probability > self.high {
            RiskTier::High
        } else if probability > self.medium {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

/// Linear interpolation between closest ranks; 0.0 for an empty slice.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(thresholds: &RiskThresholds, probs: &[f64], tier: RiskTier) -> usize {
        probs.iter().filter(|p| thresholds.tier(**p) == tier).count()
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 100.0), 4.0);
        assert!((percentile(&sorted, 50.0) - 2.5).abs() < 1e-12);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_two_value_batch_clamps() {
        let mut probs = vec![0.1; 85];
        probs.extend(vec![0.9; 15]);
        let t = RiskThresholds::from_probabilities(&probs, &RiskConfig::default());

        // p85 interpolates to 0.22 which clamps up to 0.5; p50 = 0.1 clamps to 0.2.
        assert_eq!(t.high, 0.5);
        assert_eq!(t.medium, 0.2);
        assert_eq!(count(&t, &probs, RiskTier::High), 15);
        assert_eq!(count(&t, &probs, RiskTier::Low), 85);
    }

    #[test]
    fn test_spread_batch_fills_every_tier() {
        let probs: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
        let t = RiskThresholds::from_probabilities(&probs, &RiskConfig::default());

        assert_eq!(t.high, 0.8);
        assert!((t.medium - 0.495).abs() < 1e-12);
        for tier in RiskTier::all() {
            assert!(count(&t, &probs, tier) > 0, "{tier} is empty");
        }
    }

    #[test]
    fn test_identical_scores_collapse_to_one_tier() {
        let probs = vec![0.9; 20];
        let t = RiskThresholds::from_probabilities(&probs, &RiskConfig::default());
        assert_eq!(count(&t, &probs, RiskTier::High), 20);
    }

    #[test]
    fn test_boundary_is_exclusive() {
        let t = RiskThresholds {
            high: 0.6,
            medium: 0.3,
        };
        assert_eq!(t.tier(0.6), RiskTier::Medium);
        assert_eq!(t.tier(0.3), RiskTier::Low);
        assert_eq!(t.tier(0.61), RiskTier::High);
    }
}
