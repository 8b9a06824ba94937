//! Zero-mean / unit-variance feature standardisation.

use serde::{Deserialize, Serialize};

use super::features::NUM_FEATURES;

/// Per-feature mean and population standard deviation.
///
/// Constant features get a scale of 1.0 so they map to 0.0 instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: [f64; NUM_FEATURES],
    scale: [f64; NUM_FEATURES],
    samples_seen: usize,
}

impl StandardScaler {
    /// Fit on training rows only.
    pub fn fit(rows: &[[f64; NUM_FEATURES]]) -> Self {
        let n = rows.len();
        let mut mean = [0.0; NUM_FEATURES];
        let mut scale = [1.0; NUM_FEATURES];
        if n == 0 {
            return Self {
                mean,
                scale,
                samples_seen: 0,
            };
        }

        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in mean.iter_mut() {
            *m /= n as f64;
        }

        for (j, s) in scale.iter_mut().enumerate() {
            let var = rows.iter().map(|r| (r[j] - mean[j]).powi(2)).sum::<f64>() / n as f64;
            let sd = var.sqrt();
            *s = if sd > f64::EPSILON && sd.is_finite() { sd } else { 1.0 };
        }

        Self {
            mean,
            scale,
            samples_seen: n,
        }
    }

    pub fn transform_row(&self, row: &[f64; NUM_FEATURES]) -> [f64; NUM_FEATURES] {
        let mut out = [0.0; NUM_FEATURES];
        for (j, o) in out.iter_mut().enumerate() {
            *o = (row[j] - self.mean[j]) / self.scale[j];
        }
        out
    }

    pub fn transform(&self, rows: &[[f64; NUM_FEATURES]]) -> Vec<[f64; NUM_FEATURES]> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }

    pub fn samples_seen(&self) -> usize {
        self.samples_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_transform_standardises() {
        let rows: Vec<[f64; NUM_FEATURES]> = (0..4)
            .map(|i| {
                let mut r = [5.0; NUM_FEATURES];
                r[0] = i as f64 * 2.0;
                r
            })
            .collect();
        let scaler = StandardScaler::fit(&rows);
        let scaled = scaler.transform(&rows);

        let mean: f64 = scaled.iter().map(|r| r[0]).sum::<f64>() / 4.0;
        let var: f64 = scaled.iter().map(|r| r[0].powi(2)).sum::<f64>() / 4.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
        // Constant column maps to zero, not NaN.
        assert!(scaled.iter().all(|r| r[1] == 0.0));
        assert_eq!(scaler.samples_seen(), 4);
    }
}
