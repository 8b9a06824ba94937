//! L2-regularised logistic regression
//!
//! Fitted by Newton-Raphson (IRLS) on the weighted log-likelihood. Rows are
//! weighted so both classes contribute equally. The intercept is not
//! penalised.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::error::ModelError;
use super::features::NUM_FEATURES;
use super::imbalance::balanced_weights;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticConfig {
    /// Inverse regularisation strength
    pub c: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iterations: 1000,
            tolerance: 1e-8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    coefficients: Vec<f64>,
    intercept: f64,
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl LogisticRegression {
    pub fn fit(
        features: &[[f64; NUM_FEATURES]],
        labels: &[bool],
        config: &LogisticConfig,
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
        if labels.iter().all(|l| *l) || labels.iter().all(|l| !*l) {
            return Err(ModelError::SingleClass);
        }

        let n = features.len();
        let d = NUM_FEATURES + 1;
        // Column 0 is the intercept.
        let x = DMatrix::from_fn(n, d, |i, j| if j == 0 { 1.0 } else { features[i][j - 1] });
        let y = DVector::from_fn(n, |i, _| if labels[i] { 1.0 } else { 0.0 });
        let w = DVector::from_vec(balanced_weights(labels));
        let lambda = 1.0 / config.c;

        let mut beta = DVector::<f64>::zeros(d);
        let mut converged = false;

        for iteration in 0..config.max_iterations {
            let p = (&x * &beta).map(sigmoid);

            let residual = DVector::from_fn(n, |i, _| w[i] * (y[i] - p[i]));
            let mut gradient = x.transpose() * residual;
            for j in 1..d {
                gradient[j] -= lambda * beta[j];
            }

            let xw = DMatrix::from_fn(n, d, |i, j| x[(i, j)] * w[i] * p[i] * (1.0 - p[i]));
            let mut hessian = x.transpose() * xw;
            for j in 1..d {
                hessian[(j, j)] += lambda;
            }

            let step = match hessian.clone().cholesky() {
                Some(chol) => chol.solve(&gradient),
                None => hessian.lu().solve(&gradient).ok_or_else(|| {
                    ModelError::Numerical(format!("singular Hessian at iteration {iteration}"))
                })?,
            };

            beta += &step;
            if beta.iter().any(|b| !b.is_finite()) {
                return Err(ModelError::Numerical("coefficients diverged".into()));
            }
            if step.amax() < config.tolerance {
                tracing::debug!("logistic regression converged after {} iterations", iteration + 1);
                converged = true;
                break;
            }
        }

        if !converged {
            tracing::warn!(
                "logistic regression stopped at {} iterations without converging",
                config.max_iterations
            );
        }

        Ok(Self {
            intercept: beta[0],
            coefficients: beta.iter().skip(1).copied().collect(),
        })
    }

    /// P(churn) for one scaled row.
    pub fn predict_row(&self, row: &[f64; NUM_FEATURES]) -> f64 {
        let z = self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(c, v)| c * v)
                .sum::<f64>();
        sigmoid(z)
    }

    pub fn predict_proba(&self, rows: &[[f64; NUM_FEATURES]]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}
