//! Binary L2-regularized logistic regression on sparse features.
//!
//! Minimizes `0.5 * ||w||^2 + C * sum_i logloss(y_i, x_i . w + b)` with the
//! intercept `b` left unpenalized, by cyclic coordinate Newton steps over the
//! columns of the design matrix.

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SkillModelError};
use crate::sparse::CsrMatrix;
use crate::utils::{log_sigmoid, sigmoid, EPSILON};

/// Largest move a single coordinate may make in one Newton step.
const MAX_STEP: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticRegressionConfig {
    /// Inverse regularization strength.
    pub c: f64,
    pub tol: f64,
    pub max_iter: usize,
}

impl Default for LogisticRegressionConfig {
    fn default() -> Self {
        LogisticRegressionConfig {
            c: 1.0,
            tol: 1e-6,
            max_iter: 200,
        }
    }
}

impl LogisticRegressionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.c > 0.0 && self.c.is_finite()) {
            return Err(SkillModelError::invalid_config("c", self.c, "must be finite and > 0"));
        }
        if !(self.tol > 0.0) {
            return Err(SkillModelError::invalid_config("tol", self.tol, "must be > 0"));
        }
        if self.max_iter == 0 {
            return Err(SkillModelError::invalid_config("max_iter", 0, "must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    coefficients: Array1<f64>,
    intercept: f64,
    classes: Vec<bool>,
    converged: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LogisticRegression {
    config: LogisticRegressionConfig,
    fitted: Option<Fitted>,
}

impl LogisticRegression {
    pub fn new(config: LogisticRegressionConfig) -> Self {
        LogisticRegression {
            config,
            fitted: None,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.config.c = c;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iter = max_iter;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.config.tol = tol;
        self
    }

    pub fn config(&self) -> &LogisticRegressionConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Fit on `x` (one row per sample) against boolean labels `y`.
    pub fn fit(&mut self, x: &CsrMatrix, y: &[bool]) -> Result<()> {
        self.config.validate()?;
        if x.nrows() != y.len() {
            return Err(SkillModelError::DimensionMismatch {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        if y.is_empty() {
            return Err(SkillModelError::EmptyHistory);
        }

        let mut classes: Vec<bool> = Vec::with_capacity(2);
        for &label in y {
            if !classes.contains(&label) {
                classes.push(label);
            }
        }
        if classes.len() < 2 {
            return Err(SkillModelError::SingleClass);
        }
        classes.sort_unstable();

        let c = self.config.c;
        let targets: Vec<f64> = y.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        let columns = x.transpose();
        let n_features = x.ncols();

        let mut w = Array1::<f64>::zeros(n_features);
        let mut b = 0.0;
        let mut margins = vec![0.0; y.len()];
        let mut n_iter = 0;
        let mut converged = false;

        for iter in 0..self.config.max_iter {
            n_iter = iter + 1;
            let mut max_change: f64 = 0.0;

            for j in 0..n_features {
                let mut gradient = w[j];
                let mut hessian = 1.0;
                for (i, v) in columns.row(j) {
                    let p = sigmoid(margins[i]);
                    gradient += c * (p - targets[i]) * v;
                    hessian += c * p * (1.0 - p) * v * v;
                }
                let step = (gradient / hessian).clamp(-MAX_STEP, MAX_STEP);
                if step == 0.0 {
                    continue;
                }
                w[j] -= step;
                for (i, v) in columns.row(j) {
                    margins[i] -= step * v;
                }
                max_change = max_change.max(step.abs());
            }

            let (gradient_b, hessian_b) = margins
                .par_iter()
                .zip(targets.par_iter())
                .map(|(&z, &t)| {
                    let p = sigmoid(z);
                    (c * (p - t), c * p * (1.0 - p))
                })
                .reduce(|| (0.0, 0.0), |l, r| (l.0 + r.0, l.1 + r.1));
            if hessian_b > EPSILON {
                let step = (gradient_b / hessian_b).clamp(-MAX_STEP, MAX_STEP);
                b -= step;
                margins.par_iter_mut().for_each(|z| *z -= step);
                max_change = max_change.max(step.abs());
            }

            if max_change < self.config.tol {
                converged = true;
                break;
            }
        }

        if converged {
            debug!(
                c,
                n_iter,
                n_samples = y.len(),
                n_features,
                "logistic regression converged"
            );
        } else {
            warn!(
                c,
                max_iter = self.config.max_iter,
                tol = self.config.tol,
                "logistic regression did not converge"
            );
        }

        self.fitted = Some(Fitted {
            coefficients: w,
            intercept: b,
            classes,
            converged,
        });
        Ok(())
    }

    fn fitted(&self) -> Result<&Fitted> {
        self.fitted
            .as_ref()
            .ok_or(SkillModelError::NotFitted("LogisticRegression"))
    }

    /// Labels seen in training, sorted (`false` before `true`).
    pub fn classes(&self) -> Result<&[bool]> {
        Ok(self.fitted()?.classes.as_slice())
    }

    /// Column of `label` in [`predict_proba`](Self::predict_proba) output.
    pub fn class_index(&self, label: bool) -> Result<usize> {
        self.classes()?
            .iter()
            .position(|&l| l == label)
            .ok_or(SkillModelError::SingleClass)
    }

    pub fn coefficients(&self) -> Result<ArrayView1<'_, f64>> {
        Ok(self.fitted()?.coefficients.view())
    }

    pub fn intercept(&self) -> Result<f64> {
        Ok(self.fitted()?.intercept)
    }

    /// Whether the last fit met `tol` before running out of iterations.
    pub fn converged(&self) -> Result<bool> {
        Ok(self.fitted()?.converged)
    }

    /// `x . w + b` per row.
    pub fn decision_function(&self, x: &CsrMatrix) -> Result<Array1<f64>> {
        let fitted = self.fitted()?;
        if x.ncols() != fitted.coefficients.len() {
            return Err(SkillModelError::DimensionMismatch {
                expected: format!("{} features", fitted.coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(fitted.coefficients.view()) + fitted.intercept)
    }

    /// Class probabilities, shape `(n, 2)`, columns in [`classes`](Self::classes) order.
    pub fn predict_proba(&self, x: &CsrMatrix) -> Result<Array2<f64>> {
        self.per_class(x, sigmoid)
    }

    /// Log class probabilities, columns in [`classes`](Self::classes) order.
    pub fn predict_log_proba(&self, x: &CsrMatrix) -> Result<Array2<f64>> {
        self.per_class(x, log_sigmoid)
    }

    fn per_class(&self, x: &CsrMatrix, link: fn(f64) -> f64) -> Result<Array2<f64>> {
        let scores = self.decision_function(x)?;
        let classes = self.classes()?;
        let mut out = Array2::zeros((scores.len(), classes.len()));
        for (col, &label) in classes.iter().enumerate() {
            let sign = if label { 1.0 } else { -1.0 };
            out.column_mut(col)
                .assign(&scores.mapv(|z| link(sign * z)));
        }
        Ok(out)
    }

    /// Penalized objective at the current fit.
    pub fn objective(&self, x: &CsrMatrix, y: &[bool]) -> Result<f64> {
        let fitted = self.fitted()?;
        let scores = self.decision_function(x)?;
        let loss: f64 = scores
            .iter()
            .zip(y)
            .map(|(&z, &label)| -log_sigmoid(if label { z } else { -z }))
            .sum();
        Ok(0.5 * fitted.coefficients.dot(&fitted.coefficients) + self.config.c * loss)
    }
}
