//! Numerical helpers shared by the model families.

use ndarray::ArrayView1;

pub const EPSILON: f64 = 1e-10;

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let exp_x = x.exp();
        exp_x / (1.0 + exp_x)
    }
}

#[inline]
pub fn log_sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        -(-x).exp().ln_1p()
    } else {
        x - x.exp().ln_1p()
    }
}

/// Logistic log-likelihood `-ln(1 + exp(-sign * delta))` of a ±1 outcome.
///
/// Returns NaN when the exponential is not finite, so an overflowing margin
/// reads as an undefined likelihood rather than `-inf`.
#[inline]
pub fn logistic_log_likelihood(sign: f64, delta: f64) -> f64 {
    let e = (-sign * delta).exp();
    if !e.is_finite() {
        return f64::NAN;
    }
    -(1.0 + e).ln()
}

/// Pass probability `1 / (1 + exp(-delta))` with the same NaN convention as
/// [`logistic_log_likelihood`].
#[inline]
pub fn logistic_pass_probability(delta: f64) -> f64 {
    let e = (-delta).exp();
    if !e.is_finite() {
        return f64::NAN;
    }
    1.0 / (1.0 + e)
}

#[inline]
pub fn norm(v: ArrayView1<f64>) -> f64 {
    v.dot(&v).sqrt()
}

/// Encode a pass/fail outcome as ±1.
#[inline]
pub fn outcome_sign(outcome: bool) -> f64 {
    if outcome {
        1.0
    } else {
        -1.0
    }
}
