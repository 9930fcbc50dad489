//! Contracts for the optional time-dependent effects used by embedding fitters.
//!
//! Implementations are shared with concurrent prediction calls and must be
//! `Send + Sync`.

use ndarray::{Array1, ArrayView1};

/// Forgetting penalty applied to the mean of a lesson's learning update.
pub trait ForgettingModel: Send + Sync {
    /// One penalty per lesson interaction, given the time since the
    /// student's previous interaction.
    fn penalty_terms(&self, elapsed_times: ArrayView1<f64>) -> Array1<f64>;
}

/// Time-varying variance of the Gaussian learning update.
pub trait LearningUpdateVarianceModel: Send + Sync {
    fn learning_update_variances(&self, elapsed_times: ArrayView1<f64>) -> Array1<f64>;
}
