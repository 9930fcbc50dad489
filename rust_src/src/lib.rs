//! Skill models for predicting assessment outcomes from student interaction
//! histories.
//!
//! This crate provides:
//! - A latent skill embedding model with lessons, prerequisites, biases and an
//!   optional concept-graph prior, fitted by an external estimator
//! - Student- and assessment-keyed biased-coin baselines
//! - One- and two-parameter logistic IRT fitted by sparse L2 logistic regression
//! - Multidimensional IRT
//!
//! Every model implements [`SkillModel`], which scores single interactions and
//! batches in row order.

pub mod error;
pub mod utils;

pub mod biased_coin;
pub mod effects;
pub mod embedding;
pub mod graph;
pub mod history;
pub mod interaction;
pub mod irt;
pub mod logistic;
pub mod mirt;
pub mod model;
pub mod sparse;

#[cfg(feature = "python")]
pub mod python;

pub use biased_coin::{AssessmentBiasedCoinModel, StudentBiasedCoinModel};
pub use embedding::{EmbeddingConfig, EmbeddingModel, EmbeddingParameter};
pub use error::{Result, SkillModelError};
pub use graph::{ConceptGraph, ConceptMap, ConceptModuleEdges};
pub use history::{IndexedHistory, InteractionHistory};
pub use interaction::{Interaction, ModuleType};
pub use irt::{IrtConfig, IrtModel, OneParameterLogisticModel, TwoParameterLogisticModel};
pub use logistic::{LogisticRegression, LogisticRegressionConfig};
pub use mirt::{MirtConfig, MirtModel};
pub use model::{Estimator, SkillModel};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module for skillmodels
#[cfg(feature = "python")]
#[pymodule]
fn skillmodels(m: &Bound<'_, PyModule>) -> PyResult<()> {
    python::register(m)?;
    Ok(())
}
