//! Error types shared by every skill model.

use thiserror::Error;

/// Errors raised while configuring, fitting, or querying a skill model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkillModelError {
    /// A hyperparameter or flag combination was rejected before allocation.
    #[error("invalid configuration: {param} = {value} ({constraint})")]
    InvalidConfig {
        param: String,
        value: String,
        constraint: String,
    },

    /// An interaction lacks a field the model needs.
    #[error("interaction is missing field `{0}`")]
    MissingField(&'static str),

    #[error("unknown student id `{0}`")]
    UnknownStudent(String),

    #[error("unknown assessment id `{0}`")]
    UnknownAssessment(String),

    #[error("unknown lesson id `{0}`")]
    UnknownLesson(String),

    #[error("unknown concept id `{0}`")]
    UnknownConcept(String),

    /// A concept-graph query was made on a model built without a graph.
    #[error("no concept graph attached to the model")]
    MissingGraph,

    /// A prediction was requested before `fit` populated the model.
    #[error("{0} has not been fitted")]
    NotFitted(&'static str),

    /// Logistic regression needs both outcome classes in its training rows.
    #[error("training outcomes contain a single class")]
    SingleClass,

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// There are no rows to fit on.
    #[error("interaction history has no assessment interactions")]
    EmptyHistory,
}

impl SkillModelError {
    pub(crate) fn invalid_config(
        param: &str,
        value: impl ToString,
        constraint: &str,
    ) -> Self {
        SkillModelError::InvalidConfig {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SkillModelError>;
