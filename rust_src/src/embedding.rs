//! Latent skill embedding model.
//!
//! Students, assessments, lessons and lesson prerequisites live in a shared
//! non-negative latent skill space. A student's position changes over time;
//! assessments and prerequisites are static. The probability of passing an
//! assessment is the logistic function of the embedding distance
//!
//! ```text
//! dist(s, a) = (s · a) / ||a|| - ||a||
//! ```
//!
//! plus optional student and assessment bias terms. The first term is the
//! student's projection onto the assessment's direction and the second makes
//! assessments with larger norms harder to pass.
//!
//! Parameters are allocated as zeros and populated by an external
//! [`Estimator`].

use ndarray::{Array1, Array2, Array3, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::effects::{ForgettingModel, LearningUpdateVarianceModel};
use crate::error::{Result, SkillModelError};
use crate::graph::{ConceptGraph, ConceptModuleEdges};
use crate::history::InteractionHistory;
use crate::interaction::Interaction;
use crate::model::{Estimator, SkillModel};
use crate::utils::{
    logistic_log_likelihood, logistic_pass_probability, norm, outcome_sign, sigmoid,
};

pub const ANTI_SINGULARITY_LOWER_BOUND: f64 = 0.001;

/// Hyperparameters and feature switches of an [`EmbeddingModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub embedding_dimension: usize,
    pub using_lessons: bool,
    /// Only valid together with `using_lessons`.
    pub using_prereqs: bool,
    pub using_bias: bool,
    /// Regularize module embeddings toward their concepts. Needs a graph.
    pub using_graph_prior: bool,
    pub graph_regularization_constant: f64,
    /// L1 instead of L2 regularization on lesson and assessment embeddings.
    pub using_l1_regularizer: bool,
    /// Variance of the Gaussian learning update when no time-varying model is attached.
    pub learning_update_variance_constant: f64,
    /// Forgetting penalty when no forgetting model is attached.
    pub forgetting_penalty_term_constant: f64,
    /// Floor on every component of assessment, prerequisite and concept
    /// embeddings; their norms appear in denominators.
    pub anti_singularity_lower_bound: f64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            embedding_dimension: 2,
            using_lessons: true,
            using_prereqs: true,
            using_bias: true,
            using_graph_prior: false,
            graph_regularization_constant: 0.1,
            using_l1_regularizer: false,
            learning_update_variance_constant: 0.5,
            forgetting_penalty_term_constant: 0.0,
            anti_singularity_lower_bound: ANTI_SINGULARITY_LOWER_BOUND,
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dimension == 0 {
            return Err(SkillModelError::invalid_config(
                "embedding_dimension",
                self.embedding_dimension,
                "must be strictly positive",
            ));
        }
        if !(self.learning_update_variance_constant > 0.0) {
            return Err(SkillModelError::invalid_config(
                "learning_update_variance_constant",
                self.learning_update_variance_constant,
                "must be strictly positive",
            ));
        }
        if !(self.anti_singularity_lower_bound > 0.0) {
            return Err(SkillModelError::invalid_config(
                "anti_singularity_lower_bound",
                self.anti_singularity_lower_bound,
                "must be strictly positive",
            ));
        }
        if self.using_prereqs && !self.using_lessons {
            return Err(SkillModelError::invalid_config(
                "using_prereqs",
                true,
                "lesson prerequisites need using_lessons",
            ));
        }
        Ok(())
    }
}

/// Parameter blocks of an [`EmbeddingModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingParameter {
    StudentEmbeddings,
    AssessmentEmbeddings,
    LessonEmbeddings,
    PrereqEmbeddings,
    ConceptEmbeddings,
    StudentBiases,
    AssessmentBiases,
}

pub struct EmbeddingModel<'a, H: InteractionHistory> {
    history: &'a H,
    graph: Option<&'a dyn ConceptGraph>,
    config: EmbeddingConfig,
    forgetting_model: Option<Box<dyn ForgettingModel + 'a>>,
    tv_luv_model: Option<Box<dyn LearningUpdateVarianceModel + 'a>>,

    /// (student, skill, timestep) -> skill level
    pub student_embeddings: Array3<f64>,
    /// (assessment, skill) -> skill requirement
    pub assessment_embeddings: Array2<f64>,
    pub student_biases: Array1<f64>,
    pub assessment_biases: Array1<f64>,
    /// (lesson, skill) -> skill gain
    pub lesson_embeddings: Option<Array2<f64>>,
    /// (lesson, skill) -> skill requirement
    pub prereq_embeddings: Option<Array2<f64>>,
    /// (concept, skill)
    pub concept_embeddings: Option<Array2<f64>>,
}

/// `(s · a) / ||a|| - ||a||`. Not symmetric; NaN when `a` is zero.
#[inline]
pub fn embedding_distance(
    student_embedding: ArrayView1<f64>,
    module_embedding: ArrayView1<f64>,
) -> f64 {
    let module_norm = norm(module_embedding);
    student_embedding.dot(&module_embedding) / module_norm - module_norm
}

impl<'a, H: InteractionHistory> EmbeddingModel<'a, H> {
    /// Validate `config` and allocate zeroed parameters sized from `history`.
    pub fn new(
        history: &'a H,
        config: EmbeddingConfig,
        graph: Option<&'a dyn ConceptGraph>,
    ) -> Result<Self> {
        config.validate()?;
        if config.using_graph_prior && graph.is_none() {
            return Err(SkillModelError::invalid_config(
                "using_graph_prior",
                true,
                "a concept graph must be supplied",
            ));
        }
        if config.using_graph_prior {
            warn!("correctness of gradients for the graph prior is not verified");
        }

        let d = config.embedding_dimension;
        let num_students = history.num_students();
        let num_assessments = history.num_assessments();
        let num_lessons = history.num_lessons();

        let lesson_embeddings = config
            .using_lessons
            .then(|| Array2::zeros((num_lessons, d)));
        let prereq_embeddings = config
            .using_prereqs
            .then(|| Array2::zeros((num_lessons, d)));
        let concept_embeddings = match graph {
            Some(g) if config.using_graph_prior => Some(Array2::zeros((g.num_concepts(), d))),
            _ => None,
        };

        Ok(EmbeddingModel {
            history,
            graph,
            forgetting_model: None,
            tv_luv_model: None,
            student_embeddings: Array3::zeros((num_students, d, history.duration())),
            assessment_embeddings: Array2::zeros((num_assessments, d)),
            student_biases: Array1::zeros(num_students),
            assessment_biases: Array1::zeros(num_assessments),
            lesson_embeddings,
            prereq_embeddings,
            concept_embeddings,
            config,
        })
    }

    pub fn with_forgetting_model(mut self, model: Box<dyn ForgettingModel + 'a>) -> Self {
        self.forgetting_model = Some(model);
        self
    }

    pub fn with_learning_update_variance_model(
        mut self,
        model: Box<dyn LearningUpdateVarianceModel + 'a>,
    ) -> Self {
        self.tv_luv_model = Some(model);
        self
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    pub fn history(&self) -> &'a H {
        self.history
    }

    #[inline]
    pub fn embedding_dimension(&self) -> usize {
        self.config.embedding_dimension
    }

    /// Lower bound the fitter must keep every component of `param` above.
    /// Biases are unconstrained.
    pub fn anti_singularity_lower_bound(&self, param: EmbeddingParameter) -> f64 {
        match param {
            EmbeddingParameter::StudentEmbeddings | EmbeddingParameter::LessonEmbeddings => 0.0,
            EmbeddingParameter::AssessmentEmbeddings
            | EmbeddingParameter::PrereqEmbeddings
            | EmbeddingParameter::ConceptEmbeddings => self.config.anti_singularity_lower_bound,
            EmbeddingParameter::StudentBiases | EmbeddingParameter::AssessmentBiases => {
                f64::NEG_INFINITY
            }
        }
    }

    /// Variance of the learning update for each lesson interaction.
    pub fn learning_update_variance(&self, elapsed_times: ArrayView1<f64>) -> Result<Array1<f64>> {
        let n = elapsed_times.len();
        let Some(model) = &self.tv_luv_model else {
            return Ok(Array1::from_elem(
                n,
                self.config.learning_update_variance_constant,
            ));
        };

        let variances = model.learning_update_variances(elapsed_times);
        if variances.len() != n {
            return Err(SkillModelError::DimensionMismatch {
                expected: format!("{n} learning update variances"),
                actual: variances.len().to_string(),
            });
        }
        Ok(variances)
    }

    /// Forgetting penalty for each lesson interaction, broadcast over skill
    /// dimensions: shape `(n, embedding_dimension)`.
    pub fn forgetting_penalty_terms(&self, elapsed_times: ArrayView1<f64>) -> Result<Array2<f64>> {
        let n = elapsed_times.len();
        let d = self.config.embedding_dimension;
        let Some(model) = &self.forgetting_model else {
            return Ok(Array2::from_elem((n, d), self.config.forgetting_penalty_term_constant));
        };

        let penalties = model.penalty_terms(elapsed_times);
        if penalties.len() != n {
            return Err(SkillModelError::DimensionMismatch {
                expected: format!("{n} penalty terms"),
                actual: penalties.len().to_string(),
            });
        }
        let column = penalties.insert_axis(Axis(1));
        Ok(column
            .broadcast((n, d))
            .map(|view| view.to_owned())
            .unwrap_or_else(|| Array2::zeros((n, d))))
    }

    pub fn concept_assessment_edges_in_graph(&self) -> Result<ConceptModuleEdges> {
        let graph = self.graph.ok_or(SkillModelError::MissingGraph)?;
        let history = self.history;
        graph.concept_module_edges(&mut history.iter_assessments(), &|id: &str| {
            history.idx_of_assessment_id(id)
        })
    }

    pub fn concept_lesson_edges_in_graph(&self) -> Result<ConceptModuleEdges> {
        let graph = self.graph.ok_or(SkillModelError::MissingGraph)?;
        let history = self.history;
        graph.concept_module_edges(&mut history.iter_lessons(), &|id: &str| {
            history.idx_of_lesson_id(id)
        })
    }

    /// Hand the model to `estimator` to populate its parameters.
    pub fn fit<E: Estimator<Self>>(&mut self, estimator: &mut E) -> Result<()> {
        estimator.fit_model(self)
    }

    #[inline]
    pub fn embedding_distance(
        student_embedding: ArrayView1<f64>,
        module_embedding: ArrayView1<f64>,
    ) -> f64 {
        embedding_distance(student_embedding, module_embedding)
    }

    /// Logistic log-likelihood of a ±1 `outcome` given raw parameters.
    pub fn assessment_outcome_log_likelihood_helper(
        &self,
        student_during: ArrayView1<f64>,
        requirements_of_assessment: ArrayView1<f64>,
        student_bias: f64,
        assessment_bias: f64,
        outcome: f64,
    ) -> f64 {
        let delta = self.delta(
            student_during,
            requirements_of_assessment,
            student_bias,
            assessment_bias,
        );
        logistic_log_likelihood(outcome, delta)
    }

    /// How well a student satisfies a lesson's prerequisite before the lesson.
    pub fn prereq_weight(
        &self,
        prev_student_embedding: ArrayView1<f64>,
        prereq_embedding: ArrayView1<f64>,
    ) -> f64 {
        sigmoid(Self::embedding_distance(prev_student_embedding, prereq_embedding))
    }

    #[inline]
    fn delta(
        &self,
        student_during: ArrayView1<f64>,
        requirements_of_assessment: ArrayView1<f64>,
        student_bias: f64,
        assessment_bias: f64,
    ) -> f64 {
        let distance = Self::embedding_distance(student_during, requirements_of_assessment);
        if self.config.using_bias {
            distance + student_bias + assessment_bias
        } else {
            distance
        }
    }

    fn check_timestep(&self, timestep: usize) -> Result<()> {
        let duration = self.student_embeddings.len_of(Axis(2));
        if timestep >= duration {
            return Err(SkillModelError::DimensionMismatch {
                expected: format!("timestep < {duration}"),
                actual: timestep.to_string(),
            });
        }
        Ok(())
    }

    /// (student index, assessment index, timestep) of a validated interaction.
    fn locate(&self, interaction: &Interaction) -> Result<(usize, usize, usize)> {
        interaction.validate()?;
        let student_idx = self.history.idx_of_student_id(&interaction.student_id)?;
        let assessment_idx = self.history.idx_of_assessment_id(&interaction.module_id)?;
        self.check_timestep(interaction.timestep)?;
        Ok((student_idx, assessment_idx, interaction.timestep))
    }
}

impl<H: InteractionHistory> SkillModel for EmbeddingModel<'_, H> {
    fn assessment_outcome_log_likelihood(
        &self,
        interaction: &Interaction,
        outcome: Option<bool>,
    ) -> Result<f64> {
        let (student_idx, assessment_idx, timestep) = self.locate(interaction)?;
        let outcome = interaction.effective_outcome(outcome)?;

        let student_during = self
            .student_embeddings
            .index_axis(Axis(0), student_idx)
            .index_axis_move(Axis(1), timestep);

        Ok(self.assessment_outcome_log_likelihood_helper(
            student_during,
            self.assessment_embeddings.row(assessment_idx),
            self.student_biases[student_idx],
            self.assessment_biases[assessment_idx],
            outcome_sign(outcome),
        ))
    }

    fn assessment_pass_likelihoods(&self, interactions: &[Interaction]) -> Result<Array1<f64>> {
        let locations = interactions
            .iter()
            .map(|ixn| self.locate(ixn))
            .collect::<Result<Vec<_>>>()?;

        let student_embeddings = &self.student_embeddings;
        let assessment_embeddings = &self.assessment_embeddings;
        let student_biases = &self.student_biases;
        let assessment_biases = &self.assessment_biases;
        let using_bias = self.config.using_bias;

        let likelihoods: Vec<f64> = locations
            .par_iter()
            .map(|&(student_idx, assessment_idx, timestep)| {
                let student_during = student_embeddings
                    .index_axis(Axis(0), student_idx)
                    .index_axis_move(Axis(1), timestep);
                let requirements = assessment_embeddings.row(assessment_idx);

                let mut delta = embedding_distance(student_during, requirements);
                if using_bias {
                    delta += student_biases[student_idx] + assessment_biases[assessment_idx];
                }
                logistic_pass_probability(delta)
            })
            .collect();

        Ok(Array1::from_vec(likelihoods))
    }
}
