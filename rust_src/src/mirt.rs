//! Multidimensional item response theory.
//!
//! `P(pass) = sigmoid(student_factors[s] · assessment_factors[a] + assessment_offsets[a])`
//!
//! With `using_assessment_factors = false` the assessment factors stay fixed at
//! one, so a single dimension reduces to a one-parameter model.

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillModelError};
use crate::history::InteractionHistory;
use crate::interaction::Interaction;
use crate::model::{Estimator, SkillModel};
use crate::utils::{log_sigmoid, outcome_sign};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirtConfig {
    pub dims: usize,
    pub using_assessment_factors: bool,
}

impl Default for MirtConfig {
    fn default() -> Self {
        MirtConfig {
            dims: 2,
            using_assessment_factors: true,
        }
    }
}

impl MirtConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dims == 0 {
            return Err(SkillModelError::invalid_config("dims", self.dims, "must be > 0"));
        }
        Ok(())
    }
}

pub struct MirtModel<'a, H: InteractionHistory> {
    history: &'a H,
    config: MirtConfig,

    /// (student, dim)
    pub student_factors: Array2<f64>,
    /// (assessment, dim)
    pub assessment_factors: Array2<f64>,
    pub assessment_offsets: Array1<f64>,
}

impl<'a, H: InteractionHistory> MirtModel<'a, H> {
    pub fn new(history: &'a H, config: MirtConfig) -> Result<Self> {
        config.validate()?;
        let num_students = history.num_students();
        let num_assessments = history.num_assessments();
        let assessment_factors = if config.using_assessment_factors {
            Array2::zeros((num_assessments, config.dims))
        } else {
            Array2::ones((num_assessments, config.dims))
        };
        Ok(MirtModel {
            history,
            student_factors: Array2::zeros((num_students, config.dims)),
            assessment_factors,
            assessment_offsets: Array1::zeros(num_assessments),
            config,
        })
    }

    pub fn config(&self) -> &MirtConfig {
        &self.config
    }

    pub fn history(&self) -> &'a H {
        self.history
    }

    pub fn dims(&self) -> usize {
        self.config.dims
    }

    /// Whether an estimator may move the assessment factors.
    pub fn using_assessment_factors(&self) -> bool {
        self.config.using_assessment_factors
    }

    pub fn fit<E: Estimator<Self>>(&mut self, estimator: &mut E) -> Result<()> {
        estimator.fit_model(self)
    }

    fn locate(&self, interaction: &Interaction) -> Result<(usize, usize)> {
        interaction.validate()?;
        let student_idx = self.history.idx_of_student_id(&interaction.student_id)?;
        let assessment_idx = self.history.idx_of_assessment_id(&interaction.module_id)?;
        Ok((student_idx, assessment_idx))
    }

    #[inline]
    fn logit(&self, student_idx: usize, assessment_idx: usize) -> f64 {
        self.student_factors
            .row(student_idx)
            .dot(&self.assessment_factors.row(assessment_idx))
            + self.assessment_offsets[assessment_idx]
    }
}

impl<H: InteractionHistory> SkillModel for MirtModel<'_, H> {
    fn assessment_outcome_log_likelihood(
        &self,
        interaction: &Interaction,
        outcome: Option<bool>,
    ) -> Result<f64> {
        let (student_idx, assessment_idx) = self.locate(interaction)?;
        let outcome = interaction.effective_outcome(outcome)?;
        Ok(log_sigmoid(outcome_sign(outcome) * self.logit(student_idx, assessment_idx)))
    }

    fn assessment_pass_likelihoods(&self, interactions: &[Interaction]) -> Result<Array1<f64>> {
        let locations = interactions
            .iter()
            .map(|ixn| self.locate(ixn))
            .collect::<Result<Vec<_>>>()?;

        let student_factors = &self.student_factors;
        let assessment_factors = &self.assessment_factors;
        let assessment_offsets = &self.assessment_offsets;

        let likelihoods: Vec<f64> = locations
            .par_iter()
            .map(|&(s, a)| {
                let z =
                    student_factors.row(s).dot(&assessment_factors.row(a)) + assessment_offsets[a];
                log_sigmoid(z).exp()
            })
            .collect();

        Ok(Array1::from_vec(likelihoods))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::IndexedHistory;
    use ndarray::array;

    fn history() -> IndexedHistory {
        IndexedHistory::new(vec![
            Interaction::assessment("s1", "a1", 0, true),
            Interaction::assessment("s2", "a1", 0, false),
            Interaction::assessment("s1", "a2", 1, false),
            Interaction::lesson("s3", "l1", 1),
        ])
    }

    #[test]
    fn test_zero_dims_rejected() {
        let config = MirtConfig {
            dims: 0,
            ..Default::default()
        };
        assert!(matches!(
            MirtModel::new(&history(), config),
            Err(SkillModelError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_allocation() {
        let h = history();
        let model = MirtModel::new(&h, MirtConfig::default()).unwrap();
        assert_eq!(model.student_factors.dim(), (3, 2));
        assert_eq!(model.assessment_factors.dim(), (2, 2));
        assert!(model.assessment_factors.iter().all(|&v| v == 0.0));
        assert_eq!(model.assessment_offsets.len(), 2);
    }

    #[test]
    fn test_fixed_assessment_factors_are_ones() {
        let h = history();
        let config = MirtConfig {
            dims: 1,
            using_assessment_factors: false,
        };
        let mut model = MirtModel::new(&h, config).unwrap();
        assert!(model.assessment_factors.iter().all(|&v| v == 1.0));

        // Reduces to sigmoid(theta + offset)
        model.student_factors = array![[1.0], [-1.0], [0.0]];
        model.assessment_offsets = array![0.5, -0.5];
        let p = model
            .assessment_pass_likelihood(&Interaction::assessment("s1", "a1", 0, true))
            .unwrap();
        assert!((p - 1.0 / (1.0 + (-1.5f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_pass_probability_and_complement() {
        let h = history();
        let mut model = MirtModel::new(&h, MirtConfig::default()).unwrap();
        model.student_factors = array![[1.0, 2.0], [0.0, -1.0], [0.5, 0.5]];
        model.assessment_factors = array![[1.0, 0.5], [2.0, 0.0]];
        model.assessment_offsets = array![-1.0, 0.25];

        let ixn = Interaction::assessment("s1", "a1", 0, true);
        // z = 1 + 1 - 1 = 1
        let pass = model.assessment_pass_likelihood(&ixn).unwrap();
        assert!((pass - 0.7310585786300049).abs() < 1e-12);
        let fail = model
            .assessment_outcome_log_likelihood(&ixn, Some(false))
            .unwrap()
            .exp();
        assert!((pass + fail - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_batch_matches_rows() {
        let h = history();
        let mut model = MirtModel::new(&h, MirtConfig::default()).unwrap();
        model.student_factors = array![[1.0, 2.0], [0.0, -1.0], [0.5, 0.5]];
        model.assessment_factors = array![[1.0, 0.5], [2.0, 0.0]];
        model.assessment_offsets = array![-1.0, 0.25];

        let rows = vec![
            Interaction::assessment("s2", "a2", 0, true),
            Interaction::assessment("s3", "a1", 0, false),
            Interaction::assessment("s1", "a2", 0, false),
        ];
        let batch = model.assessment_pass_likelihoods(&rows).unwrap();
        for (row, &b) in rows.iter().zip(batch.iter()) {
            assert_eq!(model.assessment_pass_likelihood(row).unwrap(), b);
        }
    }

    #[test]
    fn test_unknown_ids() {
        let h = history();
        let model = MirtModel::new(&h, MirtConfig::default()).unwrap();
        assert_eq!(
            model
                .assessment_pass_likelihood(&Interaction::assessment("ghost", "a1", 0, true))
                .unwrap_err(),
            SkillModelError::UnknownStudent("ghost".into())
        );
        assert_eq!(
            model
                .assessment_pass_likelihoods(&[Interaction::assessment("s1", "l1", 0, true)])
                .unwrap_err(),
            SkillModelError::UnknownAssessment("l1".into())
        );
    }

    struct OffsetEstimator;

    impl<'a> Estimator<MirtModel<'a, IndexedHistory>> for OffsetEstimator {
        fn fit_model(&mut self, model: &mut MirtModel<'a, IndexedHistory>) -> Result<()> {
            model.assessment_offsets.fill(2.0);
            Ok(())
        }
    }

    #[test]
    fn test_fit_delegates_to_estimator() {
        let h = history();
        let mut model = MirtModel::new(&h, MirtConfig::default()).unwrap();
        model.fit(&mut OffsetEstimator).unwrap();
        assert!(model.assessment_offsets.iter().all(|&v| v == 2.0));
    }
}
