//! The skill-model contract shared by every model family.

use ndarray::Array1;

use crate::error::Result;
use crate::interaction::Interaction;

/// A model that scores assessment outcomes for (student, assessment, time).
pub trait SkillModel {
    /// Log-likelihood of the interaction's outcome under the current
    /// parameters. `outcome` overrides the stored outcome when given.
    ///
    /// May return NaN when the underlying formula overflows; callers should
    /// read NaN as "likelihood undefined".
    fn assessment_outcome_log_likelihood(
        &self,
        interaction: &Interaction,
        outcome: Option<bool>,
    ) -> Result<f64>;

    /// Probability that the student passes.
    fn assessment_pass_likelihood(&self, interaction: &Interaction) -> Result<f64> {
        Ok(self
            .assessment_outcome_log_likelihood(interaction, Some(true))?
            .exp())
    }

    /// Pass probabilities for a batch, in input row order.
    fn assessment_pass_likelihoods(&self, interactions: &[Interaction]) -> Result<Array1<f64>> {
        interactions
            .iter()
            .map(|ixn| self.assessment_pass_likelihood(ixn))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }
}

/// Parameter estimation for models whose fitting algorithm lives outside the
/// model. The estimator borrows the model mutably only for the call.
pub trait Estimator<M: ?Sized> {
    fn fit_model(&mut self, model: &mut M) -> Result<()>;
}
