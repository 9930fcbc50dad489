//! Biased-coin baselines (zero-parameter logistic IRT).
//!
//! Every student (or every assessment) is a coin with its own Laplace-smoothed
//! pass rate, estimated directly from grouped outcome counts.

use std::collections::HashMap;

use ndarray::Array1;
use tracing::{info, warn};

use crate::error::{Result, SkillModelError};
use crate::history::{IdIndex, InteractionHistory};
use crate::interaction::Interaction;
use crate::model::SkillModel;

/// Pass and attempt counts for one student or assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutcomeCounts {
    pub passes: usize,
    pub trials: usize,
}

/// Count assessment outcomes per `key`. Lesson rows are skipped; an
/// assessment row without a recorded outcome counts as a failed trial.
pub fn group_outcome_counts<'r, F>(
    rows: &'r [Interaction],
    key: F,
) -> HashMap<&'r str, OutcomeCounts>
where
    F: Fn(&'r Interaction) -> &'r str,
{
    let mut counts: HashMap<&str, OutcomeCounts> = HashMap::new();
    for ixn in rows.iter().filter(|ixn| ixn.is_assessment()) {
        let entry = counts.entry(key(ixn)).or_default();
        entry.trials += 1;
        if ixn.outcome == Some(true) {
            entry.passes += 1;
        }
    }
    counts
}

/// `(passes + 1) / (trials + 2)`, or 0.5 with no assessment history.
#[inline]
pub fn laplace_smoothed_pass_rate(counts: Option<OutcomeCounts>) -> f64 {
    match counts {
        Some(c) => (c.passes as f64 + 1.0) / (c.trials as f64 + 2.0),
        None => 0.5,
    }
}

#[inline]
fn outcome_log_likelihood(pass_likelihood: f64, outcome: bool) -> f64 {
    if outcome {
        pass_likelihood.ln()
    } else {
        (1.0 - pass_likelihood).ln()
    }
}

fn training_rows<'a, H: InteractionHistory>(
    history: &'a H,
    filtered_history: Option<&'a [Interaction]>,
) -> &'a [Interaction] {
    filtered_history.unwrap_or_else(|| {
        warn!("no filtered history available to train biased coin model, using full history");
        history.interactions()
    })
}

/// Students as biased coins.
pub struct StudentBiasedCoinModel<'a> {
    rows: &'a [Interaction],
    students: IdIndex,
    student_pass_likelihoods: Option<Array1<f64>>,
}

impl<'a> StudentBiasedCoinModel<'a> {
    /// Index every student in `history`; train on `filtered_history` if given.
    pub fn new<H: InteractionHistory>(
        history: &'a H,
        filtered_history: Option<&'a [Interaction]>,
    ) -> Self {
        let students = IdIndex::from_ids(
            history
                .interactions()
                .iter()
                .map(|ixn| ixn.student_id.as_str()),
        );
        StudentBiasedCoinModel {
            rows: training_rows(history, filtered_history),
            students,
            student_pass_likelihoods: None,
        }
    }

    pub fn fit(&mut self) -> Result<()> {
        let counts = group_outcome_counts(self.rows, |ixn| ixn.student_id.as_str());
        let rates: Array1<f64> = self
            .students
            .iter()
            .map(|id| laplace_smoothed_pass_rate(counts.get(id).copied()))
            .collect();
        info!(num_students = rates.len(), "fitted student biased coin model");
        self.student_pass_likelihoods = Some(rates);
        Ok(())
    }

    pub fn pass_rates(&self) -> Option<&Array1<f64>> {
        self.student_pass_likelihoods.as_ref()
    }

    fn pass_rate_of(&self, interaction: &Interaction) -> Result<f64> {
        let rates = self
            .student_pass_likelihoods
            .as_ref()
            .ok_or(SkillModelError::NotFitted("StudentBiasedCoinModel"))?;
        if interaction.student_id.is_empty() {
            return Err(SkillModelError::MissingField("student_id"));
        }
        let idx = self
            .students
            .get(&interaction.student_id)
            .ok_or_else(|| SkillModelError::UnknownStudent(interaction.student_id.clone()))?;
        Ok(rates[idx])
    }
}

impl SkillModel for StudentBiasedCoinModel<'_> {
    fn assessment_outcome_log_likelihood(
        &self,
        interaction: &Interaction,
        outcome: Option<bool>,
    ) -> Result<f64> {
        let outcome = interaction.effective_outcome(outcome)?;
        let pass_likelihood = self.pass_rate_of(interaction)?;
        Ok(outcome_log_likelihood(pass_likelihood, outcome))
    }

    fn assessment_pass_likelihoods(&self, interactions: &[Interaction]) -> Result<Array1<f64>> {
        interactions
            .iter()
            .map(|ixn| self.pass_rate_of(ixn))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }
}

/// Assessments as biased coins.
pub struct AssessmentBiasedCoinModel<'a, H: InteractionHistory> {
    history: &'a H,
    rows: &'a [Interaction],
    assessment_pass_likelihoods: Option<Array1<f64>>,
}

impl<'a, H: InteractionHistory> AssessmentBiasedCoinModel<'a, H> {
    pub fn new(history: &'a H, filtered_history: Option<&'a [Interaction]>) -> Self {
        AssessmentBiasedCoinModel {
            history,
            rows: training_rows(history, filtered_history),
            assessment_pass_likelihoods: None,
        }
    }

    pub fn fit(&mut self) -> Result<()> {
        let counts = group_outcome_counts(self.rows, |ixn| ixn.module_id.as_str());
        let mut rates = Array1::zeros(self.history.num_assessments());
        for assessment_id in self.history.iter_assessments() {
            let idx = self.history.idx_of_assessment_id(assessment_id)?;
            rates[idx] = laplace_smoothed_pass_rate(counts.get(assessment_id).copied());
        }
        info!(num_assessments = rates.len(), "fitted assessment biased coin model");
        self.assessment_pass_likelihoods = Some(rates);
        Ok(())
    }

    pub fn pass_rates(&self) -> Option<&Array1<f64>> {
        self.assessment_pass_likelihoods.as_ref()
    }

    fn pass_rate_of(&self, interaction: &Interaction) -> Result<f64> {
        let rates = self
            .assessment_pass_likelihoods
            .as_ref()
            .ok_or(SkillModelError::NotFitted("AssessmentBiasedCoinModel"))?;
        if interaction.module_id.is_empty() {
            return Err(SkillModelError::MissingField("module_id"));
        }
        let idx = self.history.idx_of_assessment_id(&interaction.module_id)?;
        Ok(rates[idx])
    }
}

impl<H: InteractionHistory> SkillModel for AssessmentBiasedCoinModel<'_, H> {
    fn assessment_outcome_log_likelihood(
        &self,
        interaction: &Interaction,
        outcome: Option<bool>,
    ) -> Result<f64> {
        let outcome = interaction.effective_outcome(outcome)?;
        let pass_likelihood = self.pass_rate_of(interaction)?;
        Ok(outcome_log_likelihood(pass_likelihood, outcome))
    }

    fn assessment_pass_likelihoods(&self, interactions: &[Interaction]) -> Result<Array1<f64>> {
        interactions
            .iter()
            .map(|ixn| self.pass_rate_of(ixn))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }
}
