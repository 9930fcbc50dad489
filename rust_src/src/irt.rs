//! One- and two-parameter logistic item response theory.
//!
//! Both variants fit a single binary logistic regression over one-hot
//! features of the assessment rows. They differ only in how a
//! (student, assessment) pair maps onto feature columns, which is captured by
//! [`FeatureLayout`].

use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SkillModelError};
use crate::history::{IdIndex, InteractionHistory};
use crate::interaction::{assessment_rows, Interaction};
use crate::logistic::{LogisticRegression, LogisticRegressionConfig};
use crate::model::SkillModel;
use crate::sparse::{CooMatrix, CsrMatrix};

/// Maps a (student, module) pair onto the two one-hot columns it sets.
pub trait FeatureLayout: Default {
    const NAME: &'static str;

    fn num_features(&self, num_students: usize, num_modules: usize) -> usize;

    fn feature_columns(
        &self,
        student_idx: usize,
        module_idx: usize,
        num_students: usize,
        num_modules: usize,
    ) -> [usize; 2];
}

/// Student proficiency plus assessment difficulty: `[student, S + assessment]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneParameterLayout;

impl FeatureLayout for OneParameterLayout {
    const NAME: &'static str = "OneParameterLogisticModel";

    fn num_features(&self, num_students: usize, num_modules: usize) -> usize {
        num_students + num_modules
    }

    fn feature_columns(
        &self,
        student_idx: usize,
        module_idx: usize,
        num_students: usize,
        _num_modules: usize,
    ) -> [usize; 2] {
        [student_idx, num_students + module_idx]
    }
}

/// A (student, assessment) interaction term plus assessment difficulty:
/// `[student * A + assessment, S * A + assessment]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TwoParameterLayout;

impl FeatureLayout for TwoParameterLayout {
    const NAME: &'static str = "TwoParameterLogisticModel";

    fn num_features(&self, num_students: usize, num_modules: usize) -> usize {
        (num_students + 1) * num_modules
    }

    fn feature_columns(
        &self,
        student_idx: usize,
        module_idx: usize,
        num_students: usize,
        num_modules: usize,
    ) -> [usize; 2] {
        [
            student_idx * num_modules + module_idx,
            num_students * num_modules + module_idx,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrtConfig {
    /// Pick the regularization constant on a held-out split instead of
    /// using `default_regularization`.
    pub select_regularization_constant: bool,
    pub regularization_candidates: Vec<f64>,
    pub default_regularization: f64,
    pub train_fraction: f64,
    pub seed: u64,
    pub solver: LogisticRegressionConfig,
}

impl Default for IrtConfig {
    fn default() -> Self {
        IrtConfig {
            select_regularization_constant: false,
            regularization_candidates: vec![0.1, 1.0, 10.0],
            default_regularization: 1.0,
            train_fraction: 0.7,
            seed: 0,
            solver: LogisticRegressionConfig::default(),
        }
    }
}

impl IrtConfig {
    pub fn validate(&self) -> Result<()> {
        if self.regularization_candidates.is_empty() {
            return Err(SkillModelError::invalid_config(
                "regularization_candidates",
                "[]",
                "must not be empty",
            ));
        }
        if let Some(&bad) = self
            .regularization_candidates
            .iter()
            .find(|&&c| !(c > 0.0 && c.is_finite()))
        {
            return Err(SkillModelError::invalid_config(
                "regularization_candidates",
                bad,
                "every candidate must be finite and > 0",
            ));
        }
        if !(self.default_regularization > 0.0 && self.default_regularization.is_finite()) {
            return Err(SkillModelError::invalid_config(
                "default_regularization",
                self.default_regularization,
                "must be finite and > 0",
            ));
        }
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(SkillModelError::invalid_config(
                "train_fraction",
                self.train_fraction,
                "must lie strictly between 0 and 1",
            ));
        }
        self.solver.validate()
    }
}

/// Logistic IRT over a fixed feature layout.
#[derive(Debug, Clone)]
pub struct IrtModel<L: FeatureLayout> {
    rows: Vec<Interaction>,
    students: IdIndex,
    modules: IdIndex,
    layout: L,
    config: IrtConfig,
    regularization_constant: Option<f64>,
    solver: Option<LogisticRegression>,
}

pub type OneParameterLogisticModel = IrtModel<OneParameterLayout>;
pub type TwoParameterLogisticModel = IrtModel<TwoParameterLayout>;

impl<L: FeatureLayout> IrtModel<L> {
    /// Index every student and module in `history`; keep its assessment rows
    /// for training.
    pub fn new<H: InteractionHistory>(history: &H, config: IrtConfig) -> Result<Self> {
        config.validate()?;
        let all_rows = history.interactions();
        let students = IdIndex::from_ids(all_rows.iter().map(|ixn| ixn.student_id.as_str()));
        let modules = IdIndex::from_ids(all_rows.iter().map(|ixn| ixn.module_id.as_str()));
        Ok(IrtModel {
            rows: assessment_rows(all_rows),
            students,
            modules,
            layout: L::default(),
            config,
            regularization_constant: None,
            solver: None,
        })
    }

    pub fn config(&self) -> &IrtConfig {
        &self.config
    }

    pub fn num_students(&self) -> usize {
        self.students.len()
    }

    pub fn num_modules(&self) -> usize {
        self.modules.len()
    }

    pub fn num_features(&self) -> usize {
        self.layout
            .num_features(self.students.len(), self.modules.len())
    }

    /// Assessment rows the model trains on.
    pub fn training_rows(&self) -> &[Interaction] {
        &self.rows
    }

    /// Constant used by the last fit.
    pub fn regularization_constant(&self) -> Option<f64> {
        self.regularization_constant
    }

    pub fn solver(&self) -> Option<&LogisticRegression> {
        self.solver.as_ref()
    }

    fn columns_of(&self, interaction: &Interaction) -> Result<[usize; 2]> {
        interaction.validate()?;
        let student_idx = self
            .students
            .get(&interaction.student_id)
            .ok_or_else(|| SkillModelError::UnknownStudent(interaction.student_id.clone()))?;
        let module_idx = self
            .modules
            .get(&interaction.module_id)
            .ok_or_else(|| SkillModelError::UnknownAssessment(interaction.module_id.clone()))?;
        Ok(self.layout.feature_columns(
            student_idx,
            module_idx,
            self.students.len(),
            self.modules.len(),
        ))
    }

    /// One row per interaction with exactly two unit entries.
    pub fn feature_matrix_from_interactions(
        &self,
        interactions: &[Interaction],
    ) -> Result<CsrMatrix> {
        let mut coo = CooMatrix::with_capacity(
            interactions.len(),
            self.num_features(),
            2 * interactions.len(),
        );
        for (i, ixn) in interactions.iter().enumerate() {
            for col in self.columns_of(ixn)? {
                coo.push(i, col, 1.0)?;
            }
        }
        Ok(coo.to_csr())
    }

    /// Fit the shared logistic regression on all assessment rows.
    ///
    /// A row without a recorded outcome is a failed attempt.
    pub fn fit(&mut self) -> Result<()> {
        if self.rows.is_empty() {
            return Err(SkillModelError::EmptyHistory);
        }
        let x = self.feature_matrix_from_interactions(&self.rows)?;
        let y: Vec<bool> = self.rows.iter().map(|ixn| ixn.outcome == Some(true)).collect();

        let c = if self.config.select_regularization_constant {
            self.select_regularization_constant(&x, &y)?
        } else {
            self.config.default_regularization
        };

        let mut solver = LogisticRegression::new(self.config.solver.clone()).with_c(c);
        solver.fit(&x, &y)?;

        info!(
            model = L::NAME,
            c,
            num_rows = y.len(),
            num_features = x.ncols(),
            "fitted IRT model"
        );
        self.regularization_constant = Some(c);
        self.solver = Some(solver);
        Ok(())
    }

    /// Candidate with the best mean held-out log-probability of the realized
    /// class. Earlier candidates win ties.
    fn select_regularization_constant(&self, x: &CsrMatrix, y: &[bool]) -> Result<f64> {
        let scores = self.regularization_scores(x, y)?;
        Ok(best_candidate(&scores).unwrap_or(self.config.default_regularization))
    }

    /// Seeded shuffle of `0..n` split into (train, validation) indices.
    fn validation_split(&self, n: usize) -> Result<(Vec<usize>, Vec<usize>)> {
        let n_val = ((1.0 - self.config.train_fraction) * n as f64).ceil() as usize;
        let n_train = n.saturating_sub(n_val);
        if n_val == 0 || n_train == 0 {
            return Err(SkillModelError::DimensionMismatch {
                expected: "at least one training and one validation row".to_string(),
                actual: format!("{n} rows"),
            });
        }

        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = Pcg64::seed_from_u64(self.config.seed);
        order.shuffle(&mut rng);
        let val_idx = order.split_off(n_train);
        Ok((order, val_idx))
    }

    /// `(candidate, mean held-out log-probability)` for every regularization
    /// candidate, in configured order.
    pub fn regularization_scores(&self, x: &CsrMatrix, y: &[bool]) -> Result<Vec<(f64, f64)>> {
        if x.nrows() != y.len() {
            return Err(SkillModelError::DimensionMismatch {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        let (train_idx, val_idx) = self.validation_split(y.len())?;

        let x_train = x.select_rows(&train_idx);
        let y_train: Vec<bool> = train_idx.iter().map(|&i| y[i]).collect();
        let x_val = x.select_rows(&val_idx);
        let y_val: Vec<bool> = val_idx.iter().map(|&i| y[i]).collect();

        let mut scores = Vec::with_capacity(self.config.regularization_candidates.len());
        for &c in &self.config.regularization_candidates {
            let mut solver = LogisticRegression::new(self.config.solver.clone()).with_c(c);
            solver.fit(&x_train, &y_train)?;
            let log_proba = solver.predict_log_proba(&x_val)?;

            let mut total = 0.0;
            for (i, &label) in y_val.iter().enumerate() {
                total += log_proba[[i, solver.class_index(label)?]];
            }
            let held_out = total / y_val.len() as f64;
            debug!(
                model = L::NAME,
                c,
                held_out_log_likelihood = held_out,
                "evaluated regularization constant"
            );
            scores.push((c, held_out));
        }
        Ok(scores)
    }

    fn fitted_solver(&self) -> Result<&LogisticRegression> {
        self.solver.as_ref().ok_or(SkillModelError::NotFitted(L::NAME))
    }
}

/// Highest-scoring candidate; the first one wins ties.
fn best_candidate(scores: &[(f64, f64)]) -> Option<f64> {
    let mut best: Option<(f64, f64)> = None;
    for &(c, score) in scores {
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((c, score));
        }
    }
    best.map(|(c, _)| c)
}

impl<L: FeatureLayout> SkillModel for IrtModel<L> {
    /// Uses the same column layout as the batch path.
    fn assessment_outcome_log_likelihood(
        &self,
        interaction: &Interaction,
        outcome: Option<bool>,
    ) -> Result<f64> {
        let solver = self.fitted_solver()?;
        let outcome = interaction.effective_outcome(outcome)?;
        let x = self.feature_matrix_from_interactions(std::slice::from_ref(interaction))?;
        let log_proba = solver.predict_log_proba(&x)?;
        Ok(log_proba[[0, solver.class_index(outcome)?]])
    }

    fn assessment_pass_likelihoods(&self, interactions: &[Interaction]) -> Result<Array1<f64>> {
        let solver = self.fitted_solver()?;
        let x = self.feature_matrix_from_interactions(interactions)?;
        let proba = solver.predict_proba(&x)?;
        Ok(proba.column(solver.class_index(true)?).to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::IndexedHistory;

    fn history() -> IndexedHistory {
        let mut rows = Vec::new();
        for t in 0..6 {
            rows.push(Interaction::assessment("strong", "easy", t, true));
            rows.push(Interaction::assessment("strong", "hard", t, t % 3 != 0));
            rows.push(Interaction::assessment("weak", "easy", t, t % 2 == 0));
            rows.push(Interaction::assessment("weak", "hard", t, false));
        }
        rows.push(Interaction::lesson("idle", "lesson", 6));
        IndexedHistory::new(rows)
    }

    #[test]
    fn test_ids_cover_all_rows() {
        let model = OneParameterLogisticModel::new(&history(), IrtConfig::default()).unwrap();
        assert_eq!(model.num_students(), 3);
        assert_eq!(model.num_modules(), 3);
        assert_eq!(model.num_features(), 6);
        assert_eq!(model.training_rows().len(), 24);
    }

    #[test]
    fn test_one_parameter_columns() {
        let model = OneParameterLogisticModel::new(&history(), IrtConfig::default()).unwrap();
        let rows = vec![
            Interaction::assessment("weak", "hard", 0, false),
            Interaction::assessment("strong", "easy", 0, true),
        ];
        let x = model.feature_matrix_from_interactions(&rows).unwrap();
        assert_eq!(x.shape(), (2, 6));
        assert_eq!(x.nnz(), 4);
        assert_eq!(x.row(0).collect::<Vec<_>>(), vec![(1, 1.0), (4, 1.0)]);
        assert_eq!(x.row(1).collect::<Vec<_>>(), vec![(0, 1.0), (3, 1.0)]);
    }

    #[test]
    fn test_two_parameter_columns() {
        let model = TwoParameterLogisticModel::new(&history(), IrtConfig::default()).unwrap();
        assert_eq!(model.num_features(), 12);
        let rows = vec![Interaction::assessment("weak", "hard", 0, false)];
        let x = model.feature_matrix_from_interactions(&rows).unwrap();
        // student 1, assessment 1 of 3 modules: 1 * 3 + 1 and 3 * 3 + 1
        assert_eq!(x.row(0).collect::<Vec<_>>(), vec![(4, 1.0), (10, 1.0)]);
    }

    #[test]
    fn test_not_fitted() {
        let model = OneParameterLogisticModel::new(&history(), IrtConfig::default()).unwrap();
        let ixn = Interaction::assessment("weak", "hard", 0, false);
        assert_eq!(
            model.assessment_pass_likelihood(&ixn).unwrap_err(),
            SkillModelError::NotFitted("OneParameterLogisticModel")
        );
    }

    #[test]
    fn test_unknown_ids() {
        let mut model = OneParameterLogisticModel::new(&history(), IrtConfig::default()).unwrap();
        model.fit().unwrap();
        let err = model
            .assessment_pass_likelihood(&Interaction::assessment("ghost", "easy", 0, true))
            .unwrap_err();
        assert_eq!(err, SkillModelError::UnknownStudent("ghost".into()));
        let err = model
            .assessment_pass_likelihood(&Interaction::assessment("weak", "nope", 0, true))
            .unwrap_err();
        assert_eq!(err, SkillModelError::UnknownAssessment("nope".into()));
    }

    #[test]
    fn test_fit_orders_students_and_assessments() {
        let mut model = OneParameterLogisticModel::new(&history(), IrtConfig::default()).unwrap();
        model.fit().unwrap();
        assert_eq!(model.regularization_constant(), Some(1.0));

        let rows = vec![
            Interaction::assessment("strong", "easy", 0, true),
            Interaction::assessment("strong", "hard", 0, true),
            Interaction::assessment("weak", "easy", 0, true),
            Interaction::assessment("weak", "hard", 0, true),
        ];
        let p = model.assessment_pass_likelihoods(&rows).unwrap();
        assert!(p[0] > p[2]);
        assert!(p[1] > p[3]);
        assert!(p[0] > p[1]);

        for (row, &batch) in rows.iter().zip(p.iter()) {
            let single = model.assessment_pass_likelihood(row).unwrap();
            assert!((single - batch).abs() < 1e-12);
            let fail = model
                .assessment_outcome_log_likelihood(row, Some(false))
                .unwrap()
                .exp();
            assert!((single + fail - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_two_parameter_fit_matches_batch() {
        let mut model = TwoParameterLogisticModel::new(&history(), IrtConfig::default()).unwrap();
        model.fit().unwrap();
        let rows = history().assessment_interactions().cloned().collect::<Vec<_>>();
        let batch = model.assessment_pass_likelihoods(&rows).unwrap();
        for (row, &b) in rows.iter().zip(batch.iter()) {
            assert!((model.assessment_pass_likelihood(row).unwrap() - b).abs() < 1e-12);
        }
    }

    fn selecting(seed: u64, candidates: Vec<f64>) -> IrtConfig {
        IrtConfig {
            select_regularization_constant: true,
            regularization_candidates: candidates,
            seed,
            ..Default::default()
        }
    }

    #[test]
    fn test_regularization_selection_maximizes_held_out_likelihood() {
        let h = history();
        let config = selecting(7, vec![0.1, 1.0, 10.0]);
        let mut model = OneParameterLogisticModel::new(&h, config).unwrap();
        let x = model.feature_matrix_from_interactions(model.training_rows()).unwrap();
        let y: Vec<bool> = model
            .training_rows()
            .iter()
            .map(|ixn| ixn.outcome == Some(true))
            .collect();

        let (train_idx, val_idx) = model.validation_split(y.len()).unwrap();
        assert_eq!(train_idx.len() + val_idx.len(), y.len());
        assert_eq!(val_idx.len(), 8);

        let x_train = x.select_rows(&train_idx);
        let y_train: Vec<bool> = train_idx.iter().map(|&i| y[i]).collect();
        let x_val = x.select_rows(&val_idx);
        let mut expected = Vec::new();
        for c in [0.1, 1.0, 10.0] {
            let mut solver = LogisticRegression::default().with_c(c);
            solver.fit(&x_train, &y_train).unwrap();
            let log_proba = solver.predict_log_proba(&x_val).unwrap();
            let mean = val_idx
                .iter()
                .enumerate()
                .map(|(row, &i)| log_proba[[row, solver.class_index(y[i]).unwrap()]])
                .sum::<f64>()
                / val_idx.len() as f64;
            expected.push((c, mean));
        }

        let scores = model.regularization_scores(&x, &y).unwrap();
        for ((c, score), (ec, escore)) in scores.iter().zip(&expected) {
            assert_eq!(c, ec);
            assert!((score - escore).abs() < 1e-12);
        }
        let argmax = expected
            .iter()
            .fold(expected[0], |top, &cand| if cand.1 > top.1 { cand } else { top })
            .0;

        model.fit().unwrap();
        assert_eq!(model.regularization_constant(), Some(argmax));
    }

    #[test]
    fn test_regularization_selection_ignores_candidate_order() {
        let h = history();
        let mut forward =
            OneParameterLogisticModel::new(&h, selecting(3, vec![0.1, 1.0, 10.0])).unwrap();
        let mut reversed =
            OneParameterLogisticModel::new(&h, selecting(3, vec![10.0, 1.0, 0.1])).unwrap();
        forward.fit().unwrap();
        reversed.fit().unwrap();
        assert_eq!(forward.regularization_constant(), reversed.regularization_constant());
    }

    #[test]
    fn test_best_candidate_prefers_earlier_on_ties() {
        assert_eq!(best_candidate(&[(0.1, -0.5), (1.0, -0.5), (10.0, -0.7)]), Some(0.1));
        assert_eq!(best_candidate(&[(10.0, -0.7), (1.0, -0.5), (0.1, -0.5)]), Some(1.0));
        assert_eq!(best_candidate(&[]), None);
    }

    #[test]
    fn test_validation_split_is_seeded() {
        let h = history();
        let a = OneParameterLogisticModel::new(&h, selecting(11, vec![1.0])).unwrap();
        let b = OneParameterLogisticModel::new(&h, selecting(11, vec![1.0])).unwrap();
        assert_eq!(a.validation_split(24).unwrap(), b.validation_split(24).unwrap());

        let (mut all, val) = a.validation_split(24).unwrap();
        all.extend(val);
        all.sort_unstable();
        assert_eq!(all, (0..24).collect::<Vec<_>>());

        assert!(matches!(
            a.validation_split(1),
            Err(SkillModelError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_single_class_history() {
        let rows = vec![
            Interaction::assessment("a", "x", 0, true),
            Interaction::assessment("b", "x", 1, true),
        ];
        let history = IndexedHistory::new(rows);
        let mut model = OneParameterLogisticModel::new(&history, IrtConfig::default()).unwrap();
        assert_eq!(model.fit().unwrap_err(), SkillModelError::SingleClass);
    }

    #[test]
    fn test_lesson_only_history() {
        let rows = vec![Interaction::lesson("a", "l", 0)];
        let history = IndexedHistory::new(rows);
        let mut model = OneParameterLogisticModel::new(&history, IrtConfig::default()).unwrap();
        assert_eq!(model.fit().unwrap_err(), SkillModelError::EmptyHistory);
    }

    #[test]
    fn test_config_validation() {
        let bad = IrtConfig {
            train_fraction: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            OneParameterLogisticModel::new(&history(), bad),
            Err(SkillModelError::InvalidConfig { .. })
        ));
        let config: IrtConfig =
            serde_json::from_str(r#"{"select_regularization_constant": true}"#).unwrap();
        assert_eq!(config.regularization_candidates, vec![0.1, 1.0, 10.0]);
        assert_eq!(config.solver.max_iter, 200);
    }
}
