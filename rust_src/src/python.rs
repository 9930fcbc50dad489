//! Array-level kernels exposed to Python.
//!
//! Callers gather per-row parameters on the Python side; these functions only
//! do the row-wise arithmetic, with the GIL released.

use ndarray::{Array1, Array2, ArrayView1};
use numpy::{PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use rayon::prelude::*;

use crate::biased_coin::{laplace_smoothed_pass_rate, OutcomeCounts};
use crate::embedding::embedding_distance as distance;
use crate::error::SkillModelError;
use crate::irt::{FeatureLayout, OneParameterLayout, TwoParameterLayout};
use crate::utils::{log_sigmoid, logistic_pass_probability};

impl From<SkillModelError> for PyErr {
    fn from(err: SkillModelError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

fn check_len(name: &str, expected: usize, actual: usize) -> Result<(), SkillModelError> {
    if expected != actual {
        return Err(SkillModelError::DimensionMismatch {
            expected: format!("{name} of length {expected}"),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

fn check_shape(
    name: &str,
    expected: (usize, usize),
    actual: (usize, usize),
) -> Result<(), SkillModelError> {
    if expected != actual {
        return Err(SkillModelError::DimensionMismatch {
            expected: format!("{name} of shape {expected:?}"),
            actual: format!("{actual:?}"),
        });
    }
    Ok(())
}

/// `(s · a) / ||a|| - ||a||`
#[pyfunction]
pub fn embedding_distance(
    student_embedding: PyReadonlyArray1<f64>,
    module_embedding: PyReadonlyArray1<f64>,
) -> PyResult<f64> {
    let s = student_embedding.as_array();
    let a = module_embedding.as_array();
    check_len("module_embedding", s.len(), a.len())?;
    Ok(distance(s, a))
}

/// Pass probabilities for gathered rows of an embedding model.
///
/// - student_embeddings: (n, d) student positions at each row's timestep
/// - assessment_embeddings: (n, d)
/// - student_biases, assessment_biases: (n,)
#[pyfunction]
#[pyo3(signature = (student_embeddings, assessment_embeddings, student_biases, assessment_biases))]
pub fn embedding_pass_likelihoods<'py>(
    py: Python<'py>,
    student_embeddings: PyReadonlyArray2<f64>,
    assessment_embeddings: PyReadonlyArray2<f64>,
    student_biases: PyReadonlyArray1<f64>,
    assessment_biases: PyReadonlyArray1<f64>,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let students = student_embeddings.as_array().to_owned();
    let assessments = assessment_embeddings.as_array().to_owned();
    let sb = student_biases.as_array().to_owned();
    let ab = assessment_biases.as_array().to_owned();
    let n = students.nrows();
    check_shape("assessment_embeddings", students.dim(), assessments.dim())?;
    check_len("student_biases", n, sb.len())?;
    check_len("assessment_biases", n, ab.len())?;

    let result: Array1<f64> = py.detach(|| {
        (0..n)
            .into_par_iter()
            .map(|i| {
                let delta = distance(students.row(i), assessments.row(i)) + sb[i] + ab[i];
                logistic_pass_probability(delta)
            })
            .collect::<Vec<f64>>()
            .into()
    });
    Ok(result.to_pyarray(py))
}

/// `sigmoid(s · a + offset)` per gathered row.
#[pyfunction]
pub fn mirt_pass_likelihoods<'py>(
    py: Python<'py>,
    student_factors: PyReadonlyArray2<f64>,
    assessment_factors: PyReadonlyArray2<f64>,
    assessment_offsets: PyReadonlyArray1<f64>,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let students = student_factors.as_array().to_owned();
    let assessments = assessment_factors.as_array().to_owned();
    let offsets = assessment_offsets.as_array().to_owned();
    let n = students.nrows();
    check_shape("assessment_factors", students.dim(), assessments.dim())?;
    check_len("assessment_offsets", n, offsets.len())?;

    let result: Array1<f64> = py.detach(|| {
        (0..n)
            .into_par_iter()
            .map(|i| log_sigmoid(students.row(i).dot(&assessments.row(i)) + offsets[i]).exp())
            .collect::<Vec<f64>>()
            .into()
    });
    Ok(result.to_pyarray(py))
}

/// `(passes + 1) / (trials + 2)` per entity.
#[pyfunction]
pub fn laplace_smoothed_pass_rates<'py>(
    py: Python<'py>,
    passes: PyReadonlyArray1<i64>,
    trials: PyReadonlyArray1<i64>,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let passes = passes.as_array();
    let trials = trials.as_array();
    check_len("trials", passes.len(), trials.len())?;

    let mut rates = Array1::zeros(passes.len());
    for (i, (&p, &t)) in passes.iter().zip(trials.iter()).enumerate() {
        if p < 0 || t < p {
            return Err(SkillModelError::invalid_config(
                "passes",
                format!("{p} of {t}"),
                "need 0 <= passes <= trials",
            )
            .into());
        }
        rates[i] = laplace_smoothed_pass_rate(Some(OutcomeCounts {
            passes: p as usize,
            trials: t as usize,
        }));
    }
    Ok(rates.to_pyarray(py))
}

fn feature_columns<L: FeatureLayout>(
    layout: L,
    student_idxes: ArrayView1<i64>,
    assessment_idxes: ArrayView1<i64>,
    num_students: usize,
    num_assessments: usize,
) -> Result<Array2<i64>, SkillModelError> {
    check_len("assessment_idxes", student_idxes.len(), assessment_idxes.len())?;
    let mut columns = Array2::zeros((student_idxes.len(), 2));
    for (i, (&s, &a)) in student_idxes.iter().zip(assessment_idxes.iter()).enumerate() {
        if s < 0 || s as usize >= num_students {
            return Err(SkillModelError::UnknownStudent(s.to_string()));
        }
        if a < 0 || a as usize >= num_assessments {
            return Err(SkillModelError::UnknownAssessment(a.to_string()));
        }
        let cols = layout.feature_columns(s as usize, a as usize, num_students, num_assessments);
        columns[[i, 0]] = cols[0] as i64;
        columns[[i, 1]] = cols[1] as i64;
    }
    Ok(columns)
}

/// One-hot column pairs of the one-parameter layout, shape (n, 2).
#[pyfunction]
pub fn onepl_feature_columns<'py>(
    py: Python<'py>,
    student_idxes: PyReadonlyArray1<i64>,
    assessment_idxes: PyReadonlyArray1<i64>,
    num_students: usize,
    num_assessments: usize,
) -> PyResult<Bound<'py, PyArray2<i64>>> {
    let columns = feature_columns(
        OneParameterLayout,
        student_idxes.as_array(),
        assessment_idxes.as_array(),
        num_students,
        num_assessments,
    )?;
    Ok(columns.to_pyarray(py))
}

/// One-hot column pairs of the two-parameter layout, shape (n, 2).
#[pyfunction]
pub fn twopl_feature_columns<'py>(
    py: Python<'py>,
    student_idxes: PyReadonlyArray1<i64>,
    assessment_idxes: PyReadonlyArray1<i64>,
    num_students: usize,
    num_assessments: usize,
) -> PyResult<Bound<'py, PyArray2<i64>>> {
    let columns = feature_columns(
        TwoParameterLayout,
        student_idxes.as_array(),
        assessment_idxes.as_array(),
        num_students,
        num_assessments,
    )?;
    Ok(columns.to_pyarray(py))
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(embedding_distance, m)?)?;
    m.add_function(wrap_pyfunction!(embedding_pass_likelihoods, m)?)?;
    m.add_function(wrap_pyfunction!(mirt_pass_likelihoods, m)?)?;
    m.add_function(wrap_pyfunction!(laplace_smoothed_pass_rates, m)?)?;
    m.add_function(wrap_pyfunction!(onepl_feature_columns, m)?)?;
    m.add_function(wrap_pyfunction!(twopl_feature_columns, m)?)?;
    Ok(())
}
