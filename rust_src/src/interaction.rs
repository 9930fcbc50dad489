//! Interaction records: a student attempting an assessment or completing a lesson.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillModelError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    Assessment,
    Lesson,
}

/// One row of an interaction history.
///
/// `outcome` is only present for assessment interactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub student_id: String,
    pub module_id: String,
    pub module_type: ModuleType,
    pub timestep: usize,
    #[serde(default)]
    pub outcome: Option<bool>,
}

impl Interaction {
    pub fn assessment(
        student_id: impl Into<String>,
        module_id: impl Into<String>,
        timestep: usize,
        outcome: bool,
    ) -> Self {
        Interaction {
            student_id: student_id.into(),
            module_id: module_id.into(),
            module_type: ModuleType::Assessment,
            timestep,
            outcome: Some(outcome),
        }
    }

    pub fn lesson(
        student_id: impl Into<String>,
        module_id: impl Into<String>,
        timestep: usize,
    ) -> Self {
        Interaction {
            student_id: student_id.into(),
            module_id: module_id.into(),
            module_type: ModuleType::Lesson,
            timestep,
            outcome: None,
        }
    }

    #[inline]
    pub fn is_assessment(&self) -> bool {
        self.module_type == ModuleType::Assessment
    }

    /// Check the id fields every model reads. Empty ids count as absent.
    pub fn validate(&self) -> Result<()> {
        if self.student_id.is_empty() {
            return Err(SkillModelError::MissingField("student_id"));
        }
        if self.module_id.is_empty() {
            return Err(SkillModelError::MissingField("module_id"));
        }
        Ok(())
    }

    /// The outcome to score: `outcome_override` if given, else the stored one.
    pub fn effective_outcome(&self, outcome_override: Option<bool>) -> Result<bool> {
        outcome_override
            .or(self.outcome)
            .ok_or(SkillModelError::MissingField("outcome"))
    }
}

/// Assessment rows of `interactions`, in their original order.
pub fn assessment_rows(interactions: &[Interaction]) -> Vec<Interaction> {
    interactions
        .iter()
        .filter(|ixn| ixn.is_assessment())
        .cloned()
        .collect()
}
