//! Interaction histories and their id→index lookups.
//!
//! Models only read a history. [`IndexedHistory`] is a simple in-memory
//! implementation; anything that can answer the same lookups can stand in.

use std::collections::HashMap;

use crate::error::{Result, SkillModelError};
use crate::interaction::{Interaction, ModuleType};

/// Read-only view of an interaction history.
pub trait InteractionHistory {
    fn num_students(&self) -> usize;
    fn num_assessments(&self) -> usize;
    fn num_lessons(&self) -> usize;

    /// Number of timesteps; student embeddings are allocated this deep.
    fn duration(&self) -> usize;

    fn idx_of_student_id(&self, id: &str) -> Result<usize>;
    fn idx_of_assessment_id(&self, id: &str) -> Result<usize>;
    fn idx_of_lesson_id(&self, id: &str) -> Result<usize>;

    fn iter_assessments(&self) -> Box<dyn Iterator<Item = &str> + '_>;
    fn iter_lessons(&self) -> Box<dyn Iterator<Item = &str> + '_>;

    /// Raw rows, in recorded order.
    fn interactions(&self) -> &[Interaction];
}

/// Dense index over a set of ids, in first-appearance order.
#[derive(Debug, Clone, Default)]
pub(crate) struct IdIndex {
    ids: Vec<String>,
    idx_of_id: HashMap<String, usize>,
}

impl IdIndex {
    pub(crate) fn from_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut index = IdIndex::default();
        for id in ids {
            index.insert(id);
        }
        index
    }

    pub(crate) fn insert(&mut self, id: &str) -> usize {
        if let Some(&idx) = self.idx_of_id.get(id) {
            return idx;
        }
        let idx = self.ids.len();
        self.ids.push(id.to_string());
        self.idx_of_id.insert(id.to_string(), idx);
        idx
    }

    #[inline]
    pub(crate) fn get(&self, id: &str) -> Option<usize> {
        self.idx_of_id.get(id).copied()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

/// In-memory history indexing students, assessments and lessons.
#[derive(Debug, Clone, Default)]
pub struct IndexedHistory {
    data: Vec<Interaction>,
    students: IdIndex,
    assessments: IdIndex,
    lessons: IdIndex,
    duration: usize,
}

impl IndexedHistory {
    pub fn new(data: Vec<Interaction>) -> Self {
        let mut students = IdIndex::default();
        let mut assessments = IdIndex::default();
        let mut lessons = IdIndex::default();
        let mut duration = 0;

        for ixn in &data {
            students.insert(&ixn.student_id);
            match ixn.module_type {
                ModuleType::Assessment => assessments.insert(&ixn.module_id),
                ModuleType::Lesson => lessons.insert(&ixn.module_id),
            };
            duration = duration.max(ixn.timestep + 1);
        }

        IndexedHistory {
            data,
            students,
            assessments,
            lessons,
            duration,
        }
    }

    /// Assessment rows only, in recorded order.
    pub fn assessment_interactions(&self) -> impl Iterator<Item = &Interaction> {
        self.data.iter().filter(|ixn| ixn.is_assessment())
    }

    pub fn iter_students(&self) -> impl Iterator<Item = &str> {
        self.students.iter()
    }
}

impl InteractionHistory for IndexedHistory {
    fn num_students(&self) -> usize {
        self.students.len()
    }

    fn num_assessments(&self) -> usize {
        self.assessments.len()
    }

    fn num_lessons(&self) -> usize {
        self.lessons.len()
    }

    fn duration(&self) -> usize {
        self.duration
    }

    fn idx_of_student_id(&self, id: &str) -> Result<usize> {
        self.students
            .get(id)
            .ok_or_else(|| SkillModelError::UnknownStudent(id.to_string()))
    }

    fn idx_of_assessment_id(&self, id: &str) -> Result<usize> {
        self.assessments
            .get(id)
            .ok_or_else(|| SkillModelError::UnknownAssessment(id.to_string()))
    }

    fn idx_of_lesson_id(&self, id: &str) -> Result<usize> {
        self.lessons
            .get(id)
            .ok_or_else(|| SkillModelError::UnknownLesson(id.to_string()))
    }

    fn iter_assessments(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.assessments.iter())
    }

    fn iter_lessons(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.lessons.iter())
    }

    fn interactions(&self) -> &[Interaction] {
        &self.data
    }
}
