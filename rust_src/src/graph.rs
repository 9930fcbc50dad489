//! Concept graphs: which concepts underlie which modules.
//!
//! The embedding model only asks the graph for module→concept edge lists,
//! which the fitter turns into graph-prior regularization terms.

use std::collections::HashMap;

use crate::error::{Result, SkillModelError};
use crate::history::IdIndex;

/// Module→concept edges as parallel index arrays.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConceptModuleEdges {
    /// Module index of each edge.
    pub module_idxes: Vec<usize>,
    /// Concept index of each edge.
    pub concept_idxes: Vec<usize>,
    /// Number of modules iterated.
    pub num_modules: usize,
    pub num_concepts: usize,
    /// For edge `k`, the number of concepts attached to `module_idxes[k]`.
    pub num_concepts_per_module: Vec<usize>,
}

impl ConceptModuleEdges {
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.module_idxes.len()
    }
}

/// Module→concept lookups. Must be shareable across prediction threads.
pub trait ConceptGraph: Send + Sync {
    fn num_concepts(&self) -> usize;

    fn idx_of_concept_id(&self, id: &str) -> Result<usize>;

    /// Edges for every module yielded by `modules`, indexed by `idx_of_module`.
    fn concept_module_edges(
        &self,
        modules: &mut dyn Iterator<Item = &str>,
        idx_of_module: &dyn Fn(&str) -> Result<usize>,
    ) -> Result<ConceptModuleEdges>;
}

/// In-memory module→concepts map.
#[derive(Debug, Clone, Default)]
pub struct ConceptMap {
    concepts: IdIndex,
    concepts_of_module: HashMap<String, Vec<usize>>,
}

impl ConceptMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `concept_id` to `module_id`, registering the concept if new.
    pub fn add_edge(&mut self, module_id: &str, concept_id: &str) {
        let concept_idx = self.concepts.insert(concept_id);
        let concepts = self
            .concepts_of_module
            .entry(module_id.to_string())
            .or_default();
        if !concepts.contains(&concept_idx) {
            concepts.push(concept_idx);
        }
    }

    pub fn with_edge(mut self, module_id: &str, concept_id: &str) -> Self {
        self.add_edge(module_id, concept_id);
        self
    }

    pub fn concepts_of_module(&self, module_id: &str) -> &[usize] {
        self.concepts_of_module
            .get(module_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl ConceptGraph for ConceptMap {
    fn num_concepts(&self) -> usize {
        self.concepts.len()
    }

    fn idx_of_concept_id(&self, id: &str) -> Result<usize> {
        self.concepts
            .get(id)
            .ok_or_else(|| SkillModelError::UnknownConcept(id.to_string()))
    }

    fn concept_module_edges(
        &self,
        modules: &mut dyn Iterator<Item = &str>,
        idx_of_module: &dyn Fn(&str) -> Result<usize>,
    ) -> Result<ConceptModuleEdges> {
        let mut edges = ConceptModuleEdges {
            num_concepts: self.num_concepts(),
            ..Default::default()
        };

        for module_id in modules {
            edges.num_modules += 1;
            let concepts = self.concepts_of_module(module_id);
            if concepts.is_empty() {
                continue;
            }
            let module_idx = idx_of_module(module_id)?;
            for &concept_idx in concepts {
                edges.module_idxes.push(module_idx);
                edges.concept_idxes.push(concept_idx);
                edges.num_concepts_per_module.push(concepts.len());
            }
        }

        Ok(edges)
    }
}
