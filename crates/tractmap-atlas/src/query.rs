// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

/*!
Atlas query boundary.

The pipeline never talks to a remote session directly. Everything it needs from
the atlas goes through an [`AtlasQueryService`] handed to the measurement store
and the pipeline driver at construction time.
*/

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, AtlasResult};
use crate::types::{ExperimentId, StructureId};
use crate::unionize::UnionizeRow;

// ============================================================================
// QUERIES
// ============================================================================

/// Request for the unionized rows of one experiment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnionizeQuery {
    pub experiment_id: ExperimentId,
    pub is_injection: bool,
    /// Restrict rows to one structure
    pub structure_id: Option<StructureId>,
    pub start_row: usize,
    /// `None` returns every remaining row
    pub num_rows: Option<usize>,
}

impl UnionizeQuery {
    pub fn new(experiment_id: ExperimentId, is_injection: bool) -> Self {
        Self {
            experiment_id,
            is_injection,
            structure_id: None,
            start_row: 0,
            num_rows: None,
        }
    }

    pub fn with_structure(mut self, structure_id: StructureId) -> Self {
        self.structure_id = Some(structure_id);
        self
    }

    pub fn with_rows(mut self, start_row: usize, num_rows: Option<usize>) -> Self {
        self.start_row = start_row;
        self.num_rows = num_rows;
        self
    }

    /// Wire form of the row criteria
    pub fn criteria(&self) -> String {
        format!(
            "[is_injection$eq{}][section_data_set_id$eq{}]",
            self.is_injection, self.experiment_id
        )
    }

    /// Wire form of the structure include clause, if filtered
    pub fn include(&self) -> Option<String> {
        self.structure_id
            .map(|id| format!("structure[id$eq{}]", id))
    }
}

/// Structure lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StructureCriteria {
    Id(StructureId),
    Acronym(String),
}

impl StructureCriteria {
    pub fn criteria(&self) -> String {
        match self {
            StructureCriteria::Id(id) => format!("structure[id$eq{}]", id),
            StructureCriteria::Acronym(acronym) => format!("structure[acronym$eq'{}']", acronym),
        }
    }
}

impl std::fmt::Display for StructureCriteria {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructureCriteria::Id(id) => write!(f, "id {}", id),
            StructureCriteria::Acronym(acronym) => write!(f, "acronym '{}'", acronym),
        }
    }
}

/// Ontology entry for one structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureInfo {
    pub id: StructureId,
    pub acronym: String,
    pub name: String,
    /// Ancestor chain including the structure itself, e.g. `/997/8/567/`
    pub structure_id_path: String,
}

impl StructureInfo {
    /// Ids along `structure_id_path`, root first
    pub fn path_ids(&self) -> AtlasResult<Vec<StructureId>> {
        self.structure_id_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                segment.parse::<StructureId>().map_err(|_| {
                    AtlasError::Format(format!(
                        "structure {}: invalid id path '{}'",
                        self.id, self.structure_id_path
                    ))
                })
            })
            .collect()
    }
}

// ============================================================================
// SERVICE
// ============================================================================

/// Source of atlas rows and ontology lookups
pub trait AtlasQueryService: Send + Sync {
    /// Rows matching `query`; an empty vector means the atlas holds nothing
    fn unionized_rows(&self, query: &UnionizeQuery) -> AtlasResult<Vec<UnionizeRow>>;

    /// # Errors
    /// * `AtlasError::StructureNotFound` - nothing matches `criteria`
    fn structure(&self, criteria: &StructureCriteria) -> AtlasResult<StructureInfo>;

    /// Structures in a curated structure set, in set order
    ///
    /// # Errors
    /// * `AtlasError::StructureSetNotFound` - unknown set id
    fn structure_set(&self, structure_set_id: u32) -> AtlasResult<Vec<StructureInfo>>;
}

/// Acronym path of a structure, e.g. `root/grey/CH`
pub fn structure_path(service: &dyn AtlasQueryService, info: &StructureInfo) -> AtlasResult<String> {
    let mut acronyms = Vec::new();
    for id in info.path_ids()? {
        if id == info.id {
            acronyms.push(info.acronym.clone());
        } else {
            acronyms.push(service.structure(&StructureCriteria::Id(id))?.acronym);
        }
    }
    Ok(acronyms.join("/"))
}
