// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

/*!
Local atlas export served through [`AtlasQueryService`].

Directory layout:
```text
<archive_dir>/
  ├── structures.csv               (id, acronym, name, structure_id_path)
  ├── structure_sets/<set_id>.csv  (id)
  └── unionizes/<experiment>.csv   (unionize rows, both injection and projection)
```
*/

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{AtlasError, AtlasResult};
use crate::query::{AtlasQueryService, StructureCriteria, StructureInfo, UnionizeQuery};
use crate::types::{ExperimentId, StructureId};
use crate::unionize::{read_rows, UnionizeRow};

const STRUCTURES_FILE: &str = "structures.csv";
const STRUCTURE_SETS_DIR: &str = "structure_sets";
const UNIONIZES_DIR: &str = "unionizes";

#[derive(Debug, Deserialize)]
struct SetMember {
    id: StructureId,
}

/// In-memory atlas
#[derive(Debug, Clone, Default)]
pub struct AtlasArchive {
    structures: BTreeMap<StructureId, StructureInfo>,
    structure_sets: BTreeMap<u32, Vec<StructureId>>,
    unionizes: BTreeMap<ExperimentId, Vec<UnionizeRow>>,
}

impl AtlasArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_structure(mut self, info: StructureInfo) -> Self {
        self.insert_structure(info);
        self
    }

    pub fn with_structure_set(mut self, set_id: u32, members: Vec<StructureId>) -> Self {
        self.insert_structure_set(set_id, members);
        self
    }

    pub fn with_rows(mut self, experiment_id: ExperimentId, rows: Vec<UnionizeRow>) -> Self {
        self.insert_rows(experiment_id, rows);
        self
    }

    pub fn insert_structure(&mut self, info: StructureInfo) {
        self.structures.insert(info.id, info);
    }

    pub fn insert_structure_set(&mut self, set_id: u32, members: Vec<StructureId>) {
        self.structure_sets.insert(set_id, members);
    }

    /// Append rows to an experiment
    pub fn insert_rows(&mut self, experiment_id: ExperimentId, rows: Vec<UnionizeRow>) {
        self.unionizes.entry(experiment_id).or_default().extend(rows);
    }

    pub fn experiment_count(&self) -> usize {
        self.unionizes.len()
    }

    /// Load an export directory
    ///
    /// `structures.csv` is required; the two subdirectories are optional.
    pub fn load_dir(dir: &Path) -> AtlasResult<Self> {
        let mut archive = Self::new();

        let mut reader = csv::Reader::from_path(dir.join(STRUCTURES_FILE))?;
        for info in reader.deserialize::<StructureInfo>() {
            archive.insert_structure(info?);
        }

        let sets_dir = dir.join(STRUCTURE_SETS_DIR);
        if sets_dir.is_dir() {
            for (set_id, path) in numbered_files(&sets_dir)? {
                let mut reader = csv::Reader::from_path(&path)?;
                let members = reader
                    .deserialize::<SetMember>()
                    .map(|member| member.map(|m| m.id))
                    .collect::<Result<Vec<_>, _>>()?;
                let set_id = u32::try_from(set_id).map_err(|_| {
                    AtlasError::Format(format!("structure set id out of range: {}", path.display()))
                })?;
                archive.insert_structure_set(set_id, members);
            }
        }

        let unionizes_dir = dir.join(UNIONIZES_DIR);
        if unionizes_dir.is_dir() {
            for (experiment_id, path) in numbered_files(&unionizes_dir)? {
                let rows = read_rows(std::fs::File::open(&path)?)?;
                debug!(target: "tractmap-atlas", "Loaded {} rows for experiment {}", rows.len(), experiment_id);
                archive.insert_rows(experiment_id, rows);
            }
        }

        info!(
            target: "tractmap-atlas",
            "Loaded atlas archive from {}: {} structures, {} structure sets, {} experiments",
            dir.display(),
            archive.structures.len(),
            archive.structure_sets.len(),
            archive.unionizes.len()
        );
        Ok(archive)
    }
}

/// `<number>.csv` files in a directory, sorted by number
fn numbered_files(dir: &Path) -> AtlasResult<Vec<(u64, std::path::PathBuf)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let number = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u64>().ok());
        match number {
            Some(number) => files.push((number, path)),
            None => debug!(target: "tractmap-atlas", "Skipping {}", path.display()),
        }
    }
    files.sort();
    Ok(files)
}

impl AtlasQueryService for AtlasArchive {
    fn unionized_rows(&self, query: &UnionizeQuery) -> AtlasResult<Vec<UnionizeRow>> {
        let Some(rows) = self.unionizes.get(&query.experiment_id) else {
            return Ok(Vec::new());
        };
        let matching = rows
            .iter()
            .filter(|row| row.is_injection == query.is_injection)
            .filter(|row| query.structure_id.map_or(true, |id| row.structure_id == id))
            .skip(query.start_row);
        Ok(match query.num_rows {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        })
    }

    fn structure(&self, criteria: &StructureCriteria) -> AtlasResult<StructureInfo> {
        let found = match criteria {
            StructureCriteria::Id(id) => self.structures.get(id),
            StructureCriteria::Acronym(acronym) => {
                self.structures.values().find(|s| &s.acronym == acronym)
            }
        };
        found
            .cloned()
            .ok_or_else(|| AtlasError::StructureNotFound(criteria.to_string()))
    }

    fn structure_set(&self, structure_set_id: u32) -> AtlasResult<Vec<StructureInfo>> {
        let members = self
            .structure_sets
            .get(&structure_set_id)
            .ok_or(AtlasError::StructureSetNotFound(structure_set_id))?;
        members
            .iter()
            .map(|&id| self.structure(&StructureCriteria::Id(id)))
            .collect()
    }
}
