// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

/*!
Experiment metadata exported from the connectivity search for one target
structure (`<target>.csv`).

Only three columns matter to curation: `id`, `structure-id` (the primary
injection structure) and `injection-structures`, a list of every structure the
tracer reached, serialised in hash-rocket notation:

```text
[{"abbreviation"=>"VISp", "color"=>"08858C", "id"=>385, "name"=>"Primary visual area"}]
```
*/

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::warn;

use crate::error::{AtlasError, AtlasResult};
use crate::types::{ExperimentId, StructureId};

/// A structure listed in an experiment's `injection-structures`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionStructure {
    pub id: StructureId,
    #[serde(default)]
    pub abbreviation: String,
    #[serde(default)]
    pub name: String,
}

/// One metadata row
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentRecord {
    pub id: ExperimentId,
    /// Primary injection structure
    pub structure_id: StructureId,
    pub injection_structures: Vec<InjectionStructure>,
    /// Parse error of the `injection-structures` cell; the list is empty then
    pub injection_error: Option<String>,
}

impl ExperimentRecord {
    pub fn new(id: ExperimentId, structure_id: StructureId) -> Self {
        Self {
            id,
            structure_id,
            injection_structures: Vec::new(),
            injection_error: None,
        }
    }

    /// Record whose `injection-structures` cell could not be read
    pub fn with_injection_error(mut self, error: impl Into<String>) -> Self {
        self.injection_structures.clear();
        self.injection_error = Some(error.into());
        self
    }

    pub fn with_injection_structures(mut self, ids: &[StructureId]) -> Self {
        self.injection_structures = ids
            .iter()
            .map(|&id| InjectionStructure {
                id,
                abbreviation: String::new(),
                name: String::new(),
            })
            .collect();
        self
    }

    /// Whether the tracer reached `structure_id`
    ///
    /// # Errors
    /// * `AtlasError::Metadata` - the `injection-structures` cell was malformed
    pub fn injects_into(&self, structure_id: StructureId) -> AtlasResult<bool> {
        if let Some(error) = &self.injection_error {
            return Err(AtlasError::Metadata(format!("experiment {}: {}", self.id, error)));
        }
        Ok(self.injection_structures.iter().any(|s| s.id == structure_id))
    }
}

/// Parse the hash-rocket `injection-structures` cell
pub fn parse_injection_structures(raw: &str) -> AtlasResult<Vec<InjectionStructure>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw.replace("=>", ":"))
        .map_err(|e| AtlasError::Metadata(format!("injection-structures '{}': {}", raw, e)))
}

/// A metadata line that could not be turned into a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub line: u64,
    pub reason: String,
}

/// Experiment metadata table in file order
#[derive(Debug, Clone, Default)]
pub struct ExperimentMetadata {
    records: Vec<ExperimentRecord>,
    by_id: AHashMap<ExperimentId, usize>,
    rejected: Vec<RejectedRow>,
}

impl ExperimentMetadata {
    /// Build from records; experiment ids must be unique
    pub fn from_records(records: Vec<ExperimentRecord>) -> AtlasResult<Self> {
        let mut by_id = AHashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if by_id.insert(record.id, position).is_some() {
                return Err(AtlasError::Metadata(format!(
                    "experiment {} listed more than once",
                    record.id
                )));
            }
        }
        Ok(Self {
            records,
            by_id,
            rejected: Vec::new(),
        })
    }

    pub fn read_csv(path: &Path) -> AtlasResult<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Parse a metadata export
    ///
    /// Rows without a usable `id` or `structure-id` are skipped and listed in
    /// [`rejected`](Self::rejected). A malformed `injection-structures` cell
    /// only marks its record; the stage reading it reports the experiment.
    pub fn from_reader<R: Read>(reader: R) -> AtlasResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| AtlasError::Metadata(format!("missing column '{}'", name)))
        };
        let id_col = column("id")?;
        let structure_col = column("structure-id")?;
        let injection_col = column("injection-structures")?;

        let mut records = Vec::new();
        let mut rejected = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let field = |col: usize| record.get(col).unwrap_or("").trim();

            let Ok(id) = field(id_col).parse::<ExperimentId>() else {
                rejected.push(RejectedRow {
                    line,
                    reason: format!("invalid experiment id '{}'", field(id_col)),
                });
                continue;
            };
            let Ok(structure_id) = field(structure_col).parse::<StructureId>() else {
                rejected.push(RejectedRow {
                    line,
                    reason: format!("experiment {}: invalid structure-id '{}'", id, field(structure_col)),
                });
                continue;
            };

            let parsed = ExperimentRecord::new(id, structure_id);
            records.push(match parse_injection_structures(field(injection_col)) {
                Ok(structures) => ExperimentRecord {
                    injection_structures: structures,
                    ..parsed
                },
                Err(e) => {
                    warn!(target: "tractmap-atlas", "Experiment {}: unreadable injection-structures", id);
                    parsed.with_injection_error(e.to_string())
                }
            });
        }

        for row in &rejected {
            warn!(target: "tractmap-atlas", "Metadata line {} skipped: {}", row.line, row.reason);
        }

        let mut metadata = Self::from_records(records)?;
        metadata.rejected = rejected;
        Ok(metadata)
    }

    pub fn records(&self) -> &[ExperimentRecord] {
        &self.records
    }

    pub fn get(&self, id: ExperimentId) -> Option<&ExperimentRecord> {
        self.by_id.get(&id).map(|&position| &self.records[position])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Lines skipped while reading, in file order
    pub fn rejected(&self) -> &[RejectedRow] {
        &self.rejected
    }
}
