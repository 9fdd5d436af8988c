// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

/*!
Values threaded between the filter stages.

Up to injection-volume thresholding the pipeline carries [`UnionizedData`]: a
registry plus the full measurement table of every experiment in it. The
hemisphere-projection separation turns that into a [`HemisphereFork`] of
trimmed [`ProjectionRecord`]s, and both branches are filtered independently
from then on.
*/

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tractmap_atlas::{ExperimentId, Hemisphere, MeasurementTable, RegionId};

use crate::registry::ExperimentRegistry;

/// Registry plus the full measurement table of each listed experiment
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnionizedData {
    registry: ExperimentRegistry,
    tables: BTreeMap<ExperimentId, Arc<MeasurementTable>>,
}

impl UnionizedData {
    /// Tables of experiments not listed in `registry` are dropped
    pub fn new(registry: ExperimentRegistry, mut tables: BTreeMap<ExperimentId, Arc<MeasurementTable>>) -> Self {
        let listed: BTreeSet<ExperimentId> = registry.pairs().map(|(_, e)| e).collect();
        tables.retain(|experiment, _| listed.contains(experiment));
        Self { registry, tables }
    }

    pub fn registry(&self) -> &ExperimentRegistry {
        &self.registry
    }

    pub fn table(&self, experiment: ExperimentId) -> Option<&Arc<MeasurementTable>> {
        self.tables.get(&experiment)
    }

    /// New value restricted to the experiments for which `keep` is true
    pub fn retain<F>(&self, keep: F) -> Self
    where
        F: FnMut(RegionId, ExperimentId) -> bool,
    {
        Self::new(self.registry.retain(keep), self.tables.clone())
    }
}

/// Which branch of the fork
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProjectionSide {
    Ipsilateral,
    Contralateral,
}

impl ProjectionSide {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectionSide::Ipsilateral => "ipsilateral",
            ProjectionSide::Contralateral => "contralateral",
        }
    }
}

impl std::fmt::Display for ProjectionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trimmed measurement for one experiment on one side of the fork
///
/// Coordinates come from the injection region's row and metrics from the
/// target structure's row, both in `hemisphere`. There is exactly one value
/// per metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRecord {
    pub experiment_id: ExperimentId,
    pub hemisphere: Hemisphere,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub metrics: BTreeMap<String, f64>,
}

impl ProjectionRecord {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

/// One branch: every record was measured in `hemisphere`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkData {
    pub hemisphere: Hemisphere,
    pub regions: BTreeMap<RegionId, Vec<ProjectionRecord>>,
}

impl ForkData {
    /// Fork with an empty record list for each region
    pub fn empty<I: IntoIterator<Item = RegionId>>(hemisphere: Hemisphere, regions: I) -> Self {
        Self {
            hemisphere,
            regions: regions.into_iter().map(|region| (region, Vec::new())).collect(),
        }
    }

    pub fn experiment_count(&self) -> usize {
        self.regions.values().map(Vec::len).sum()
    }

    /// Experiment ids per region, as a registry snapshot
    pub fn registry(&self) -> ExperimentRegistry {
        ExperimentRegistry::from_map(
            self.regions
                .iter()
                .map(|(&region, records)| (region, records.iter().map(|r| r.experiment_id).collect()))
                .collect(),
        )
    }
}

/// Ipsilateral and contralateral branches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HemisphereFork {
    pub ipsilateral: ForkData,
    pub contralateral: ForkData,
}

impl HemisphereFork {
    pub fn side(&self, side: ProjectionSide) -> &ForkData {
        match side {
            ProjectionSide::Ipsilateral => &self.ipsilateral,
            ProjectionSide::Contralateral => &self.contralateral,
        }
    }

    pub fn sides(&self) -> [(ProjectionSide, &ForkData); 2] {
        [
            (ProjectionSide::Ipsilateral, &self.ipsilateral),
            (ProjectionSide::Contralateral, &self.contralateral),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tractmap_atlas::UnionizeRow;

    #[test]
    fn test_retain_drops_tables() {
        let registry = ExperimentRegistry::from_map(BTreeMap::from([(100, vec![1, 2])]));
        let tables = [1, 2]
            .into_iter()
            .map(|e| {
                let table = MeasurementTable::from_rows(e, vec![UnionizeRow::new(100, Hemisphere::Left)]).unwrap();
                (e, Arc::new(table))
            })
            .collect();
        let data = UnionizedData::new(registry, tables);

        let filtered = data.retain(|_, e| e == 2);
        assert!(filtered.table(1).is_none());
        assert!(filtered.table(2).is_some());
        assert!(data.table(1).is_some());
    }

    #[test]
    fn test_fork_registry_snapshot() {
        let mut fork = ForkData::empty(Hemisphere::Right, [100, 200]);
        fork.regions.get_mut(&100).unwrap().push(ProjectionRecord {
            experiment_id: 9,
            hemisphere: Hemisphere::Right,
            x: 1.0,
            y: 2.0,
            z: 3.0,
            metrics: BTreeMap::new(),
        });
        let registry = fork.registry();
        assert_eq!(registry.experiments(100), &[9]);
        assert!(registry.experiments(200).is_empty());
        assert_eq!(fork.experiment_count(), 1);
    }
}
