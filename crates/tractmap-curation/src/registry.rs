// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

/*!
Experiment registry: region id → ordered experiment ids.

A registry is a value. Filtering returns a new registry and leaves the input
untouched, so every stage's snapshot in the audit log stays exact. Regions
are fixed when the registry is built and are never dropped, even when their
experiment list becomes empty.
*/

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tractmap_atlas::{ExperimentId, ExperimentMetadata, RegionId};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExperimentRegistry {
    regions: BTreeMap<RegionId, Vec<ExperimentId>>,
}

impl ExperimentRegistry {
    /// Group metadata rows by injection structure, keeping metadata order
    ///
    /// Every region in `regions` gets an entry; rows whose structure is not
    /// in `regions` are ignored (see [`unmatched_experiments`]).
    pub fn build(metadata: &ExperimentMetadata, regions: &[RegionId]) -> Self {
        let mut map: BTreeMap<RegionId, Vec<ExperimentId>> =
            regions.iter().map(|&region| (region, Vec::new())).collect();
        for record in metadata.records() {
            if let Some(experiments) = map.get_mut(&record.structure_id) {
                experiments.push(record.id);
            }
        }
        Self::from_map(map)
    }

    /// Build from an explicit mapping, dropping repeated ids within a region
    pub fn from_map(map: BTreeMap<RegionId, Vec<ExperimentId>>) -> Self {
        let regions = map
            .into_iter()
            .map(|(region, experiments)| {
                let mut seen = BTreeSet::new();
                let unique = experiments.into_iter().filter(|e| seen.insert(*e)).collect();
                (region, unique)
            })
            .collect();
        Self { regions }
    }

    /// New registry holding only the experiments for which `keep` is true
    pub fn retain<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(RegionId, ExperimentId) -> bool,
    {
        let regions = self
            .regions
            .iter()
            .map(|(&region, experiments)| {
                let kept = experiments
                    .iter()
                    .copied()
                    .filter(|&experiment| keep(region, experiment))
                    .collect();
                (region, kept)
            })
            .collect();
        Self { regions }
    }

    /// Experiments of `before` missing from `self`, in `before`'s order
    pub fn removed_since(&self, before: &Self) -> Vec<ExperimentId> {
        before
            .pairs()
            .filter(|&(region, experiment)| !self.contains(region, experiment))
            .map(|(_, experiment)| experiment)
            .collect()
    }

    pub fn contains(&self, region: RegionId, experiment: ExperimentId) -> bool {
        self.regions
            .get(&region)
            .map_or(false, |experiments| experiments.contains(&experiment))
    }

    pub fn experiments(&self, region: RegionId) -> &[ExperimentId] {
        self.regions.get(&region).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn regions(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.regions.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionId, &[ExperimentId])> + '_ {
        self.regions
            .iter()
            .map(|(&region, experiments)| (region, experiments.as_slice()))
    }

    /// Every `(region, experiment)` pair in registry order
    pub fn pairs(&self) -> impl Iterator<Item = (RegionId, ExperimentId)> + '_ {
        self.regions.iter().flat_map(|(&region, experiments)| {
            experiments.iter().map(move |&experiment| (region, experiment))
        })
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn experiment_count(&self) -> usize {
        self.regions.values().map(Vec::len).sum()
    }

    pub fn as_map(&self) -> &BTreeMap<RegionId, Vec<ExperimentId>> {
        &self.regions
    }
}

/// Metadata experiments whose injection structure is outside `regions`
pub fn unmatched_experiments(metadata: &ExperimentMetadata, regions: &[RegionId]) -> Vec<ExperimentId> {
    let regions: BTreeSet<RegionId> = regions.iter().copied().collect();
    metadata
        .records()
        .iter()
        .filter(|record| !regions.contains(&record.structure_id))
        .map(|record| record.id)
        .collect()
}
