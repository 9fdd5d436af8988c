// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

use tracing::debug;
use tractmap_atlas::{AtlasError, ExperimentId, Hemisphere, MeasurementStore, RegionId};

use super::{log_stage, removal_summary, ExperimentFailure, StageName, StageOutcome};
use crate::data::UnionizedData;
use crate::hemisphere::derive_hemisphere;

/// Injection volume at the experiment's own region, in its derived hemisphere
fn injection_volume(
    store: &MeasurementStore,
    region: RegionId,
    experiment: ExperimentId,
    midline_z: f64,
) -> Result<f64, AtlasError> {
    let table = store.fetch_or_load(region, experiment, true, Some(region))?;
    let hemisphere = derive_hemisphere(&table, region, midline_z);
    if hemisphere == Hemisphere::None {
        return Err(AtlasError::DataUnavailable { experiment_id: experiment });
    }
    Ok(table.require_row(region, hemisphere)?.volume)
}

/// Drop experiments whose injection volume is below `threshold`
pub fn threshold_injection_volume(
    data: &UnionizedData,
    store: &MeasurementStore,
    threshold: f64,
    midline_z: f64,
) -> StageOutcome<UnionizedData> {
    let stage = StageName::InjectionVolumeThresholded;
    let mut removed = Vec::new();
    let mut failures = Vec::new();

    let output = data.retain(|region, experiment| match injection_volume(store, region, experiment, midline_z) {
        Ok(volume) if volume >= threshold => true,
        Ok(volume) => {
            debug!(
                target: "tractmap-curation",
                "Experiment {} injection volume {} below {}",
                experiment, volume, threshold
            );
            removed.push(experiment);
            false
        }
        Err(e) => {
            failures.push(ExperimentFailure::from_atlas(region, experiment, &e));
            false
        }
    });

    let summary = removal_summary(
        &removed,
        &failures,
        data.registry().experiment_count(),
        output.registry().experiment_count(),
    );
    log_stage(stage, &summary, &removed, &failures);

    StageOutcome {
        stage,
        output,
        removed,
        failures,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::registry::ExperimentRegistry;
    use std::collections::BTreeMap;
    use tractmap_atlas::{AtlasArchive, HEMISPHERE_MIDLINE_Z};

    #[test]
    fn test_threshold_is_inclusive() {
        let archive = AtlasArchive::new()
            .with_rows(1, vec![injection(385, Hemisphere::Left, 0.25, 4000.0)])
            .with_rows(2, vec![injection(385, Hemisphere::Left, 0.1, 4000.0)])
            .with_rows(3, vec![injection(385, Hemisphere::Left, 0.7, 4000.0)]);
        let (_dir, store) = store(archive);
        let data = UnionizedData::new(
            ExperimentRegistry::from_map(BTreeMap::from([(385, vec![1, 2, 3])])),
            BTreeMap::new(),
        );

        let outcome = threshold_injection_volume(&data, &store, 0.25, HEMISPHERE_MIDLINE_Z);

        assert_eq!(outcome.output.registry().experiments(385), &[1, 3]);
        assert_eq!(outcome.removed, vec![2]);
    }

    #[test]
    fn test_volume_comes_from_derived_hemisphere_row() {
        // Peak in the bilateral row at z < midline: the left row's volume counts
        let archive = AtlasArchive::new().with_rows(
            1,
            vec![
                injection(385, Hemisphere::Left, 0.05, 4000.0),
                injection(385, Hemisphere::Both, 0.6, 4000.0),
            ],
        );
        let (_dir, store) = store(archive);
        let data = UnionizedData::new(
            ExperimentRegistry::from_map(BTreeMap::from([(385, vec![1])])),
            BTreeMap::new(),
        );

        let outcome = threshold_injection_volume(&data, &store, 0.1, HEMISPHERE_MIDLINE_Z);
        assert_eq!(outcome.removed, vec![1]);
    }

    #[test]
    fn test_missing_hemisphere_row_is_a_failure() {
        let archive = AtlasArchive::new().with_rows(1, vec![injection(385, Hemisphere::Both, 0.6, 9000.0)]);
        let (_dir, store) = store(archive);
        let data = UnionizedData::new(
            ExperimentRegistry::from_map(BTreeMap::from([(385, vec![1])])),
            BTreeMap::new(),
        );

        let outcome = threshold_injection_volume(&data, &store, 0.1, HEMISPHERE_MIDLINE_Z);
        assert!(outcome.removed.is_empty());
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.output.registry().experiments(385).is_empty());
    }
}
