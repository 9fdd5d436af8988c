// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use tracing::debug;
use tractmap_atlas::{AtlasResult, Hemisphere, MeasurementTable, RegionId, StructureId};

use super::{log_stage, ExperimentFailure, StageName, StageOutcome};
use crate::data::{ForkData, HemisphereFork, ProjectionRecord, UnionizedData};
use crate::error::{CurationError, CurationResult};

/// Metric names copied into each trimmed record
pub struct SeparationMetrics<'a> {
    /// Compared across hemispheres and used as the centroid weight
    pub primary: &'a str,
    /// Used by projection-volume thresholding
    pub thresholding: &'a str,
}

fn trimmed_record(
    table: &MeasurementTable,
    region: RegionId,
    target_structure_id: StructureId,
    hemisphere: Hemisphere,
    metrics: &SeparationMetrics<'_>,
) -> AtlasResult<ProjectionRecord> {
    let coordinates = table.require_row(region, hemisphere)?;
    let mut values = BTreeMap::new();
    for name in [metrics.primary, metrics.thresholding] {
        values.insert(name.to_string(), table.metric(target_structure_id, hemisphere, name)?);
    }
    Ok(ProjectionRecord {
        experiment_id: table.experiment_id(),
        hemisphere,
        x: coordinates.max_voxel_x,
        y: coordinates.max_voxel_y,
        z: coordinates.max_voxel_z,
        metrics: values,
    })
}

/// Ipsilateral flag and the trimmed record on that side
fn classify(
    table: &MeasurementTable,
    region: RegionId,
    target_structure_id: StructureId,
    target_hemisphere: Hemisphere,
    opposite: Hemisphere,
    metrics: &SeparationMetrics<'_>,
) -> AtlasResult<(bool, ProjectionRecord)> {
    let same = table.metric(target_structure_id, target_hemisphere, metrics.primary)?;
    let other = table.metric(target_structure_id, opposite, metrics.primary)?;
    let is_ipsilateral = same > other;
    let hemisphere = if is_ipsilateral { target_hemisphere } else { opposite };
    let record = trimmed_record(table, region, target_structure_id, hemisphere, metrics)?;
    Ok((is_ipsilateral, record))
}

/// Split experiments into ipsilateral and contralateral projections
///
/// An experiment is ipsilateral when the primary metric at the target is
/// strictly greater in `target_hemisphere` than in the opposite one. The
/// contralateral branch is measured in the opposite hemisphere.
///
/// # Errors
/// * `CurationError::InvalidData` - `target_hemisphere` is not left or right
pub fn separate_projection_hemispheres(
    data: &UnionizedData,
    target_structure_id: StructureId,
    target_hemisphere: Hemisphere,
    metrics: &SeparationMetrics<'_>,
) -> CurationResult<StageOutcome<HemisphereFork>> {
    let stage = StageName::ProjectionHemisphereSeparated;
    let opposite = target_hemisphere.opposite().ok_or_else(|| {
        CurationError::InvalidData(format!("cannot separate around hemisphere {}", target_hemisphere))
    })?;

    let regions = data.registry().regions();
    let mut ipsilateral = ForkData::empty(target_hemisphere, regions);
    let mut contralateral = ForkData::empty(opposite, data.registry().regions());
    let mut failures = Vec::new();

    for (region, experiment) in data.registry().pairs() {
        let Some(table) = data.table(experiment) else {
            failures.push(ExperimentFailure::new(region, experiment, "measurement table not loaded"));
            continue;
        };

        let classified = classify(table, region, target_structure_id, target_hemisphere, opposite, metrics);

        match classified {
            Ok((is_ipsilateral, record)) => {
                debug!(
                    target: "tractmap-curation",
                    "Experiment {} projects {}",
                    experiment,
                    if is_ipsilateral { "ipsilaterally" } else { "contralaterally" }
                );
                let fork = if is_ipsilateral { &mut ipsilateral } else { &mut contralateral };
                fork.regions.entry(region).or_default().push(record);
            }
            Err(e) => failures.push(ExperimentFailure::from_atlas(region, experiment, &e)),
        }
    }

    let mut summary = format!(
        "{} ipsilaterally projecting experiments, {} contralaterally projecting experiments",
        ipsilateral.experiment_count(),
        contralateral.experiment_count()
    );
    if !failures.is_empty() {
        let failed: Vec<_> = failures.iter().map(|f| f.experiment_id).collect();
        summary.push_str(&format!("; {} experiments failed: {:?}", failed.len(), failed));
    }
    log_stage(stage, &summary, &[], &failures);

    Ok(StageOutcome {
        stage,
        output: HemisphereFork {
            ipsilateral,
            contralateral,
        },
        removed: Vec::new(),
        failures,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::registry::ExperimentRegistry;
    use std::sync::Arc;
    use tractmap_atlas::UnionizeRow;

    const METRICS: SeparationMetrics<'static> = SeparationMetrics {
        primary: METRIC,
        thresholding: SECONDARY,
    };

    fn table(experiment: u64, rows: Vec<UnionizeRow>) -> (u64, Arc<MeasurementTable>) {
        (experiment, Arc::new(MeasurementTable::from_rows(experiment, rows).unwrap()))
    }

    fn data() -> UnionizedData {
        let registry = ExperimentRegistry::from_map(BTreeMap::from([(385, vec![1, 2, 3]), (409, vec![])]));
        let tables = BTreeMap::from([
            table(
                1,
                vec![
                    coordinates(385, Hemisphere::Left, 10.0, 20.0, 30.0),
                    coordinates(385, Hemisphere::Right, 11.0, 21.0, 31.0),
                    projection(TARGET, Hemisphere::Left, 0.8, 0.5),
                    projection(TARGET, Hemisphere::Right, 0.2, 0.4),
                ],
            ),
            table(
                2,
                vec![
                    coordinates(385, Hemisphere::Left, 10.0, 20.0, 30.0),
                    coordinates(385, Hemisphere::Right, 12.0, 22.0, 32.0),
                    projection(TARGET, Hemisphere::Left, 0.3, 0.5),
                    projection(TARGET, Hemisphere::Right, 0.3, 0.9),
                ],
            ),
            table(
                3,
                vec![
                    coordinates(385, Hemisphere::Left, 10.0, 20.0, 30.0),
                    projection(TARGET, Hemisphere::Left, 0.8, 0.5),
                ],
            ),
        ]);
        UnionizedData::new(registry, tables)
    }

    #[test]
    fn test_strictly_greater_is_ipsilateral() {
        let outcome = separate_projection_hemispheres(&data(), TARGET, Hemisphere::Left, &METRICS).unwrap();
        let fork = outcome.output;

        assert_eq!(fork.ipsilateral.hemisphere, Hemisphere::Left);
        assert_eq!(fork.contralateral.hemisphere, Hemisphere::Right);
        assert_eq!(fork.ipsilateral.registry().experiments(385), &[1]);
        // Equal values go contralateral
        assert_eq!(fork.contralateral.registry().experiments(385), &[2]);
        assert!(fork.ipsilateral.regions.contains_key(&409));
        assert!(fork.contralateral.regions.contains_key(&409));
    }

    #[test]
    fn test_records_hold_one_hemisphere_and_one_value_per_metric() {
        let fork = separate_projection_hemispheres(&data(), TARGET, Hemisphere::Left, &METRICS)
            .unwrap()
            .output;

        let ipsi = &fork.ipsilateral.regions[&385][0];
        assert_eq!(ipsi.hemisphere, Hemisphere::Left);
        assert_eq!((ipsi.x, ipsi.y, ipsi.z), (10.0, 20.0, 30.0));
        assert_eq!(ipsi.metrics.len(), 2);
        assert_eq!(ipsi.metric(METRIC), Some(0.8));
        assert_eq!(ipsi.metric(SECONDARY), Some(0.5));

        let contra = &fork.contralateral.regions[&385][0];
        assert_eq!(contra.hemisphere, Hemisphere::Right);
        assert_eq!((contra.x, contra.y, contra.z), (12.0, 22.0, 32.0));
        assert_eq!(contra.metrics.len(), 2);
        assert_eq!(contra.metric(SECONDARY), Some(0.9));
    }

    #[test]
    fn test_missing_opposite_row_is_a_failure() {
        let outcome = separate_projection_hemispheres(&data(), TARGET, Hemisphere::Left, &METRICS).unwrap();
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].experiment_id, 3);
        assert!(outcome.summary.contains("1 experiments failed: [3]"));
    }

    #[test]
    fn test_rejects_non_lateral_hemisphere() {
        let result = separate_projection_hemispheres(&data(), TARGET, Hemisphere::Both, &METRICS);
        assert!(matches!(result, Err(CurationError::InvalidData(_))));
    }
}
