// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::Arc;
use tractmap_atlas::{AtlasError, MeasurementStore, MeasurementTable, StructureId};

use super::{log_stage, removal_summary, ExperimentFailure, StageName, StageOutcome};
use crate::data::UnionizedData;
use crate::registry::ExperimentRegistry;

enum Verdict {
    Keep,
    Zero,
}

/// A zero `metric` in any target row means nothing was detected
fn check(table: &MeasurementTable, target_structure_id: StructureId, metric: &str) -> Result<Verdict, AtlasError> {
    for row in table.rows_for_structure(target_structure_id) {
        let value = row.metric(metric).ok_or_else(|| AtlasError::MissingMetric {
            experiment_id: table.experiment_id(),
            structure_id: target_structure_id,
            metric: metric.to_string(),
        })?;
        if value == 0.0 {
            return Ok(Verdict::Zero);
        }
    }
    Ok(Verdict::Keep)
}

/// Load full tables and drop experiments with a zero projection at the target
///
/// Experiments without any target row are kept.
pub fn zero_projection_qc(
    registry: &ExperimentRegistry,
    store: &MeasurementStore,
    target_structure_id: StructureId,
    metric: &str,
) -> StageOutcome<UnionizedData> {
    let stage = StageName::ZeroProjectionQc;
    let mut removed = Vec::new();
    let mut failures = Vec::new();
    let mut tables = BTreeMap::new();

    let kept = registry.retain(|region, experiment| {
        let verdict = store
            .fetch_or_load(region, experiment, false, None)
            .and_then(|table| Ok((check(&table, target_structure_id, metric)?, table)));
        match verdict {
            Ok((Verdict::Keep, table)) => {
                tables.insert(experiment, Arc::new(table));
                true
            }
            Ok((Verdict::Zero, _)) => {
                removed.push(experiment);
                false
            }
            Err(e) => {
                failures.push(ExperimentFailure::from_atlas(region, experiment, &e));
                false
            }
        }
    });

    let summary = removal_summary(
        &removed,
        &failures,
        registry.experiment_count(),
        kept.experiment_count(),
    );
    log_stage(stage, &summary, &removed, &failures);

    StageOutcome {
        stage,
        output: UnionizedData::new(kept, tables),
        removed,
        failures,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use tractmap_atlas::{AtlasArchive, Hemisphere};

    #[test]
    fn test_zero_in_any_hemisphere_removes() {
        let archive = AtlasArchive::new()
            .with_rows(
                1,
                vec![
                    projection(TARGET, Hemisphere::Left, 0.2, 0.1),
                    projection(TARGET, Hemisphere::Right, 0.3, 0.1),
                ],
            )
            .with_rows(
                2,
                vec![
                    projection(TARGET, Hemisphere::Left, 0.2, 0.1),
                    projection(TARGET, Hemisphere::Right, 0.0, 0.1),
                ],
            )
            .with_rows(3, vec![projection(555, Hemisphere::Left, 0.0, 0.0)]);
        let (_dir, store) = store(archive);
        let registry = ExperimentRegistry::from_map(BTreeMap::from([(385, vec![1, 2, 3])]));

        let outcome = zero_projection_qc(&registry, &store, TARGET, METRIC);

        assert_eq!(outcome.output.registry().experiments(385), &[1, 3]);
        assert_eq!(outcome.removed, vec![2]);
        assert!(outcome.output.table(1).is_some());
        assert!(outcome.output.table(2).is_none());
    }

    #[test]
    fn test_missing_metric_is_a_failure() {
        let archive = AtlasArchive::new().with_rows(
            1,
            vec![tractmap_atlas::UnionizeRow::new(TARGET, Hemisphere::Left).with_metric("other", 1.0)],
        );
        let (_dir, store) = store(archive);
        let registry = ExperimentRegistry::from_map(BTreeMap::from([(385, vec![1])]));

        let outcome = zero_projection_qc(&registry, &store, TARGET, METRIC);

        assert!(outcome.output.registry().experiments(385).is_empty());
        assert_eq!(outcome.failures.len(), 1);
        assert!(!outcome.failures[0].no_data);
    }
}
