// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

use tracing::debug;
use tractmap_atlas::{Hemisphere, MeasurementStore};

use super::{log_stage, removal_summary, ExperimentFailure, StageName, StageOutcome};
use crate::hemisphere::derive_hemisphere;
use crate::registry::ExperimentRegistry;

/// Keep experiments injected into `target_hemisphere`
///
/// The hemisphere comes from each experiment's injection rows at its own
/// region.
pub fn select_hemisphere(
    registry: &ExperimentRegistry,
    store: &MeasurementStore,
    target_hemisphere: Hemisphere,
    midline_z: f64,
) -> StageOutcome<ExperimentRegistry> {
    let stage = StageName::HemisphereSelected;
    let mut removed = Vec::new();
    let mut failures = Vec::new();

    let output = registry.retain(|region, experiment| {
        let table = match store.fetch_or_load(region, experiment, true, Some(region)) {
            Ok(table) => table,
            Err(e) => {
                failures.push(ExperimentFailure::from_atlas(region, experiment, &e));
                return false;
            }
        };
        let hemisphere = derive_hemisphere(&table, region, midline_z);
        debug!(
            target: "tractmap-curation",
            "Experiment {} (region {}) injected in hemisphere {}",
            experiment, region, hemisphere
        );
        if hemisphere == target_hemisphere {
            true
        } else {
            removed.push(experiment);
            false
        }
    });

    let summary = removal_summary(
        &removed,
        &failures,
        registry.experiment_count(),
        output.experiment_count(),
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
