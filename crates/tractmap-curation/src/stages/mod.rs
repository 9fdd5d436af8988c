// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

/*!
The filter stage chain.

Stages run in a fixed order and are pure: each takes the previous value by
reference and returns a [`StageOutcome`] holding the new value, the
experiments it dropped, the experiments it could not evaluate, and a summary
line for the audit log.

| Audit key | Stage |
|-----------|-------|
| `step_1_experiments_collected` | registry built from metadata |
| `step_2_injection_target_overlap_removed` | [`remove_target_overlap`] |
| `step_3_hemisphere_selected` | [`select_hemisphere`] |
| `step_4_zero_projection_qc` | [`zero_projection_qc`] |
| `step_5_injection_volume_thresholded` | [`threshold_injection_volume`] |
| `step_6_projection_hemisphere_separated` | [`separate_projection_hemispheres`] |
| `step_7_projection_volume_thresholded` | [`threshold_projection_volume`] |
| `step_8_centroid_samples` | centroid inputs per fork |
*/

mod hemisphere_selection;
mod injection_volume;
mod overlap;
mod projection_volume;
mod separation;
mod zero_qc;

pub use hemisphere_selection::select_hemisphere;
pub use injection_volume::threshold_injection_volume;
pub use overlap::remove_target_overlap;
pub use projection_volume::threshold_projection_volume;
pub use separation::{separate_projection_hemispheres, SeparationMetrics};
pub use zero_qc::zero_projection_qc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tractmap_atlas::{ExperimentId, RegionId};

/// Audit log keys, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageName {
    ExperimentsCollected,
    OverlapRemoved,
    HemisphereSelected,
    ZeroProjectionQc,
    InjectionVolumeThresholded,
    ProjectionHemisphereSeparated,
    ProjectionVolumeThresholded,
    CentroidSamples,
}

impl StageName {
    pub const ALL: [StageName; 8] = [
        StageName::ExperimentsCollected,
        StageName::OverlapRemoved,
        StageName::HemisphereSelected,
        StageName::ZeroProjectionQc,
        StageName::InjectionVolumeThresholded,
        StageName::ProjectionHemisphereSeparated,
        StageName::ProjectionVolumeThresholded,
        StageName::CentroidSamples,
    ];

    pub fn key(self) -> &'static str {
        match self {
            StageName::ExperimentsCollected => "step_1_experiments_collected",
            StageName::OverlapRemoved => "step_2_injection_target_overlap_removed",
            StageName::HemisphereSelected => "step_3_hemisphere_selected",
            StageName::ZeroProjectionQc => "step_4_zero_projection_qc",
            StageName::InjectionVolumeThresholded => "step_5_injection_volume_thresholded",
            StageName::ProjectionHemisphereSeparated => "step_6_projection_hemisphere_separated",
            StageName::ProjectionVolumeThresholded => "step_7_projection_volume_thresholded",
            StageName::CentroidSamples => "step_8_centroid_samples",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// An experiment a stage could not evaluate; it is excluded from the output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentFailure {
    pub region_id: RegionId,
    pub experiment_id: ExperimentId,
    pub reason: String,
    /// The atlas had no rows for the experiment
    pub no_data: bool,
}

impl ExperimentFailure {
    pub fn new(region_id: RegionId, experiment_id: ExperimentId, reason: impl Into<String>) -> Self {
        Self {
            region_id,
            experiment_id,
            reason: reason.into(),
            no_data: false,
        }
    }

    pub(crate) fn from_atlas(
        region_id: RegionId,
        experiment_id: ExperimentId,
        error: &tractmap_atlas::AtlasError,
    ) -> Self {
        Self {
            region_id,
            experiment_id,
            reason: error.to_string(),
            no_data: error.is_data_unavailable(),
        }
    }
}

/// Result of one stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome<T> {
    pub stage: StageName,
    pub output: T,
    /// Dropped by the stage's criterion, in registry order
    pub removed: Vec<ExperimentId>,
    pub failures: Vec<ExperimentFailure>,
    pub summary: String,
}

/// `"<n> experiments removed: [..]"`, then failures and the before/after count
pub(crate) fn removal_summary(
    removed: &[ExperimentId],
    failures: &[ExperimentFailure],
    before: usize,
    after: usize,
) -> String {
    let mut summary = format!("{} experiments removed: {:?}", removed.len(), removed);
    if !failures.is_empty() {
        let failed: Vec<ExperimentId> = failures.iter().map(|f| f.experiment_id).collect();
        summary.push_str(&format!("; {} experiments failed: {:?}", failed.len(), failed));
    }
    summary.push_str(&format!(" ({} -> {} experiments)", before, after));
    summary
}

/// Log the per-experiment failures and the stage summary
pub(crate) fn log_stage(stage: StageName, summary: &str, removed: &[ExperimentId], failures: &[ExperimentFailure]) {
    for failure in failures {
        warn!(
            target: "tractmap-curation",
            "{}: experiment {} (region {}) excluded: {}",
            stage, failure.experiment_id, failure.region_id, failure.reason
        );
    }
    if !removed.is_empty() {
        debug!(target: "tractmap-curation", "{}: removed {:?}", stage, removed);
    }
    info!(target: "tractmap-curation", "{}: {}", stage, summary);
}
