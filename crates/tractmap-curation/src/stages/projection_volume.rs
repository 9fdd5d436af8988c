// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

use tracing::debug;
use tractmap_atlas::ExperimentId;

use super::{log_stage, removal_summary, ExperimentFailure, StageName, StageOutcome};
use crate::data::{ForkData, HemisphereFork, ProjectionSide};

struct ForkResult {
    fork: ForkData,
    removed: Vec<ExperimentId>,
    failures: Vec<ExperimentFailure>,
}

fn threshold_fork(side: ProjectionSide, fork: &ForkData, metric: &str, threshold: f64) -> ForkResult {
    let mut removed = Vec::new();
    let mut failures = Vec::new();
    let mut kept = ForkData::empty(fork.hemisphere, fork.regions.keys().copied());

    for (&region, records) in &fork.regions {
        for record in records {
            // Every record must have been measured on this fork's side
            if record.hemisphere != fork.hemisphere {
                failures.push(ExperimentFailure::new(
                    region,
                    record.experiment_id,
                    format!(
                        "{} record measured in hemisphere {}, expected {}",
                        side, record.hemisphere, fork.hemisphere
                    ),
                ));
                continue;
            }
            match record.metric(metric) {
                Some(value) if value >= threshold => {
                    kept.regions.entry(region).or_default().push(record.clone());
                }
                Some(value) => {
                    debug!(
                        target: "tractmap-curation",
                        "{} experiment {} {} {} below {}",
                        side, record.experiment_id, metric, value, threshold
                    );
                    removed.push(record.experiment_id);
                }
                None => failures.push(ExperimentFailure::new(
                    region,
                    record.experiment_id,
                    format!("{} record has no '{}' value", side, metric),
                )),
            }
        }
    }

    ForkResult {
        fork: kept,
        removed,
        failures,
    }
}

/// Drop experiments whose target `metric` is below `threshold`, per fork
///
/// Each fork reads the value measured in its own hemisphere: the selected
/// hemisphere for ipsilateral records, the opposite one for contralateral.
pub fn threshold_projection_volume(
    fork: &HemisphereFork,
    metric: &str,
    threshold: f64,
) -> StageOutcome<HemisphereFork> {
    let stage = StageName::ProjectionVolumeThresholded;

    let ipsilateral = threshold_fork(ProjectionSide::Ipsilateral, &fork.ipsilateral, metric, threshold);
    let contralateral = threshold_fork(ProjectionSide::Contralateral, &fork.contralateral, metric, threshold);

    let summary = format!(
        "ipsilateral: {}; contralateral: {}",
        removal_summary(
            &ipsilateral.removed,
            &ipsilateral.failures,
            fork.ipsilateral.experiment_count(),
            ipsilateral.fork.experiment_count()
        ),
        removal_summary(
            &contralateral.removed,
            &contralateral.failures,
            fork.contralateral.experiment_count(),
            contralateral.fork.experiment_count()
        )
    );

    let removed: Vec<ExperimentId> = ipsilateral
        .removed
        .iter()
        .chain(&contralateral.removed)
        .copied()
        .collect();
    let failures: Vec<ExperimentFailure> = ipsilateral
        .failures
        .into_iter()
        .chain(contralateral.failures)
        .collect();
    log_stage(stage, &summary, &removed, &failures);

    StageOutcome {
        stage,
        output: HemisphereFork {
            ipsilateral: ipsilateral.fork,
            contralateral: contralateral.fork,
        },
        removed,
        failures,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::data::ProjectionRecord;
    use std::collections::BTreeMap;
    use tractmap_atlas::Hemisphere;

    fn record(experiment_id: u64, hemisphere: Hemisphere, secondary: f64) -> ProjectionRecord {
        ProjectionRecord {
            experiment_id,
            hemisphere,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            metrics: BTreeMap::from([(METRIC.to_string(), 1.0), (SECONDARY.to_string(), secondary)]),
        }
    }

    fn fork() -> HemisphereFork {
        HemisphereFork {
            ipsilateral: ForkData {
                hemisphere: Hemisphere::Left,
                regions: BTreeMap::from([(385, vec![record(1, Hemisphere::Left, 0.5), record(2, Hemisphere::Left, 0.01)])]),
            },
            contralateral: ForkData {
                hemisphere: Hemisphere::Right,
                regions: BTreeMap::from([(385, vec![record(3, Hemisphere::Right, 0.2), record(4, Hemisphere::Right, 0.05)])]),
            },
        }
    }

    #[test]
    fn test_thresholds_both_forks_inclusively() {
        let outcome = threshold_projection_volume(&fork(), SECONDARY, 0.05);

        assert_eq!(outcome.output.ipsilateral.registry().experiments(385), &[1]);
        assert_eq!(outcome.output.contralateral.registry().experiments(385), &[3, 4]);
        assert_eq!(outcome.removed, vec![2]);
        assert!(outcome.summary.starts_with("ipsilateral: 1 experiments removed: [2]"));
        assert!(outcome.summary.contains("contralateral: 0 experiments removed: []"));
    }

    #[test]
    fn test_contralateral_reads_opposite_hemisphere() {
        let outcome = threshold_projection_volume(&fork(), SECONDARY, 0.1);
        let contra = &outcome.output.contralateral;
        assert_eq!(contra.hemisphere, Hemisphere::Right);
        assert!(contra.regions[&385].iter().all(|r| r.hemisphere == Hemisphere::Right));
        assert_eq!(contra.registry().experiments(385), &[3]);
    }

    #[test]
    fn test_record_from_wrong_hemisphere_is_rejected() {
        let mut fork = fork();
        fork.contralateral
            .regions
            .get_mut(&385)
            .unwrap()
            .push(record(5, Hemisphere::Left, 0.9));

        let outcome = threshold_projection_volume(&fork, SECONDARY, 0.1);

        assert!(!outcome.output.contralateral.registry().contains(385, 5));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].experiment_id, 5);
    }
}
