// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

use tractmap_atlas::{ExperimentMetadata, StructureId};

use super::{log_stage, removal_summary, ExperimentFailure, StageName, StageOutcome};
use crate::registry::ExperimentRegistry;

/// Drop experiments whose tracer also reached the target structure
pub fn remove_target_overlap(
    registry: &ExperimentRegistry,
    metadata: &ExperimentMetadata,
    target_structure_id: StructureId,
) -> StageOutcome<ExperimentRegistry> {
    let stage = StageName::OverlapRemoved;
    let mut removed = Vec::new();
    let mut failures = Vec::new();

    let output = registry.retain(|region, experiment| match metadata.get(experiment) {
        Some(record) => match record.injects_into(target_structure_id) {
            Ok(true) => {
                removed.push(experiment);
                false
            }
            Ok(false) => true,
            Err(e) => {
                failures.push(ExperimentFailure::new(region, experiment, e.to_string()));
                false
            }
        },
        None => {
            failures.push(ExperimentFailure::new(
                region,
                experiment,
                "not present in experiment metadata",
            ));
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditEntry, AuditLog, AuditPayload};
    use std::collections::BTreeMap;
    use tempfile::tempdir;
    use tractmap_atlas::ExperimentRecord;

    #[test]
    fn test_removes_experiments_injecting_into_target() {
        let metadata = ExperimentMetadata::from_records(vec![
            ExperimentRecord::new(1, 100).with_injection_structures(&[385]),
            ExperimentRecord::new(2, 100).with_injection_structures(&[385, 100]),
            ExperimentRecord::new(3, 100).with_injection_structures(&[385]),
        ])
        .unwrap();
        let registry = ExperimentRegistry::from_map(BTreeMap::from([(100, vec![1, 2, 3])]));

        let outcome = remove_target_overlap(&registry, &metadata, 100);

        assert_eq!(outcome.output.experiments(100), &[1, 3]);
        assert_eq!(outcome.removed, vec![2]);
        assert!(outcome.failures.is_empty());
        assert_eq!(registry.experiments(100), &[1, 2, 3]);

        let dir = tempdir().unwrap();
        let mut audit = AuditLog::load_or_default(dir.path().join("audit_log_VISp.bin")).unwrap();
        audit
            .record(
                outcome.stage,
                AuditEntry::new(AuditPayload::Registry(outcome.output.clone()), outcome.summary.clone()),
            )
            .unwrap();

        let reloaded = AuditLog::load_or_default(audit.path()).unwrap();
        let entry = reloaded.get(StageName::OverlapRemoved).unwrap();
        assert!(reloaded.keys().any(|k| k == "step_2_injection_target_overlap_removed"));
        assert!(entry.summary.starts_with("1 experiments removed: [2]"));
        assert_eq!(entry.registry(), Some(&outcome.output));
    }

    #[test]
    fn test_unknown_experiment_is_a_failure() {
        let metadata = ExperimentMetadata::from_records(vec![ExperimentRecord::new(1, 100)]).unwrap();
        let registry = ExperimentRegistry::from_map(BTreeMap::from([(100, vec![1, 7])]));

        let outcome = remove_target_overlap(&registry, &metadata, 385);

        assert_eq!(outcome.output.experiments(100), &[1]);
        assert!(outcome.removed.is_empty());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].experiment_id, 7);
    }

    #[test]
    fn test_unreadable_injection_structures_excludes_only_that_experiment() {
        let csv = "\
id,structure-id,injection-structures
1,100,\"[{\"\"id\"\"=>385}]\"
2,100,not json
3,100,\"[{\"\"id\"\"=>100}]\"
";
        let metadata = ExperimentMetadata::from_reader(csv.as_bytes()).unwrap();
        let registry = ExperimentRegistry::from_map(BTreeMap::from([(100, vec![1, 2, 3])]));

        let outcome = remove_target_overlap(&registry, &metadata, 100);

        assert_eq!(outcome.output.experiments(100), &[1]);
        assert_eq!(outcome.removed, vec![3]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].experiment_id, 2);
        assert!(!outcome.failures[0].no_data);
        assert_eq!(
            outcome.summary,
            "1 experiments removed: [3]; 1 experiments failed: [2] (3 -> 1 experiments)"
        );
    }
}
