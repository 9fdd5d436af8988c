// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

/*!
Pipeline driver.

Resolves the target and the structure set through the injected atlas service,
then threads the registry through the stage chain, recording every stage in
the audit log, and finally writes the two centroid maps.
*/

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use tractmap_atlas::{
    structure_path, AtlasQueryService, ExperimentId, ExperimentMetadata, FetchPolicy, Hemisphere, MeasurementStore,
    RegionId, StructureCriteria, StructureInfo,
};
use tractmap_config::{validate_config, TractmapConfig};

use crate::artifacts::{save_acronyms, save_centroids, ArtifactNaming, ArtifactPaths};
use crate::audit::{AuditEntry, AuditLog, AuditPayload};
use crate::centroid::{aggregate, centroid_samples, centroid_summary, Centroid};
use crate::data::{HemisphereFork, ProjectionSide};
use crate::error::CurationResult;
use crate::registry::{unmatched_experiments, ExperimentRegistry};
use crate::stages::{
    remove_target_overlap, select_hemisphere, separate_projection_hemispheres, threshold_injection_volume,
    threshold_projection_volume, zero_projection_qc, ExperimentFailure, SeparationMetrics, StageName,
};

/// What one stage reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: StageName,
    pub summary: String,
    /// Output was taken from the audit log instead of recomputed
    pub replayed: bool,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub target: StructureInfo,
    /// Registry after injection-volume thresholding, before the fork
    pub registry: ExperimentRegistry,
    /// Both branches after projection-volume thresholding
    pub fork: HemisphereFork,
    pub ipsilateral_centroids: BTreeMap<RegionId, Centroid>,
    pub contralateral_centroids: BTreeMap<RegionId, Centroid>,
    pub artifacts: ArtifactPaths,
    pub audit_log: PathBuf,
    pub reports: Vec<StageReport>,
    /// Experiments the atlas had no rows for
    pub no_data: BTreeSet<ExperimentId>,
}

/// One configured curation run
pub struct CurationPipeline {
    config: TractmapConfig,
    service: Arc<dyn AtlasQueryService>,
}

impl CurationPipeline {
    /// # Errors
    /// * `CurationError::Config` - the configuration does not validate
    pub fn new(config: TractmapConfig, service: Arc<dyn AtlasQueryService>) -> CurationResult<Self> {
        validate_config(&config)?;
        Ok(Self { config, service })
    }

    pub fn config(&self) -> &TractmapConfig {
        &self.config
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.config
            .paths
            .save_dir
            .join(format!("audit_log_{}.bin", self.config.curation.target_structure))
    }

    /// Directory of cached measurement tables
    pub fn cache_dir(&self) -> PathBuf {
        self.config
            .paths
            .save_dir
            .join(format!("{}_unionized_data", self.config.curation.target_structure))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.config
            .paths
            .data_dir
            .join(format!("{}.csv", self.config.curation.target_structure))
    }

    fn fetch_policy(&self) -> FetchPolicy {
        if self.config.curation.read_unionized_data {
            FetchPolicy::CacheOnly
        } else {
            FetchPolicy::FetchMissing
        }
    }

    fn hemisphere_fingerprint(target: &StructureInfo, hemisphere: Hemisphere) -> String {
        format!("target={};hemisphere={}", target.id, hemisphere.id())
    }

    /// Run every stage and write the artifacts
    pub fn run(&self) -> CurationResult<PipelineOutput> {
        let started = Instant::now();
        let curation = &self.config.curation;
        let midline_z = self.config.atlas.hemisphere_midline_z;
        let hemisphere = Hemisphere::from_id(curation.hemisphere_id_to_select)?;

        info!(
            target: "tractmap-curation",
            "Starting curation for target {} (hemisphere {}, metric {})",
            curation.target_structure, hemisphere, curation.projection_metric
        );

        let target = self
            .service
            .structure(&StructureCriteria::Acronym(curation.target_structure.clone()))?;
        match structure_path(self.service.as_ref(), &target) {
            Ok(path) => info!(target: "tractmap-curation", "Target {} ({}): {}", target.acronym, target.id, path),
            Err(e) => debug!(target: "tractmap-curation", "No ontology path for target {}: {}", target.id, e),
        }
        let structures = self.service.structure_set(self.config.atlas.structure_set_id)?;
        let regions: Vec<RegionId> = structures.iter().map(|s| s.id).collect();
        let metadata = ExperimentMetadata::read_csv(&self.metadata_path())?;

        let mut audit = AuditLog::load_or_default(self.audit_log_path())?;
        let store = MeasurementStore::new(self.service.clone(), self.cache_dir(), self.fetch_policy())?;
        let mut reports = Vec::new();
        let mut failures: Vec<ExperimentFailure> = Vec::new();

        // Step 1: collect
        let collected = ExperimentRegistry::build(&metadata, &regions);
        let unmatched = unmatched_experiments(&metadata, &regions);
        let mut summary = format!(
            "{} experiments collected in {} regions; {} metadata experiments unmatched: {:?}",
            collected.experiment_count(),
            collected.region_count(),
            unmatched.len(),
            unmatched
        );
        if !unmatched.is_empty() {
            warn!(target: "tractmap-curation", "{} experiments outside the structure set", unmatched.len());
        }
        if !metadata.rejected().is_empty() {
            let lines: Vec<u64> = metadata.rejected().iter().map(|row| row.line).collect();
            summary.push_str(&format!("; {} metadata rows rejected at lines {:?}", lines.len(), lines));
        }
        info!(target: "tractmap-curation", "{}: {}", StageName::ExperimentsCollected, summary);
        audit.record(
            StageName::ExperimentsCollected,
            AuditEntry::new(AuditPayload::Registry(collected.clone()), summary.clone()),
        )?;
        reports.push(StageReport {
            stage: StageName::ExperimentsCollected,
            summary,
            replayed: false,
        });

        // Step 2: overlap
        let overlap = remove_target_overlap(&collected, &metadata, target.id);
        audit.record(
            overlap.stage,
            AuditEntry::new(AuditPayload::Registry(overlap.output.clone()), overlap.summary.clone())
                .with_failures(overlap.failures.clone()),
        )?;
        reports.push(StageReport {
            stage: overlap.stage,
            summary: overlap.summary.clone(),
            replayed: false,
        });
        failures.extend(overlap.failures);

        // Step 3: hemisphere selection, replayable
        let fingerprint = Self::hemisphere_fingerprint(&target, hemisphere);
        let replay = if curation.read_experiment_list {
            match audit.get(StageName::HemisphereSelected) {
                Some(entry) if entry.fingerprint.as_deref() == Some(fingerprint.as_str()) => {
                    entry.registry().cloned().map(|registry| (registry, entry.summary.clone()))
                }
                Some(_) => {
                    warn!(
                        target: "tractmap-curation",
                        "Logged {} was recorded for other parameters; recomputing",
                        StageName::HemisphereSelected
                    );
                    None
                }
                None => {
                    warn!(
                        target: "tractmap-curation",
                        "No logged {} to replay; recomputing",
                        StageName::HemisphereSelected
                    );
                    None
                }
            }
        } else {
            None
        };

        let selected = match replay {
            Some((registry, summary)) => {
                info!(
                    target: "tractmap-curation",
                    "{}: replayed from audit log ({} experiments)",
                    StageName::HemisphereSelected,
                    registry.experiment_count()
                );
                reports.push(StageReport {
                    stage: StageName::HemisphereSelected,
                    summary,
                    replayed: true,
                });
                registry
            }
            None => {
                let outcome = select_hemisphere(&overlap.output, &store, hemisphere, midline_z);
                audit.record(
                    outcome.stage,
                    AuditEntry::new(AuditPayload::Registry(outcome.output.clone()), outcome.summary.clone())
                        .with_failures(outcome.failures.clone())
                        .with_fingerprint(fingerprint),
                )?;
                reports.push(StageReport {
                    stage: outcome.stage,
                    summary: outcome.summary,
                    replayed: false,
                });
                failures.extend(outcome.failures);
                outcome.output
            }
        };

        if store.policy() == FetchPolicy::FetchMissing {
            let report = store.prefetch(selected.pairs());
            if !report.failed.is_empty() {
                let failed: Vec<ExperimentId> = report.failed.iter().map(|(experiment, _)| *experiment).collect();
                info!(
                    target: "tractmap-curation",
                    "{} experiments could not be prefetched and will fail {}: {:?}",
                    failed.len(),
                    StageName::ZeroProjectionQc,
                    failed
                );
            }
        }

        // Step 4: zero-projection QC
        let qc = zero_projection_qc(&selected, &store, target.id, &curation.projection_metric);
        audit.record(
            qc.stage,
            AuditEntry::new(AuditPayload::Registry(qc.output.registry().clone()), qc.summary.clone())
                .with_failures(qc.failures.clone()),
        )?;
        reports.push(StageReport {
            stage: qc.stage,
            summary: qc.summary.clone(),
            replayed: false,
        });
        failures.extend(qc.failures);

        // Step 5: injection volume
        let injected = threshold_injection_volume(&qc.output, &store, curation.injection_volume_threshold, midline_z);
        audit.record(
            injected.stage,
            AuditEntry::new(
                AuditPayload::Registry(injected.output.registry().clone()),
                injected.summary.clone(),
            )
            .with_failures(injected.failures.clone()),
        )?;
        reports.push(StageReport {
            stage: injected.stage,
            summary: injected.summary.clone(),
            replayed: false,
        });
        failures.extend(injected.failures);

        // Step 6: fork
        let metrics = SeparationMetrics {
            primary: &curation.projection_metric,
            thresholding: &curation.metric_for_projection_thresholding,
        };
        let separated = separate_projection_hemispheres(&injected.output, target.id, hemisphere, &metrics)?;
        audit.record(
            separated.stage,
            AuditEntry::new(AuditPayload::Fork(separated.output.clone()), separated.summary.clone())
                .with_failures(separated.failures.clone()),
        )?;
        reports.push(StageReport {
            stage: separated.stage,
            summary: separated.summary.clone(),
            replayed: false,
        });
        failures.extend(separated.failures);

        // Step 7: projection volume, per fork
        let thresholded = threshold_projection_volume(
            &separated.output,
            &curation.metric_for_projection_thresholding,
            curation.projection_volume_threshold,
        );
        audit.record(
            thresholded.stage,
            AuditEntry::new(AuditPayload::Fork(thresholded.output.clone()), thresholded.summary.clone())
                .with_failures(thresholded.failures.clone()),
        )?;
        reports.push(StageReport {
            stage: thresholded.stage,
            summary: thresholded.summary.clone(),
            replayed: false,
        });
        failures.extend(thresholded.failures);

        // Step 8: centroids
        let fork = thresholded.output;
        let (ipsi_samples, ipsi_failures) = centroid_samples(&fork.ipsilateral, &curation.projection_metric);
        let (contra_samples, contra_failures) = centroid_samples(&fork.contralateral, &curation.projection_metric);
        let ipsilateral_centroids = aggregate(&ipsi_samples);
        let contralateral_centroids = aggregate(&contra_samples);
        let summary = format!(
            "{}; {}",
            centroid_summary(ProjectionSide::Ipsilateral, &ipsilateral_centroids, &ipsi_samples),
            centroid_summary(ProjectionSide::Contralateral, &contralateral_centroids, &contra_samples)
        );
        let sample_failures: Vec<ExperimentFailure> = ipsi_failures.into_iter().chain(contra_failures).collect();
        audit.record(
            StageName::CentroidSamples,
            AuditEntry::new(
                AuditPayload::CentroidSamples {
                    ipsilateral: ipsi_samples,
                    contralateral: contra_samples,
                },
                summary.clone(),
            )
            .with_failures(sample_failures.clone()),
        )?;
        reports.push(StageReport {
            stage: StageName::CentroidSamples,
            summary,
            replayed: false,
        });
        failures.extend(sample_failures);

        let save_dir = &self.config.paths.save_dir;
        let naming = ArtifactNaming::from_config(curation);
        let artifacts = save_centroids(save_dir, &naming, &ipsilateral_centroids, &contralateral_centroids)?;
        let acronyms: BTreeMap<RegionId, String> =
            structures.into_iter().map(|s| (s.id, s.acronym)).collect();
        save_acronyms(save_dir, &acronyms)?;

        let no_data: BTreeSet<ExperimentId> = failures
            .iter()
            .filter(|f| f.no_data)
            .map(|f| f.experiment_id)
            .collect();
        if !no_data.is_empty() {
            warn!(target: "tractmap-curation", "No atlas data for {} experiments: {:?}", no_data.len(), no_data);
        }

        info!(
            target: "tractmap-curation",
            "Curation complete in {:.1}s: {} ipsilateral and {} contralateral centroids written to {}",
            started.elapsed().as_secs_f64(),
            ipsilateral_centroids.len(),
            contralateral_centroids.len(),
            artifacts.ipsilateral.parent().unwrap_or(save_dir).display()
        );

        Ok(PipelineOutput {
            target,
            registry: injected.output.registry().clone(),
            fork,
            ipsilateral_centroids,
            contralateral_centroids,
            artifacts,
            audit_log: audit.path().to_path_buf(),
            reports,
            no_data,
        })
    }
}
