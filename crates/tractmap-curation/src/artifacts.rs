// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

/*!
Centroid result files.

Names carry the full parameter set so different runs never overwrite each
other:
```text
save_dir/
  areas_acronyms.json
  centroids_<metric>_hem_id_<h>_inj_vol_thresh_<iv>_target_vol_thresh_<pv>_<target>/
    ipsilateral_centroids_dict_hem_<h>_inj_vol_thresh_<iv>_target_vol_thresh_<pv>_<target>.json
    contralateral_centroids_dict_hem_<h>_inj_vol_thresh_<iv>_target_vol_thresh_<pv>_<target>.json
```
*/

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tractmap_atlas::RegionId;
use tractmap_config::CurationConfig;

use crate::centroid::Centroid;
use crate::data::ProjectionSide;
use crate::error::CurationResult;

/// Region id → acronym lookup written next to the centroid folders
pub const ACRONYMS_FILE: &str = "areas_acronyms.json";

/// Threshold as it appears in file names; integral values keep a `.0`
pub fn format_threshold(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Parameter tuple that names a run's artifacts
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactNaming {
    pub projection_metric: String,
    pub hemisphere_id: u8,
    pub injection_volume_threshold: f64,
    pub projection_volume_threshold: f64,
    pub target_structure: String,
}

impl ArtifactNaming {
    pub fn from_config(config: &CurationConfig) -> Self {
        Self {
            projection_metric: config.projection_metric.clone(),
            hemisphere_id: config.hemisphere_id_to_select,
            injection_volume_threshold: config.injection_volume_threshold,
            projection_volume_threshold: config.projection_volume_threshold,
            target_structure: config.target_structure.clone(),
        }
    }

    fn parameter_suffix(&self) -> String {
        format!(
            "inj_vol_thresh_{}_target_vol_thresh_{}_{}",
            format_threshold(self.injection_volume_threshold),
            format_threshold(self.projection_volume_threshold),
            self.target_structure
        )
    }

    pub fn folder_name(&self) -> String {
        format!(
            "centroids_{}_hem_id_{}_{}",
            self.projection_metric,
            self.hemisphere_id,
            self.parameter_suffix()
        )
    }

    pub fn file_name(&self, side: ProjectionSide) -> String {
        format!(
            "{}_centroids_dict_hem_{}_{}.json",
            side,
            self.hemisphere_id,
            self.parameter_suffix()
        )
    }

    pub fn centroid_path(&self, save_dir: &Path, side: ProjectionSide) -> PathBuf {
        save_dir.join(self.folder_name()).join(self.file_name(side))
    }
}

/// Paths written by [`save_centroids`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub ipsilateral: PathBuf,
    pub contralateral: PathBuf,
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> CurationResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Write both centroid maps
pub fn save_centroids(
    save_dir: &Path,
    naming: &ArtifactNaming,
    ipsilateral: &BTreeMap<RegionId, Centroid>,
    contralateral: &BTreeMap<RegionId, Centroid>,
) -> CurationResult<ArtifactPaths> {
    let paths = ArtifactPaths {
        ipsilateral: naming.centroid_path(save_dir, ProjectionSide::Ipsilateral),
        contralateral: naming.centroid_path(save_dir, ProjectionSide::Contralateral),
    };
    write_json(&paths.ipsilateral, ipsilateral)?;
    write_json(&paths.contralateral, contralateral)?;
    Ok(paths)
}

pub fn load_centroids(path: &Path) -> CurationResult<BTreeMap<RegionId, Centroid>> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

pub fn save_acronyms(save_dir: &Path, acronyms: &BTreeMap<RegionId, String>) -> CurationResult<PathBuf> {
    let path = save_dir.join(ACRONYMS_FILE);
    write_json(&path, acronyms)?;
    Ok(path)
}
