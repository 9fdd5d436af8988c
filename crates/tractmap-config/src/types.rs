// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `tractmap.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default configuration file name searched by the loader
pub const CONFIG_FILE_NAME: &str = "tractmap.toml";

/// Projection metrics reported by the unionize tables
pub const KNOWN_PROJECTION_METRICS: &[&str] = &[
    "projection_density",
    "projection_energy",
    "projection_intensity",
    "projection_volume",
    "normalized_projection_volume",
    "sum_pixels",
    "sum_pixel_intensity",
    "sum_projection_pixels",
    "sum_projection_pixel_intensity",
];

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TractmapConfig {
    pub curation: CurationConfig,
    #[serde(default)]
    pub atlas: AtlasConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TractmapConfig {
    /// Build a configuration around an explicit curation section, all other
    /// sections at their defaults
    pub fn with_curation(curation: CurationConfig) -> Self {
        Self {
            curation,
            atlas: AtlasConfig::default(),
            paths: PathsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Curation parameters. Every field is required.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CurationConfig {
    /// Acronym of the projection target structure (e.g. `VISp`)
    pub target_structure: String,
    /// Metric used for ipsi/contra separation and as centroid weight
    pub projection_metric: String,
    /// Injection hemisphere to keep (1 = left, 2 = right)
    pub hemisphere_id_to_select: u8,
    pub injection_volume_threshold: f64,
    pub projection_volume_threshold: f64,
    /// Metric compared against `projection_volume_threshold`
    pub metric_for_projection_thresholding: String,
    /// Only read measurement tables already on disk, never query the atlas
    pub read_unionized_data: bool,
    /// Reuse the hemisphere selection recorded in the audit log
    pub read_experiment_list: bool,
}

/// Atlas ontology settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// Curated list of non-overlapping substructures at a mid-ontology level
    pub structure_set_id: u32,
    /// Z coordinate separating left (below) from right (at or above)
    pub hemisphere_midline_z: f64,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            structure_set_id: 167_587_189,
            hemisphere_midline_z: 5700.0,
        }
    }
}

/// Filesystem locations
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding `<target_structure>.csv` experiment metadata
    pub data_dir: PathBuf,
    /// Directory for cached tables, the audit log and centroid artifacts
    pub save_dir: PathBuf,
    /// Local atlas export served to the pipeline
    pub archive_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            save_dir: PathBuf::from("output"),
            archive_dir: PathBuf::from("archive"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level (trace, debug, info, warn, error)
    pub level: String,
    pub file_logging: bool,
    pub log_dir: PathBuf,
    pub retention_days: u64,
    pub retention_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: false,
            log_dir: PathBuf::from("./logs"),
            retention_days: 30,
            retention_runs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_sections_default() {
        let config: TractmapConfig = toml::from_str(
            r#"
            [curation]
            target_structure = "VISp"
            projection_metric = "normalized_projection_volume"
            hemisphere_id_to_select = 2
            injection_volume_threshold = 0.05
            projection_volume_threshold = 0.01
            metric_for_projection_thresholding = "projection_volume"
            read_unionized_data = false
            read_experiment_list = false
            "#,
        )
        .unwrap();

        assert_eq!(config.atlas, AtlasConfig::default());
        assert_eq!(config.paths.save_dir, PathBuf::from("output"));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.curation.hemisphere_id_to_select, 2);
    }
}
