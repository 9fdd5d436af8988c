// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base values)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, TractmapConfig, CONFIG_FILE_NAME};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Find the tractmap configuration file
///
/// Search order:
/// 1. `TRACTMAP_CONFIG_PATH` environment variable
/// 2. Current working directory: `./tractmap.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("TRACTMAP_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        } else {
            return Err(ConfigError::FileNotFound(format!(
                "Config file specified by TRACTMAP_CONFIG_PATH not found: {}",
                path.display()
            )));
        }
    }

    let mut search_paths = Vec::new();

    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "Configuration file '{}' not found in any of these locations:\n{}\n\nSet TRACTMAP_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the config file is not found, contains invalid TOML, or
/// lacks a required `[curation]` key
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<TractmapConfig> {
    let config_file = if let Some(path) = config_path {
        path.to_path_buf()
    } else {
        find_config_file()?
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: TractmapConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    let value = value.to_lowercase();
    value == "true" || value == "1" || value == "yes"
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `TRACTMAP_TARGET_STRUCTURE` -> `curation.target_structure`
/// - `TRACTMAP_PROJECTION_METRIC` -> `curation.projection_metric`
/// - `TRACTMAP_HEMISPHERE_ID` -> `curation.hemisphere_id_to_select`
/// - `TRACTMAP_INJECTION_VOLUME_THRESHOLD` -> `curation.injection_volume_threshold`
/// - `TRACTMAP_PROJECTION_VOLUME_THRESHOLD` -> `curation.projection_volume_threshold`
/// - `TRACTMAP_READ_UNIONIZED_DATA` -> `curation.read_unionized_data`
/// - `TRACTMAP_DATA_DIR` -> `paths.data_dir`
/// - `TRACTMAP_SAVE_DIR` -> `paths.save_dir`
/// - `TRACTMAP_ARCHIVE_DIR` -> `paths.archive_dir`
/// - `TRACTMAP_LOG_LEVEL` -> `logging.level`
pub fn apply_environment_overrides(config: &mut TractmapConfig) {
    if let Ok(value) = env::var("TRACTMAP_TARGET_STRUCTURE") {
        config.curation.target_structure = value;
    }
    if let Ok(value) = env::var("TRACTMAP_PROJECTION_METRIC") {
        config.curation.projection_metric = value;
    }
    if let Ok(value) = env::var("TRACTMAP_HEMISPHERE_ID") {
        if let Ok(id) = value.parse::<u8>() {
            config.curation.hemisphere_id_to_select = id;
        }
    }
    if let Ok(value) = env::var("TRACTMAP_INJECTION_VOLUME_THRESHOLD") {
        if let Ok(threshold) = value.parse::<f64>() {
            config.curation.injection_volume_threshold = threshold;
        }
    }
    if let Ok(value) = env::var("TRACTMAP_PROJECTION_VOLUME_THRESHOLD") {
        if let Ok(threshold) = value.parse::<f64>() {
            config.curation.projection_volume_threshold = threshold;
        }
    }
    if let Ok(value) = env::var("TRACTMAP_READ_UNIONIZED_DATA") {
        config.curation.read_unionized_data = parse_flag(&value);
    }

    if let Ok(value) = env::var("TRACTMAP_DATA_DIR") {
        config.paths.data_dir = PathBuf::from(value);
    }
    if let Ok(value) = env::var("TRACTMAP_SAVE_DIR") {
        config.paths.save_dir = PathBuf::from(value);
    }
    if let Ok(value) = env::var("TRACTMAP_ARCHIVE_DIR") {
        config.paths.archive_dir = PathBuf::from(value);
    }

    if let Ok(value) = env::var("TRACTMAP_LOG_LEVEL") {
        config.logging.level = value;
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"target_structure": "VISl", "hemisphere_id": "1"}`)
pub fn apply_cli_overrides(config: &mut TractmapConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("target_structure") {
        config.curation.target_structure = value.clone();
    }
    if let Some(value) = cli_args.get("projection_metric") {
        config.curation.projection_metric = value.clone();
    }
    if let Some(value) = cli_args.get("metric_for_projection_thresholding") {
        config.curation.metric_for_projection_thresholding = value.clone();
    }
    if let Some(value) = cli_args.get("hemisphere_id") {
        if let Ok(id) = value.parse::<u8>() {
            config.curation.hemisphere_id_to_select = id;
        }
    }
    if let Some(value) = cli_args.get("injection_volume_threshold") {
        if let Ok(threshold) = value.parse::<f64>() {
            config.curation.injection_volume_threshold = threshold;
        }
    }
    if let Some(value) = cli_args.get("projection_volume_threshold") {
        if let Ok(threshold) = value.parse::<f64>() {
            config.curation.projection_volume_threshold = threshold;
        }
    }
    if let Some(value) = cli_args.get("read_unionized_data") {
        config.curation.read_unionized_data = parse_flag(value);
    }
    if let Some(value) = cli_args.get("read_experiment_list") {
        config.curation.read_experiment_list = parse_flag(value);
    }

    if let Some(value) = cli_args.get("save_dir") {
        config.paths.save_dir = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
}
