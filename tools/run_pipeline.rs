// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

/*!
Curation pipeline runner

Runs the full stage chain for one configuration against a local atlas export.

Usage:
  cargo run --bin run_pipeline -- [tractmap.toml] [key=value ...] [--debug-<crate> ...]

Example:
  cargo run --bin run_pipeline -- tractmap.toml target_structure=VISp hemisphere_id=2 --debug-tractmap-curation
*/

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tractmap::atlas::AtlasArchive;
use tractmap::config::load_config;
use tractmap::curation::CurationPipeline;
use tractmap::observability::{debug_flags_help, init_logging, parse_debug_flags, LogFormat, LoggingOptions};

fn print_usage(program: &str) {
    eprintln!("Usage: {} [tractmap.toml] [key=value ...] [--debug-<crate> ...]", program);
    eprintln!("\nOverride keys: target_structure, projection_metric, metric_for_projection_thresholding,");
    eprintln!("  hemisphere_id, injection_volume_threshold, projection_volume_threshold,");
    eprintln!("  read_unionized_data, read_experiment_list, save_dir, log_level");
    eprintln!("\n{}", debug_flags_help());
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("run_pipeline");

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage(program);
        return Ok(());
    }

    let mut config_path: Option<PathBuf> = None;
    let mut overrides = HashMap::new();
    for arg in args.iter().skip(1).filter(|a| !a.starts_with("--")) {
        match arg.split_once('=') {
            Some((key, value)) => {
                overrides.insert(key.to_string(), value.to_string());
            }
            None if config_path.is_none() => config_path = Some(PathBuf::from(arg)),
            None => {
                print_usage(program);
                anyhow::bail!("Unexpected argument '{}'", arg);
            }
        }
    }

    let config = load_config(config_path.as_deref(), Some(&overrides)).context("Failed to load configuration")?;

    let debug_flags = parse_debug_flags().with_base_level(config.logging.level.clone());
    let logging = LoggingOptions {
        console_format: LogFormat::Text,
        file_logging: config.logging.file_logging,
        log_dir: config.logging.log_dir.clone(),
        retention_days: config.logging.retention_days,
        retention_runs: config.logging.retention_runs,
    };
    let _guard = init_logging(&debug_flags, &logging)?;

    println!("Tractmap curation");
    println!("-------------------------------------------");
    println!("Target:     {}", config.curation.target_structure);
    println!("Metric:     {}", config.curation.projection_metric);
    println!("Hemisphere: {}", config.curation.hemisphere_id_to_select);
    println!("Archive:    {}", config.paths.archive_dir.display());
    println!();

    let archive = AtlasArchive::load_dir(&config.paths.archive_dir)
        .with_context(|| format!("Failed to load atlas archive {}", config.paths.archive_dir.display()))?;
    let pipeline = CurationPipeline::new(config, Arc::new(archive))?;
    let output = pipeline.run()?;

    for report in &output.reports {
        let marker = if report.replayed { " (replayed)" } else { "" };
        println!("{}{}: {}", report.stage, marker, report.summary);
    }
    println!();
    if !output.no_data.is_empty() {
        println!("No atlas data: {:?}", output.no_data);
    }
    println!("Ipsilateral centroids:   {}", output.artifacts.ipsilateral.display());
    println!("Contralateral centroids: {}", output.artifacts.contralateral.display());
    println!("Audit log:               {}", output.audit_log.display());

    Ok(())
}
