// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

//! Unified logging initialization for tractmap
//!
//! Console output plus an optional combined JSON log per pipeline run, with
//! configurable retention of old runs.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::{LogFormat, LoggingOptions};

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Logging initialization result
///
/// Keep alive for the duration of the run; dropping it flushes the file log.
pub struct LoggingGuard {
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder receiving the JSON log, if file logging is enabled
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn console_layer(format: LogFormat, filter: EnvFilter) -> BoxedLayer {
    match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_filter(filter)
            .boxed(),
    }
}

/// Initialize logging with console output and an optional run log
///
/// With file logging enabled, creates a timestamped folder:
/// ```text
/// ./logs/
///   └── run_20250101_120000/
///       └── tractmap.log (combined, JSON)
/// ```
pub fn init_logging(debug_flags: &CrateDebugFlags, options: &LoggingOptions) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string();
    let make_filter =
        || EnvFilter::try_new(&filter).with_context(|| format!("Invalid log filter: {}", filter));

    let mut layers: Vec<BoxedLayer> = vec![console_layer(options.console_format, make_filter()?)];
    let mut file_guards = Vec::new();
    let mut run_folder = None;

    if options.file_logging {
        let timestamp = Utc::now().format(RUN_TIMESTAMP_FORMAT);
        let folder = options.log_dir.join(format!("{}{}", RUN_PREFIX, timestamp));
        std::fs::create_dir_all(&folder)
            .with_context(|| format!("Failed to create log directory: {}", folder.display()))?;

        cleanup_old_logs(&options.log_dir, options.retention_days, options.retention_runs)?;

        let appender = rolling::never(&folder, "tractmap.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        file_guards.push(guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .with_filter(make_filter()?)
            .boxed();
        layers.push(file_layer);
        run_folder = Some(folder);
    }

    Registry::default()
        .with(layers)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(LoggingGuard {
        _file_guards: file_guards,
        log_dir: run_folder,
    })
}

/// Initialize console-only logging
pub fn init_console_logging(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(debug_flags, &LoggingOptions::default())
}

fn parse_run_timestamp(dir_name: &str) -> Option<DateTime<Utc>> {
    let timestamp = dir_name.strip_prefix(RUN_PREFIX)?;
    let naive = NaiveDateTime::parse_from_str(timestamp, RUN_TIMESTAMP_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Clean up old run directories by age, then by count
pub(crate) fn cleanup_old_logs(
    base_log_dir: &Path,
    retention_days: u64,
    retention_runs: usize,
) -> Result<()> {
    if !base_log_dir.exists() {
        return Ok(());
    }

    let cutoff_date = Utc::now() - chrono::Duration::days(retention_days as i64);

    let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let parsed = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_run_timestamp);
        if let Some(dt) = parsed {
            runs.push((path, dt));
        }
    }

    // Oldest first
    runs.sort_by_key(|(_, dt)| *dt);

    let mut kept = Vec::new();
    for (path, dt) in runs {
        if dt < cutoff_date {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                eprintln!("Warning: Failed to remove old log directory {}: {}", path.display(), e);
            }
        } else {
            kept.push(path);
        }
    }

    if kept.len() > retention_runs {
        let to_remove = kept.len() - retention_runs;
        for path in kept.iter().take(to_remove) {
            if let Err(e) = std::fs::remove_dir_all(path) {
                eprintln!("Warning: Failed to remove old log directory {}: {}", path.display(), e);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_run_timestamp() {
        let dt = parse_run_timestamp("run_20250101_120000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-01-01 12:00:00");
        assert!(parse_run_timestamp("run_garbage").is_none());
        assert!(parse_run_timestamp("other_20250101_120000").is_none());
    }

    #[test]
    fn test_cleanup_removes_expired_and_excess_runs() {
        let dir = tempdir().unwrap();
        let recent = Utc::now();
        let names = [
            "run_20000101_000000".to_string(), // expired
            (recent - chrono::Duration::hours(3)).format("run_%Y%m%d_%H%M%S").to_string(),
            (recent - chrono::Duration::hours(2)).format("run_%Y%m%d_%H%M%S").to_string(),
            (recent - chrono::Duration::hours(1)).format("run_%Y%m%d_%H%M%S").to_string(),
            "notes".to_string(),
        ];
        for name in &names {
            std::fs::create_dir_all(dir.path().join(name)).unwrap();
        }

        cleanup_old_logs(dir.path(), 30, 2).unwrap();

        assert!(!dir.path().join(&names[0]).exists());
        assert!(!dir.path().join(&names[1]).exists());
        assert!(dir.path().join(&names[2]).exists());
        assert!(dir.path().join(&names[3]).exists());
        assert!(dir.path().join("notes").exists());
    }
}
