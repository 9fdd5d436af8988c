//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-tractmap-atlas`, `--debug-tractmap-curation`,
//! etc. to raise logging for individual crates.

use std::collections::BTreeSet;
use std::env;

use crate::KNOWN_CRATES;

/// Debug flags parsed from command-line arguments
///
/// # Example
/// ```rust
/// use tractmap_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-tractmap-atlas".to_string()]);
/// assert!(flags.is_enabled("tractmap-atlas"));
/// ```
#[derive(Debug, Clone)]
pub struct CrateDebugFlags {
    pub enabled_crates: BTreeSet<String>,
    /// Level applied to everything not explicitly raised
    pub base_level: String,
}

impl Default for CrateDebugFlags {
    fn default() -> Self {
        Self {
            enabled_crates: BTreeSet::new(),
            base_level: "info".to_string(),
        }
    }
}

impl CrateDebugFlags {
    /// Parse debug flags from command-line arguments
    ///
    /// Looks for arguments matching `--debug-{crate-name}` pattern.
    /// Also supports `--debug-all` to enable all crates.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();

        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
                continue;
            }

            if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enabled_crates.insert(crate_name.to_string());
            }
        }

        flags
    }

    /// Replace the base level used for crates without a debug flag
    pub fn with_base_level(mut self, level: impl Into<String>) -> Self {
        self.base_level = level.into().to_lowercase();
        self
    }

    fn enable_all(&mut self) {
        for crate_name in KNOWN_CRATES {
            self.enabled_crates.insert(crate_name.to_string());
        }
    }

    /// Check if debug is enabled for a specific crate
    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains(crate_name)
    }

    /// Check if debug is enabled for any crate
    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// Create a tracing filter directive from debug flags
    ///
    /// Format: "tractmap-atlas=debug,tractmap-curation=debug,info"
    pub fn to_filter_string(&self) -> String {
        let mut filters: Vec<String> = self
            .enabled_crates
            .iter()
            .map(|crate_name| format!("{}=debug", crate_name))
            .collect();
        filters.push(self.base_level.clone());
        filters.join(",")
    }
}

/// Parse debug flags from the process arguments and `TRACTMAP_DEBUG`
///
/// Environment variable format: comma-separated crate names, e.g.
/// "tractmap-atlas,tractmap-curation", or `all`.
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());

    if let Ok(env_var) = env::var("TRACTMAP_DEBUG") {
        merge_env_flags(&mut flags, &env_var);
    }

    flags
}

fn merge_env_flags(flags: &mut CrateDebugFlags, env_var: &str) {
    if env_var == "all" {
        flags.enable_all();
        return;
    }
    for crate_name in env_var.split(',') {
        let crate_name = crate_name.trim();
        if !crate_name.is_empty() {
            flags.enabled_crates.insert(crate_name.to_string());
        }
    }
}

/// Generate help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  TRACTMAP_DEBUG={{crate-name}}[,{{crate-name}}]  Enable debug for crates (comma-separated)
  TRACTMAP_DEBUG=all                             Enable debug for all crates
"#,
        KNOWN_CRATES.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_crate_flag() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-tractmap-atlas".to_string()]);
        assert!(flags.is_enabled("tractmap-atlas"));
        assert!(!flags.is_enabled("tractmap-curation"));
    }

    #[test]
    fn test_non_flag_arguments_ignored() {
        let flags = CrateDebugFlags::from_args(vec![
            "run_pipeline".to_string(),
            "tractmap.toml".to_string(),
        ]);
        assert!(!flags.any_enabled());
        assert_eq!(flags.to_filter_string(), "info");
    }

    #[test]
    fn test_debug_all() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-all".to_string()]);
        for crate_name in KNOWN_CRATES {
            assert!(flags.is_enabled(crate_name), "{} should be enabled", crate_name);
        }
    }

    #[test]
    fn test_filter_string_with_base_level() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-tractmap-curation".to_string()])
            .with_base_level("WARN");
        assert_eq!(flags.to_filter_string(), "tractmap-curation=debug,warn");
    }

    #[test]
    fn test_env_flags_merge() {
        let mut flags = CrateDebugFlags::default();
        merge_env_flags(&mut flags, "tractmap-atlas, ,tractmap-config");
        assert!(flags.is_enabled("tractmap-atlas"));
        assert!(flags.is_enabled("tractmap-config"));
        assert_eq!(flags.enabled_crates.len(), 2);
    }
}
