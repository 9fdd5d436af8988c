//! Configuration validation
//!
//! Ensures curation parameters are within valid ranges before any atlas
//! query is issued.

use crate::{ConfigError, ConfigResult, TractmapConfig, KNOWN_PROJECTION_METRICS};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Required string fields
/// - Hemisphere id in {1, 2}
/// - Finite, non-negative thresholds
/// - Known projection metric names
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &TractmapConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_required_fields(config, &mut errors);
    validate_value_ranges(config, &mut errors);
    validate_metrics(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_required_fields(config: &TractmapConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.curation.target_structure.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "curation.target_structure".to_string(),
        });
    }
    if config.curation.projection_metric.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "curation.projection_metric".to_string(),
        });
    }
    if config.curation.metric_for_projection_thresholding.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "curation.metric_for_projection_thresholding".to_string(),
        });
    }
}

fn validate_value_ranges(config: &TractmapConfig, errors: &mut Vec<ConfigValidationError>) {
    let curation = &config.curation;

    if curation.hemisphere_id_to_select != 1 && curation.hemisphere_id_to_select != 2 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "curation.hemisphere_id_to_select".to_string(),
            reason: "must be 1 (left) or 2 (right)".to_string(),
        });
    }

    for (field, value) in [
        ("curation.injection_volume_threshold", curation.injection_volume_threshold),
        ("curation.projection_volume_threshold", curation.projection_volume_threshold),
    ] {
        if !value.is_finite() || value < 0.0 {
            errors.push(ConfigValidationError::InvalidValue {
                field: field.to_string(),
                reason: "must be a finite, non-negative number".to_string(),
            });
        }
    }

    if !config.atlas.hemisphere_midline_z.is_finite() {
        errors.push(ConfigValidationError::InvalidValue {
            field: "atlas.hemisphere_midline_z".to_string(),
            reason: "must be finite".to_string(),
        });
    }
}

fn validate_metrics(config: &TractmapConfig, errors: &mut Vec<ConfigValidationError>) {
    for (field, metric) in [
        ("curation.projection_metric", &config.curation.projection_metric),
        (
            "curation.metric_for_projection_thresholding",
            &config.curation.metric_for_projection_thresholding,
        ),
    ] {
        if !metric.trim().is_empty() && !KNOWN_PROJECTION_METRICS.contains(&metric.as_str()) {
            errors.push(ConfigValidationError::InvalidValue {
                field: field.to_string(),
                reason: format!(
                    "unknown metric '{}' (expected one of: {})",
                    metric,
                    KNOWN_PROJECTION_METRICS.join(", ")
                ),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CurationConfig;

    fn valid_config() -> TractmapConfig {
        TractmapConfig::with_curation(CurationConfig {
            target_structure: "VISp".to_string(),
            projection_metric: "normalized_projection_volume".to_string(),
            hemisphere_id_to_select: 2,
            injection_volume_threshold: 0.05,
            projection_volume_threshold: 0.01,
            metric_for_projection_thresholding: "projection_volume".to_string(),
            read_unionized_data: false,
            read_experiment_list: false,
        })
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_invalid_hemisphere() {
        let mut config = valid_config();
        config.curation.hemisphere_id_to_select = 3;

        let result = validate_config(&config);
        if let Err(ConfigError::ValidationError(msg)) = result {
            assert!(msg.contains("hemisphere_id_to_select"));
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_negative_threshold_and_unknown_metric_reported_together() {
        let mut config = valid_config();
        config.curation.injection_volume_threshold = -1.0;
        config.curation.projection_metric = "projection_vibes".to_string();

        let result = validate_config(&config);
        if let Err(ConfigError::ValidationError(msg)) = result {
            assert!(msg.contains("injection_volume_threshold"));
            assert!(msg.contains("projection_vibes"));
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_empty_target_structure() {
        let mut config = valid_config();
        config.curation.target_structure = "  ".to_string();

        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(msg)) if msg.contains("target_structure")));
    }
}
