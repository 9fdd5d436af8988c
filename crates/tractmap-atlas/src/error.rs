// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

//! Atlas error types

use crate::types::{ExperimentId, Hemisphere, StructureId};
use thiserror::Error;

/// Result type for atlas operations
pub type AtlasResult<T> = Result<T, AtlasError>;

/// Errors raised at the atlas boundary and by measurement tables
#[derive(Error, Debug)]
pub enum AtlasError {
    /// The atlas returned no rows (or nothing is cached in cache-only mode)
    #[error("No unionize data available for experiment {experiment_id}")]
    DataUnavailable { experiment_id: ExperimentId },

    #[error("Structure not found: {0}")]
    StructureNotFound(String),

    #[error("Structure set not found: {0}")]
    StructureSetNotFound(u32),

    #[error("Experiment {experiment_id} has no row for structure {structure_id} in hemisphere {hemisphere}")]
    MissingRow {
        experiment_id: ExperimentId,
        structure_id: StructureId,
        hemisphere: Hemisphere,
    },

    #[error("Experiment {experiment_id} has no '{metric}' value for structure {structure_id}")]
    MissingMetric {
        experiment_id: ExperimentId,
        structure_id: StructureId,
        metric: String,
    },

    #[error("Experiment {experiment_id} has duplicate rows for structure {structure_id} in hemisphere {hemisphere}")]
    DuplicateRow {
        experiment_id: ExperimentId,
        structure_id: StructureId,
        hemisphere: Hemisphere,
    },

    #[error("Invalid hemisphere id: {0}")]
    InvalidHemisphere(u8),

    #[error("Malformed unionize table: {0}")]
    Format(String),

    #[error("Invalid experiment metadata: {0}")]
    Metadata(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AtlasError {
    /// Whether the error only means "no data for this experiment"
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, AtlasError::DataUnavailable { .. })
    }
}
