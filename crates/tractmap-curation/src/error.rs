// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

//! Curation error types

use tractmap_atlas::AtlasError;
use tractmap_config::ConfigError;

/// Result type for curation operations
pub type CurationResult<T> = Result<T, CurationError>;

/// Errors that abort a pipeline run
///
/// Problems with a single experiment never surface here; stages collect them
/// as [`ExperimentFailure`](crate::stages::ExperimentFailure)s instead.
#[derive(Debug, thiserror::Error)]
pub enum CurationError {
    #[error("Atlas error: {0}")]
    Atlas(#[from] AtlasError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Audit log error: {0}")]
    AuditLog(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for CurationError {
    fn from(err: bincode::Error) -> Self {
        CurationError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for CurationError {
    fn from(err: serde_json::Error) -> Self {
        CurationError::Serialization(err.to_string())
    }
}
