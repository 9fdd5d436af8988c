// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

//! # tractmap - connectivity experiment curation
//!
//! Reduces mesoscale connectivity experiments, grouped by injection region, to
//! one projection-weighted centroid per region, separately for ipsilateral and
//! contralateral projections to a chosen target structure.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tractmap::prelude::*;
//!
//! let config = load_config(None, None)?;
//! let archive = AtlasArchive::load_dir(&config.paths.archive_dir)?;
//! let pipeline = CurationPipeline::new(config, Arc::new(archive))?;
//!
//! let output = pipeline.run()?;
//! for report in &output.reports {
//!     println!("{}: {}", report.stage, report.summary);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: tractmap-config, tractmap-observability    │
//! │  (TOML parameters, logging)                             │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Data: tractmap-atlas                                   │
//! │  (Hemisphere, measurement tables, query service, cache) │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Algorithms: tractmap-curation                          │
//! │  (Stage chain, centroids, audit log, pipeline driver)   │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub use tractmap_atlas as atlas;
pub use tractmap_config as config;
pub use tractmap_curation as curation;
pub use tractmap_observability as observability;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::atlas::{
        AtlasArchive, AtlasQueryService, ExperimentId, FetchPolicy, Hemisphere, MeasurementStore, RegionId,
        StructureCriteria, StructureInfo, UnionizeRow,
    };
    pub use crate::config::{load_config, validate_config, CurationConfig, TractmapConfig};
    pub use crate::curation::{
        aggregate, load_centroids, AuditLog, Centroid, CurationPipeline, ExperimentRegistry, PipelineOutput,
        StageName, WeightedSample,
    };
}
