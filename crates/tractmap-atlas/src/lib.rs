// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

//! # tractmap-atlas
//!
//! Atlas-facing half of tractmap:
//! - identifiers and [`Hemisphere`]
//! - unionize rows and per-experiment [`MeasurementTable`]s
//! - experiment metadata exports
//! - the injected [`AtlasQueryService`] capability and a local [`AtlasArchive`]
//! - the fetch-or-load [`MeasurementStore`]

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod archive;
pub mod error;
pub mod metadata;
pub mod query;
pub mod store;
pub mod types;
pub mod unionize;

pub use archive::AtlasArchive;
pub use error::{AtlasError, AtlasResult};
pub use metadata::{parse_injection_structures, ExperimentMetadata, ExperimentRecord, InjectionStructure, RejectedRow};
pub use query::{structure_path, AtlasQueryService, StructureCriteria, StructureInfo, UnionizeQuery};
pub use store::{FetchPolicy, MeasurementStore, PrefetchReport, TableKey};
pub use types::{ExperimentId, Hemisphere, RegionId, StructureId, HEMISPHERE_MIDLINE_Z};
pub use unionize::{read_rows, write_rows, MeasurementTable, UnionizeRow};
