// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

//! # tractmap-curation
//!
//! Reduces the experiments registered for each region of a structure set to
//! one projection-weighted centroid per region and projection side.
//!
//! ## Stage chain
//! ```text
//! metadata ─► registry ─► overlap removal ─► hemisphere selection ─► zero QC
//!          ─► injection volume ─► ipsi/contra fork ─► projection volume ─► centroids
//! ```
//!
//! Stages are pure functions over immutable values (see [`stages`]); the
//! [`CurationPipeline`] threads the values through them and records each
//! result in the [`AuditLog`].

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod artifacts;
pub mod audit;
pub mod centroid;
pub mod data;
pub mod error;
pub mod hemisphere;
pub mod pipeline;
pub mod registry;
pub mod stages;

pub use artifacts::{format_threshold, load_centroids, save_centroids, ArtifactNaming, ArtifactPaths};
pub use audit::{AuditEntry, AuditLog, AuditPayload};
pub use centroid::{aggregate, weighted_centroid, Centroid, SampleSet, WeightedSample};
pub use data::{ForkData, HemisphereFork, ProjectionRecord, ProjectionSide, UnionizedData};
pub use error::{CurationError, CurationResult};
pub use hemisphere::{derive_hemisphere, dominant_row};
pub use pipeline::{CurationPipeline, PipelineOutput, StageReport};
pub use registry::{unmatched_experiments, ExperimentRegistry};
pub use stages::{ExperimentFailure, StageName, StageOutcome};
