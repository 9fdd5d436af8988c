// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

//! # tractmap-observability
//!
//! Logging infrastructure shared by every tractmap crate, with per-crate debug
//! flag support.
//!
//! Crates log through `tracing` with an explicit `target:` equal to their crate
//! name, so `--debug-tractmap-curation` raises only the curation stages to
//! `debug` while everything else stays at the configured base level.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known tractmap crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "tractmap",
    "tractmap-config",
    "tractmap-atlas",
    "tractmap-curation",
];
