// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

/*!
Core identifier and hemisphere types shared by every tractmap crate.
*/

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, AtlasResult};

/// Structure id in the atlas ontology
pub type StructureId = u32;

/// A region is a structure from the curated structure set
pub type RegionId = StructureId;

/// Experiment (section data set) id
pub type ExperimentId = u64;

/// Z coordinate (atlas units) separating the left and right hemisphere
pub const HEMISPHERE_MIDLINE_Z: f64 = 5700.0;

/// Hemisphere as reported by the atlas
///
/// `Both` only appears on bilateral summary rows; hemisphere derivation never
/// produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Hemisphere {
    None = 0,
    Left = 1,
    Right = 2,
    Both = 3,
}

impl Hemisphere {
    /// Numeric id used by the atlas
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> AtlasResult<Self> {
        match id {
            0 => Ok(Hemisphere::None),
            1 => Ok(Hemisphere::Left),
            2 => Ok(Hemisphere::Right),
            3 => Ok(Hemisphere::Both),
            other => Err(AtlasError::InvalidHemisphere(other)),
        }
    }

    /// Hemisphere of a point from its z coordinate
    ///
    /// The midline belongs to the right hemisphere.
    pub fn from_z(z: f64, midline_z: f64) -> Self {
        if z < midline_z {
            Hemisphere::Left
        } else {
            Hemisphere::Right
        }
    }

    /// Left and right swap; `None` and `Both` have no opposite
    pub fn opposite(self) -> Option<Self> {
        match self {
            Hemisphere::Left => Some(Hemisphere::Right),
            Hemisphere::Right => Some(Hemisphere::Left),
            Hemisphere::None | Hemisphere::Both => None,
        }
    }

    /// True for the two hemispheres a projection can be assigned to
    pub fn is_lateral(self) -> bool {
        matches!(self, Hemisphere::Left | Hemisphere::Right)
    }
}

impl TryFrom<u8> for Hemisphere {
    type Error = AtlasError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Hemisphere::from_id(value)
    }
}

impl From<Hemisphere> for u8 {
    fn from(value: Hemisphere) -> Self {
        value.id()
    }
}

impl std::fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Hemisphere::None => "none",
            Hemisphere::Left => "left",
            Hemisphere::Right => "right",
            Hemisphere::Both => "both",
        };
        write!(f, "{} ({})", name, self.id())
    }
}
