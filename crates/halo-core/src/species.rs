//! Particle species tags.
//!
//! The host simulation tags particles with small integers. Those tags are
//! decoded once at ingestion into [`Species`], a closed enum; every place
//! that dispatches on species matches it exhaustively and routes stars and
//! black holes to an explicit "unsupported" branch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Particle species.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Species {
    /// Collisionless dark matter.
    #[default]
    DarkMatter,
    /// Gas (hydro) particle.
    Gas,
    /// Star particle. Not handled by the pipeline.
    Star,
    /// Black hole particle. Not handled by the pipeline.
    BlackHole,
}

impl Species {
    /// Raw tag for gas particles.
    pub const GAS_TAG: i32 = 0;
    /// Raw tag for dark matter particles.
    pub const DARK_MATTER_TAG: i32 = 1;
    /// Raw tag for star particles.
    pub const STAR_TAG: i32 = 4;
    /// Raw tag for black hole particles.
    pub const BLACK_HOLE_TAG: i32 = 5;

    /// Decode a raw species tag. Returns `None` for unknown tags.
    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            Self::GAS_TAG => Some(Self::Gas),
            Self::DARK_MATTER_TAG => Some(Self::DarkMatter),
            Self::STAR_TAG => Some(Self::Star),
            Self::BLACK_HOLE_TAG => Some(Self::BlackHole),
            _ => None,
        }
    }

    /// The raw tag for this species.
    pub fn tag(self) -> i32 {
        match self {
            Self::Gas => Self::GAS_TAG,
            Self::DarkMatter => Self::DARK_MATTER_TAG,
            Self::Star => Self::STAR_TAG,
            Self::BlackHole => Self::BLACK_HOLE_TAG,
        }
    }

    /// Whether the pipeline can process this species.
    pub fn is_supported(self) -> bool {
        match self {
            Self::DarkMatter | Self::Gas => true,
            Self::Star | Self::BlackHole => false,
        }
    }

    /// Whether this species counts as a baryon.
    pub fn is_baryon(self) -> bool {
        match self {
            Self::DarkMatter => false,
            Self::Gas | Self::Star | Self::BlackHole => true,
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DarkMatter => write!(f, "dark matter"),
            Self::Gas => write!(f, "gas"),
            Self::Star => write!(f, "star"),
            Self::BlackHole => write!(f, "black hole"),
        }
    }
}

/// Per-species particle counts for one array or sub-array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpeciesCounts {
    /// Number of dark matter particles.
    pub dark: usize,
    /// Number of gas particles.
    pub gas: usize,
}

impl SpeciesCounts {
    /// Total particles counted.
    pub fn total(&self) -> usize {
        self.dark + self.gas
    }
}
