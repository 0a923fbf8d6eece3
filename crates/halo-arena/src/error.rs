//! Arena-specific error types.

use std::error::Error;
use std::fmt;

/// Errors that can occur during arena operations.
#[derive(Clone, Debug, PartialEq)]
pub enum ArenaError {
    /// The configured growth factor is negative or not finite.
    InvalidGrowthFactor {
        /// The rejected value.
        value: f64,
    },
    /// A layout claims more dark matter particles than the arena holds.
    LayoutOutOfBounds {
        /// Dark matter count claimed by the layout.
        ndark: usize,
        /// Particles in the arena.
        len: usize,
    },
    /// An order vector is not a bijection on `0..len`.
    InvalidPermutation {
        /// First offending position.
        position: usize,
    },
    /// A permutation was applied to a slice of the wrong length.
    LengthMismatch {
        /// Permutation length.
        expected: usize,
        /// Slice length.
        found: usize,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidGrowthFactor { value } => {
                write!(f, "growth factor must be finite and >= 0, got {value}")
            }
            Self::LayoutOutOfBounds { ndark, len } => {
                write!(f, "layout claims {ndark} dark matter particles in an arena of {len}")
            }
            Self::InvalidPermutation { position } => {
                write!(f, "order is not a permutation (first bad entry at {position})")
            }
            Self::LengthMismatch { expected, found } => {
                write!(f, "permutation of length {expected} applied to slice of length {found}")
            }
        }
    }
}

impl Error for ArenaError {}
