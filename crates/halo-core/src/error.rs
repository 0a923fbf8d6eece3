//! Error types shared across the pipeline.
//!
//! Configuration errors live with the configuration record in
//! `halo-engine`; this module holds the errors raised by ingestion and by
//! search kernels, which several crates need to construct.

use std::error::Error;
use std::fmt;

use crate::species::Species;

/// Errors from particle ingestion.
///
/// Every variant is fatal for the current snapshot invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestError {
    /// A particle carries a species the pipeline does not handle.
    UnsupportedSpecies {
        /// Index of the offending particle in the input.
        index: usize,
        /// Its species.
        species: Species,
    },
    /// A particle carries a tag that decodes to no species at all.
    UnknownSpecies {
        /// Index of the offending particle in the input.
        index: usize,
        /// The raw tag.
        tag: i32,
    },
    /// The supplied per-species counts disagree with the particle tags.
    CountMismatch {
        /// Which population disagrees.
        population: &'static str,
        /// Count supplied by the caller.
        expected: usize,
        /// Count found in the input.
        found: usize,
    },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedSpecies { index, species } => {
                write!(
                    f,
                    "unsupported particle type: index={index} type={} ({species})",
                    species.tag()
                )
            }
            Self::UnknownSpecies { index, tag } => {
                write!(f, "unknown particle type: index={index} type={tag}")
            }
            Self::CountMismatch {
                population,
                expected,
                found,
            } => {
                write!(
                    f,
                    "{population} count mismatch: expected {expected}, found {found}"
                )
            }
        }
    }
}

impl Error for IngestError {}

/// Errors returned by search kernels, sorters and builders.
///
/// Wrapped with the failing stage by the orchestrator.
#[derive(Clone, Debug, PartialEq)]
pub enum KernelError {
    /// The kernel could not complete.
    ExecutionFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// The kernel met a particle species it cannot handle.
    UnsupportedSpecies {
        /// Index of the offending particle.
        index: usize,
        /// Its species.
        species: Species,
    },
    /// Parent links do not form a forest.
    CyclicHierarchy {
        /// A group whose parent chain does not terminate.
        group: u64,
    },
    /// Input slices disagree in length.
    LengthMismatch {
        /// Which input.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        found: usize,
    },
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
            Self::UnsupportedSpecies { index, species } => {
                write!(f, "unsupported particle type {species} at index {index}")
            }
            Self::CyclicHierarchy { group } => {
                write!(f, "parent chain of group {group} does not reach a root")
            }
            Self::LengthMismatch {
                what,
                expected,
                found,
            } => write!(f, "{what} has length {found}, expected {expected}"),
        }
    }
}

impl Error for KernelError {}

impl From<IngestError> for KernelError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::UnsupportedSpecies { index, species } => {
                Self::UnsupportedSpecies { index, species }
            }
            other => Self::ExecutionFailed {
                reason: other.to_string(),
            },
        }
    }
}
