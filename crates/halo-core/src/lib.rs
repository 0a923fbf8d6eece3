//! Core types for the halo structure-finding pipeline.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every other crate in the workspace: particle
//! and group identifiers, the species tag, the particle record, group
//! membership and hierarchy tables, per-group property records, and the
//! error types raised by ingestion and by search kernels.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod group;
pub mod hierarchy;
pub mod id;
pub mod output;
pub mod particle;
pub mod props;
pub mod search;
pub mod species;

pub use error::{IngestError, KernelError};
pub use group::{bucket_key, bucket_offsets, GroupTable, Membership};
pub use hierarchy::{Hierarchy, HierarchyEntry, StructureKind};
pub use id::{GroupId, ParticleId, SnapshotTag};
pub use output::OutputFormat;
pub use particle::{Particle, SourceParticle};
pub use props::{GroupParticleList, GroupParticleLists, InclusiveMass, PropBuffer, PropData};
pub use search::{BaryonMode, SearchType};
pub use species::{Species, SpeciesCounts};
