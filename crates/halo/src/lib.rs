//! Halo: an in-situ halo and substructure finder for cosmological
//! simulations.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all halo sub-crates, plus the reference kernel set and writer registry a
//! host needs to get started.
//!
//! # Quick start
//!
//! ```rust
//! use halo::prelude::*;
//!
//! let session = Session::init(
//!     &InMemoryParams::new(RunConfig::default()),
//!     UnitInfo::default(),
//!     &SimInfo::default(),
//!     halo::default_kernels(),
//!     halo::default_writers(),
//!     SessionOptions::default(),
//! );
//! assert_eq!(halo::init_status(&session), 1);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the
//! prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `halo-core` | IDs, particles, memberships, properties, hierarchy |
//! | [`arena`] | `halo-arena` | Particle arena, layouts, permutations |
//! | [`kernel`] | `halo-kernel` | Kernel and writer traits, search parameters |
//! | [`kernels`] | `halo-kernels` | Reference kernels and catalog writers |
//! | [`engine`] | `halo-engine` | Configuration, sessions, pipeline, status codes |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use halo_core::OutputFormat;
use halo_engine::{ConfigError, InvocationReport, InvokeError, Session, StatusCode};
use halo_kernel::{KernelSet, WriterRegistry};
use halo_kernels::{
    AsciiWriter, BinaryWriter, GridFof, GridSubstructure, NearestDarkMatter, ParentLinkHierarchy,
    PotentialBindingSort, SphericalOverdensity,
};

/// Core types (`halo-core`).
///
/// Particle and group identifiers, species, memberships, group
/// properties and the structure hierarchy.
pub use halo_core as types;

/// Particle storage (`halo-arena`).
///
/// [`arena::ParticleArena`] holds the working particle array between
/// pipeline stages; [`arena::Permutation`] reorders it.
pub use halo_arena as arena;

/// Extension points (`halo-kernel`).
///
/// The six kernel traits collected in [`kernel::KernelSet`] and the
/// [`kernel::CatalogWriter`] trait for output backends.
pub use halo_kernel as kernel;

/// Reference kernels and writers (`halo-kernels`).
pub use halo_kernels as kernels;

/// Configuration, sessions and the group-finding pipeline (`halo-engine`).
///
/// [`engine::Session`] is the host-facing entry point.
pub use halo_engine as engine;

/// Common imports for typical host integration.
///
/// ```rust
/// use halo::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use halo_core::{
        BaryonMode, GroupId, OutputFormat, ParticleId, SearchType, SnapshotTag, SourceParticle,
        Species,
    };

    // Errors
    pub use halo_core::{IngestError, KernelError};

    // Kernels
    pub use halo_kernel::{CatalogWriter, KernelSet, WriterRegistry};

    // Engine
    pub use halo_engine::{
        ConfigError, CosmoInfo, InMemoryParams, InvocationReport, InvokeError, InvokeRequest,
        ParamLoader, RunConfig, Session, SessionOptions, SimInfo, SourceCounts, StatusCode,
        TomlParamFile, UnitInfo,
    };
}

/// The reference kernel set: grid friends-of-friends, grid substructure,
/// spherical overdensity, nearest-dark-matter baryon assignment,
/// parent-link hierarchy and potential-ordered binding sort.
pub fn default_kernels() -> KernelSet {
    KernelSet {
        fof: Box::new(GridFof),
        substructure: Box::new(GridSubstructure::default()),
        inclusive_mass: Box::new(SphericalOverdensity),
        baryons: Box::new(NearestDarkMatter),
        hierarchy: Box::new(ParentLinkHierarchy),
        binding: Box::new(PotentialBindingSort),
    }
}

/// Writers for the formats this crate ships: ASCII and binary.
///
/// HDF and ADIOS are left unregistered; selecting either fails
/// initialisation with an option error.
pub fn default_writers() -> WriterRegistry {
    WriterRegistry::new()
        .with(OutputFormat::Ascii, AsciiWriter::factory())
        .with(OutputFormat::Binary, BinaryWriter::factory())
}

/// Integer status for the host after [`Session::init`].
pub fn init_status(result: &Result<Session, ConfigError>) -> i32 {
    match result {
        Ok(_) => StatusCode::Ok.code(),
        Err(e) => StatusCode::from(e).code(),
    }
}

/// Integer status for the host after [`Session::invoke`].
pub fn invoke_status(result: &Result<InvocationReport, InvokeError>) -> i32 {
    match result {
        Ok(_) => StatusCode::Ok.code(),
        Err(e) => StatusCode::from(e).code(),
    }
}
