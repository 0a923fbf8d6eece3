//! Collaborator traits for the halo pipeline.
//!
//! The orchestrator never implements a search algorithm itself. It calls
//! out to six kernels (full-set search, substructure, inclusive mass,
//! baryon association, hierarchy, binding-energy ordering) and to catalog
//! writers, all through the traits defined here. Every call receives a
//! [`KernelContext`] carrying the resolved search parameters and the
//! shared-memory thread pool of the rank.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod context;
pub mod kernel;
pub mod params;
pub mod writer;

pub use context::KernelContext;
pub use kernel::{
    BaryonKernel, BaryonSearch, BindingEnergySort, BucketedGroups, FofKernel, FofResult,
    HierarchyBuilder, InclusiveMassKernel, KernelSet, SubstructureKernel,
};
pub use params::SearchParams;
pub use writer::{
    CatalogWriter, SimulationSummary, UnitSummary, WriterError, WriterFactory, WriterRegistry,
    WriterTarget,
};
