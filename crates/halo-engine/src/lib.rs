//! Configuration, normalisation, ingestion and orchestration for the halo
//! structure finder.
//!
//! # Architecture
//!
//! A host simulation drives the engine through a [`Session`]:
//!
//! - [`Session::init`] loads a [`RunConfig`] through a [`ParamLoader`],
//!   validates it against the simulation and the registered writers, and
//!   dumps the effective configuration.
//! - [`Session::invoke`] runs once per snapshot: [`normalize`] derives the
//!   physical per-invocation values, [`partition`] copies the host
//!   particles into a [`ParticleArena`](halo_arena::ParticleArena), and
//!   [`GroupFinder`] runs the seven pipeline stages over it.
//!
//! Failures surface as typed errors; [`StatusCode`] maps them onto the
//! integer codes the host expects.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod comm;
pub mod config;
pub mod cosmology;
pub mod ingest;
pub mod metrics;
pub mod params;
pub mod pipeline;
pub mod session;
pub mod status;

pub use comm::{ChannelComm, CommError, Communicator, LocalComm};
pub use config::{
    ConfigError, ConflictKind, CoreSearchConfig, FofScheme, MemoryConfig, OutputConfig, RunConfig,
};
pub use cosmology::{
    bryan_norman, normalize, CosmoInfo, Derived, MeshGeometry, MeshInfo, SimInfo, UnitInfo,
};
pub use ingest::{partition, PartitionMode, SourceCounts};
pub use metrics::{PipelineMetrics, Stage};
pub use params::{configuration_path, write_configuration, InMemoryParams, ParamLoader, TomlParamFile};
pub use pipeline::{CatalogSummary, GroupFinder, PipelineError, StagePlan};
pub use session::{InvocationReport, InvokeError, InvokeRequest, Session, SessionOptions};
pub use status::StatusCode;
