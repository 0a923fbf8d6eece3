//! Test utilities and mock kernels for halo development.
//!
//! Provides scripted implementations of the kernel traits
//! ([`LabelFof`], [`ScriptedSubstructure`], ...), a [`RecordingWriter`]
//! that captures everything the pipeline hands to a catalog writer, and
//! seeded particle generators.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod particles;
pub mod writer;

pub use fixtures::{
    BaryonCall, Counting, FailingFof, FofMassOnly, LabelFof, NoBaryons, NoSubstructure,
    RecordingBaryons, ScriptedSubgroup, ScriptedSubstructure,
};
pub use particles::{clump, hydro_count, retag, uniform};
pub use writer::{recording_registry, snapshot, Recording, RecordingWriter};
