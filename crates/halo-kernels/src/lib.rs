//! Reference search kernels and catalog writers for the halo pipeline.
//!
//! Simple, correct implementations of every collaborator trait in
//! `halo-kernel`, so that the pipeline runs end to end. Production
//! kernels plug in through the same traits.
//!
//! # Kernels (stage order)
//!
//! 1. [`GridFof`]: friends-of-friends over a uniform cell grid.
//! 2. [`SphericalOverdensity`]: FOF, 200-critical and virial masses.
//! 3. [`GridSubstructure`]: recursive FOF at shrinking linking lengths.
//! 5. [`NearestDarkMatter`]: baryons join the group of their nearest
//!    grouped dark matter particle.
//! 6. [`ParentLinkHierarchy`]: hierarchy from parent links, rejecting
//!    cycles.
//! 7. [`PotentialBindingSort`]: members ordered by specific binding
//!    energy.
//!
//! # Writers
//!
//! [`AsciiWriter`] writes whitespace-separated text; [`BinaryWriter`]
//! writes `bincode` records.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod ascii;
pub mod baryons;
pub mod binary;
pub mod binding;
pub mod fof;
mod grid;
pub mod hierarchy;
pub mod overdensity;
pub mod substructure;
mod union_find;

pub use ascii::AsciiWriter;
pub use baryons::NearestDarkMatter;
pub use binary::{BinaryRecord, BinaryWriter};
pub use binding::PotentialBindingSort;
pub use fof::GridFof;
pub use hierarchy::ParentLinkHierarchy;
pub use overdensity::SphericalOverdensity;
pub use substructure::GridSubstructure;
