//! Particle storage for the halo pipeline.
//!
//! One [`ParticleArena`] owns the particle array for a whole invocation.
//! Stages that need a different physical ordering (group-bucketed for
//! inclusive masses, binding-ordered for output) never overwrite particle
//! identities; they build a [`Permutation`], apply it to the particles and
//! the membership map together, and apply its inverse to undo it.
//!
//! # Architecture
//!
//! ```text
//! ParticleArena
//! ├── Vec<Particle> (len = particle count, capacity = len × (1 + growth))
//! └── Layout (Mixed | DarkFirst { ndark })
//!
//! Permutation (saved order: slot k holds the element originally at order[k])
//! ├── apply()    gather into the permuted order
//! └── inverse()  the permutation that undoes apply()
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod particles;
pub mod permutation;

pub use config::ArenaConfig;
pub use error::ArenaError;
pub use particles::{Layout, ParticleArena};
pub use permutation::Permutation;
