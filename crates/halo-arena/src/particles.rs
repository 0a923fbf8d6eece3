//! The particle arena: one contiguous particle array per invocation.

use halo_core::{IngestError, Particle, Species, SpeciesCounts};

use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::permutation::Permutation;

/// Physical layout of species within the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// All species interleaved in input order.
    Mixed,
    /// Dark matter in `[0, ndark)`, baryons in `[ndark, len)`.
    DarkFirst {
        /// Number of dark matter particles.
        ndark: usize,
    },
}

/// Owns the particle array for one invocation.
///
/// The backing vector is allocated with headroom from [`ArenaConfig`] so
/// that a later boundary exchange can append particles without
/// reallocating.
#[derive(Clone, Debug)]
pub struct ParticleArena {
    particles: Vec<Particle>,
    layout: Layout,
}

impl ParticleArena {
    /// Take ownership of `particles` with the given layout, reserving
    /// headroom according to `config`.
    pub fn new(
        mut particles: Vec<Particle>,
        layout: Layout,
        config: &ArenaConfig,
    ) -> Result<Self, ArenaError> {
        config.validate()?;
        if let Layout::DarkFirst { ndark } = layout {
            if ndark > particles.len() {
                return Err(ArenaError::LayoutOutOfBounds {
                    ndark,
                    len: particles.len(),
                });
            }
        }
        let capacity = config.capacity_for(particles.len());
        particles.reserve_exact(capacity.saturating_sub(particles.len()));
        Ok(Self { particles, layout })
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether the arena holds no particles.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Allocated particle slots, including headroom.
    pub fn capacity(&self) -> usize {
        self.particles.capacity()
    }

    /// Bytes allocated for particle storage.
    pub fn memory_bytes(&self) -> usize {
        self.particles.capacity() * std::mem::size_of::<Particle>()
    }

    /// Species layout.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// All particles.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// All particles, mutably. Callers must keep parallel arrays aligned.
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// All particles, mutably, for a caller that may reorder them.
    ///
    /// The layout is reset to [`Layout::Mixed`].
    pub fn particles_for_reorder(&mut self) -> &mut [Particle] {
        self.layout = Layout::Mixed;
        &mut self.particles
    }

    /// Dark matter and baryon regions for a [`Layout::DarkFirst`] arena.
    ///
    /// Returns `None` for a mixed layout.
    pub fn split_dark_baryons(&self) -> Option<(&[Particle], &[Particle])> {
        match self.layout {
            Layout::DarkFirst { ndark } => Some(self.particles.split_at(ndark)),
            Layout::Mixed => None,
        }
    }

    /// Reorder the particles by `perm`.
    ///
    /// A reordering invalidates any species layout, so a `DarkFirst`
    /// arena becomes `Mixed` unless `perm` is the identity.
    pub fn permute(&mut self, perm: &Permutation) -> Result<(), ArenaError> {
        perm.apply(&mut self.particles)?;
        if !perm.is_identity() {
            self.layout = Layout::Mixed;
        }
        Ok(())
    }

    /// Reorder the particles by `perm` while keeping the recorded layout.
    ///
    /// Used for round trips (apply, then apply the inverse) where the
    /// layout is restored before anything reads it.
    pub fn permute_transient(&mut self, perm: &Permutation) -> Result<(), ArenaError> {
        perm.apply(&mut self.particles)
    }

    /// Count particles per species in the current ordering.
    ///
    /// Fails on the first star or black hole particle.
    pub fn species_counts(&self) -> Result<SpeciesCounts, IngestError> {
        let mut counts = SpeciesCounts::default();
        for (index, p) in self.particles.iter().enumerate() {
            match p.species {
                Species::DarkMatter => counts.dark += 1,
                Species::Gas => counts.gas += 1,
                species @ (Species::Star | Species::BlackHole) => {
                    return Err(IngestError::UnsupportedSpecies { index, species });
                }
            }
        }
        Ok(counts)
    }
}
