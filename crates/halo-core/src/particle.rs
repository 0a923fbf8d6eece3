//! Particle records: the external input form and the internal form.

use serde::{Deserialize, Serialize};

use crate::id::ParticleId;
use crate::species::Species;

/// A particle as handed over by the host simulation.
///
/// The species is still a raw integer tag; it is decoded (and rejected if
/// unsupported) by the ingestion partitioner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceParticle {
    /// Stable identity.
    pub id: ParticleId,
    /// Raw species tag (see the `*_TAG` constants on [`Species`]).
    pub tag: i32,
    /// Comoving position.
    pub position: [f64; 3],
    /// Peculiar velocity.
    pub velocity: [f64; 3],
    /// Particle mass.
    pub mass: f64,
    /// Gravitational potential, when the host computed one.
    pub potential: Option<f64>,
}

/// Internal particle record stored in the particle arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Stable identity.
    pub id: ParticleId,
    /// Decoded species.
    pub species: Species,
    /// Position.
    pub position: [f64; 3],
    /// Velocity.
    pub velocity: [f64; 3],
    /// Mass.
    pub mass: f64,
    /// Gravitational potential per unit mass, if known.
    pub potential: Option<f64>,
}

impl Particle {
    /// Build an internal particle from a source record with a decoded species.
    pub fn from_source(src: &SourceParticle, species: Species) -> Self {
        Self {
            id: src.id,
            species,
            position: src.position,
            velocity: src.velocity,
            mass: src.mass,
            potential: src.potential,
        }
    }

    /// Squared distance to `other`, wrapping across a periodic box when
    /// `period > 0`.
    pub fn distance2(&self, other: &Particle, period: f64) -> f64 {
        let mut d2 = 0.0;
        for k in 0..3 {
            let mut dx = (self.position[k] - other.position[k]).abs();
            if period > 0.0 && dx > 0.5 * period {
                dx = period - dx;
            }
            d2 += dx * dx;
        }
        d2
    }

    /// Specific kinetic energy relative to a bulk velocity.
    pub fn kinetic_energy(&self, bulk: [f64; 3]) -> f64 {
        let mut v2 = 0.0;
        for k in 0..3 {
            let dv = self.velocity[k] - bulk[k];
            v2 += dv * dv;
        }
        0.5 * v2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64, y: f64, z: f64) -> Particle {
        Particle {
            position: [x, y, z],
            ..Particle::default()
        }
    }

    #[test]
    fn distance_without_period() {
        let a = at(0.0, 0.0, 0.0);
        let b = at(3.0, 4.0, 0.0);
        assert_eq!(a.distance2(&b, 0.0), 25.0);
    }

    #[test]
    fn distance_wraps_periodic_box() {
        let a = at(0.5, 0.0, 0.0);
        let b = at(9.5, 0.0, 0.0);
        assert!((a.distance2(&b, 10.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn kinetic_energy_relative_to_bulk() {
        let p = Particle {
            velocity: [2.0, 0.0, 0.0],
            ..Particle::default()
        };
        assert_eq!(p.kinetic_energy([0.0; 3]), 2.0);
        assert_eq!(p.kinetic_energy([2.0, 0.0, 0.0]), 0.0);
    }
}
