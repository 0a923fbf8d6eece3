//! Seeded particle generators.
//!
//! All generators are deterministic in their seed and produce source
//! particles with unit mass and no potential.

use halo_core::{ParticleId, SourceParticle, Species};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// `n` particles spread uniformly over `[0, box_size)^3`.
///
/// Ids run from `first_id`.
pub fn uniform(seed: u64, n: usize, box_size: f64, tag: i32, first_id: u64) -> Vec<SourceParticle> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| SourceParticle {
            id: ParticleId(first_id + i as u64),
            tag,
            position: [
                rng.gen_range(0.0..box_size),
                rng.gen_range(0.0..box_size),
                rng.gen_range(0.0..box_size),
            ],
            velocity: [
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ],
            mass: 1.0,
            potential: None,
        })
        .collect()
}

/// `n` particles inside a cube of half-width `radius` around `centre`.
///
/// Ids run from `first_id`. Velocities are small so the clump is bound.
pub fn clump(
    seed: u64,
    centre: [f64; 3],
    n: usize,
    radius: f64,
    tag: i32,
    first_id: u64,
) -> Vec<SourceParticle> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let mut position = centre;
            for x in &mut position {
                *x += rng.gen_range(-radius..radius);
            }
            SourceParticle {
                id: ParticleId(first_id + i as u64),
                tag,
                position,
                velocity: [
                    rng.gen_range(-0.01..0.01),
                    rng.gen_range(-0.01..0.01),
                    rng.gen_range(-0.01..0.01),
                ],
                mass: 1.0,
                potential: None,
            }
        })
        .collect()
}

/// Set the tag of every `every`-th particle (starting at index 0).
pub fn retag(particles: &mut [SourceParticle], every: usize, tag: i32) {
    for p in particles.iter_mut().step_by(every.max(1)) {
        p.tag = tag;
    }
}

/// Number of gas particles.
pub fn hydro_count(particles: &[SourceParticle]) -> usize {
    particles.iter().filter(|p| p.tag == Species::GAS_TAG).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generators_are_seeded() {
        assert_eq!(uniform(3, 50, 10.0, 1, 0), uniform(3, 50, 10.0, 1, 0));
        assert_ne!(uniform(3, 50, 10.0, 1, 0), uniform(4, 50, 10.0, 1, 0));
    }

    #[test]
    fn clump_stays_in_its_cube() {
        let c = clump(1, [5.0, 5.0, 5.0], 100, 0.5, 1, 1000);
        assert_eq!(c[0].id, ParticleId(1000));
        assert!(c
            .iter()
            .all(|p| p.position.iter().all(|x| (*x - 5.0).abs() <= 0.5)));
    }

    #[test]
    fn retag_every_other() {
        let mut ps = uniform(0, 10, 1.0, Species::DARK_MATTER_TAG, 0);
        retag(&mut ps, 2, Species::GAS_TAG);
        assert_eq!(hydro_count(&ps), 5);
        assert_eq!(ps[0].tag, Species::GAS_TAG);
        assert_eq!(ps[1].tag, Species::DARK_MATTER_TAG);
    }
}
