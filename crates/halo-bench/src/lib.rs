//! Benchmark profiles for the halo structure finder.
//!
//! Provides deterministic particle sets and a matching configuration:
//!
//! - [`reference_profile`]: 32 halos of 256 particles over a sparse
//!   background (~10K particles)
//! - [`stress_profile`]: 256 halos of 384 particles (~100K particles)
//! - [`reference_kernels`]: the reference kernel set
//! - [`bench_config`]: configuration tuned to the profiles

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use halo_core::{ParticleId, SourceParticle, Species};
use halo_engine::{RunConfig, SimInfo, SourceCounts};
use halo_kernel::KernelSet;
use halo_kernels::{
    GridFof, GridSubstructure, NearestDarkMatter, ParentLinkHierarchy, PotentialBindingSort,
    SphericalOverdensity,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Side of the periodic box used by every profile.
pub const BOX_SIZE: f64 = 100.0;

/// A particle set with the counts the host would report.
#[derive(Clone, Debug)]
pub struct Profile {
    /// Particles in host order.
    pub particles: Vec<SourceParticle>,
    /// Host-reported counts.
    pub counts: SourceCounts,
}

/// Build a profile of `nhalos` clumps of `per_halo` particles plus
/// `background` uniformly spread particles.
///
/// Every `gas_every`-th particle is gas (0 for none). Deterministic in
/// `seed`.
pub fn clustered_profile(
    seed: u64,
    nhalos: usize,
    per_halo: usize,
    background: usize,
    gas_every: usize,
) -> Profile {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let total = nhalos * per_halo + background;
    let mut particles = Vec::with_capacity(total);
    for _ in 0..nhalos {
        let centre: [f64; 3] = [
            rng.gen_range(0.0..BOX_SIZE),
            rng.gen_range(0.0..BOX_SIZE),
            rng.gen_range(0.0..BOX_SIZE),
        ];
        for _ in 0..per_halo {
            let mut position = centre;
            for x in &mut position {
                *x = (*x + rng.gen_range(-0.2..0.2)).rem_euclid(BOX_SIZE);
            }
            particles.push((position, 0.05));
        }
    }
    for _ in 0..background {
        let position = [
            rng.gen_range(0.0..BOX_SIZE),
            rng.gen_range(0.0..BOX_SIZE),
            rng.gen_range(0.0..BOX_SIZE),
        ];
        particles.push((position, 1.0));
    }

    let mut num_hydro = 0;
    let particles: Vec<SourceParticle> = particles
        .into_iter()
        .enumerate()
        .map(|(i, (position, speed))| {
            let gas = gas_every > 0 && i % gas_every == 0;
            num_hydro += usize::from(gas);
            SourceParticle {
                id: ParticleId(i as u64),
                tag: if gas {
                    Species::GAS_TAG
                } else {
                    Species::DARK_MATTER_TAG
                },
                position,
                velocity: [
                    rng.gen_range(-speed..speed),
                    rng.gen_range(-speed..speed),
                    rng.gen_range(-speed..speed),
                ],
                mass: 1.0,
                potential: None,
            }
        })
        .collect();
    Profile {
        counts: SourceCounts {
            num_gravity: particles.len(),
            num_hydro,
        },
        particles,
    }
}

/// ~10K particles: 32 halos of 256 plus 1808 background, every tenth
/// particle gas.
pub fn reference_profile(seed: u64) -> Profile {
    clustered_profile(seed, 32, 256, 1808, 10)
}

/// ~100K particles: 256 halos of 384 plus 1696 background, every tenth
/// particle gas.
pub fn stress_profile(seed: u64) -> Profile {
    clustered_profile(seed, 256, 384, 1696, 10)
}

/// The reference kernel set.
pub fn reference_kernels() -> KernelSet {
    KernelSet {
        fof: Box::new(GridFof),
        substructure: Box::new(GridSubstructure::default()),
        inclusive_mass: Box::new(SphericalOverdensity),
        baryons: Box::new(NearestDarkMatter),
        hierarchy: Box::new(ParentLinkHierarchy),
        binding: Box::new(PotentialBindingSort),
    }
}

/// Simulation description matching the profiles.
pub fn bench_sim() -> SimInfo {
    SimInfo {
        period: BOX_SIZE,
        interparticle_spacing: 1.0,
        has_gas: true,
        ..SimInfo::default()
    }
}

/// Configuration for the profiles: physical linking length 0.1, every
/// optional stage on.
pub fn bench_config() -> RunConfig {
    RunConfig {
        linking_length: 0.1,
        min_size: 20,
        inclusive_halo: true,
        sub_search: true,
        baryon_mode: halo_core::BaryonMode::Substructure,
        ..RunConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_profile_counts_match() {
        let p = reference_profile(42);
        assert_eq!(p.particles.len(), 32 * 256 + 1808);
        assert_eq!(p.counts.num_gravity, p.particles.len());
        let gas = p
            .particles
            .iter()
            .filter(|s| s.tag == Species::GAS_TAG)
            .count();
        assert_eq!(p.counts.num_hydro, gas);
        assert!(p
            .particles
            .iter()
            .all(|s| s.position.iter().all(|&x| (0.0..BOX_SIZE).contains(&x))));
    }

    #[test]
    fn profiles_are_deterministic() {
        let a = clustered_profile(7, 2, 10, 5, 3);
        let b = clustered_profile(7, 2, 10, 5, 3);
        assert_eq!(a.particles, b.particles);
    }

    #[test]
    fn bench_config_validates() {
        let registry = halo_kernel::WriterRegistry::new()
            .with(halo_core::OutputFormat::Ascii, halo_kernels::AsciiWriter::factory());
        let mut config = bench_config();
        config.validate(&bench_sim(), &registry).unwrap();
    }
}
