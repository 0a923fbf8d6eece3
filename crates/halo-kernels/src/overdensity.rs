//! Spherical-overdensity masses of field halos.

use std::f64::consts::PI;

use halo_core::{GroupId, InclusiveMass, KernelError, Particle, PropBuffer};
use halo_kernel::{BucketedGroups, InclusiveMassKernel, KernelContext};
use rayon::prelude::*;
use tracing::debug;

/// Overdensity relative to critical for the `*_200crit` values.
const DELTA_CRIT: f64 = 200.0;

/// Grows spheres around each halo's centre of mass through its members.
///
/// The enclosed-mass profile uses the FOF members only. For each
/// threshold the outermost radius at which the mean enclosed density
/// still reaches it gives the mass and radius; thresholds are
/// `200 ρ_crit` and `virial_level ρ_bg`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SphericalOverdensity;

/// Mass-weighted centre, unwrapped around the first member.
pub(crate) fn centre_of_mass(members: &[Particle], period: f64) -> [f64; 3] {
    let Some(first) = members.first() else {
        return [0.0; 3];
    };
    let mut sum = [0.0; 3];
    let mut mass = 0.0;
    for p in members {
        for k in 0..3 {
            sum[k] += p.mass * unwrap(p.position[k] - first.position[k], period);
        }
        mass += p.mass;
    }
    let mut c = first.position;
    if mass > 0.0 {
        for k in 0..3 {
            c[k] += sum[k] / mass;
            if period > 0.0 {
                c[k] = c[k].rem_euclid(period);
            }
        }
    }
    c
}

fn unwrap(dx: f64, period: f64) -> f64 {
    if period > 0.0 {
        dx - period * (dx / period).round()
    } else {
        dx
    }
}

/// Outermost `(mass, radius)` where the mean enclosed density is at least
/// `threshold`. `profile` is sorted by radius.
fn enclosed_at(profile: &[(f64, f64)], threshold: f64) -> (f64, f64) {
    let mut best = (0.0, 0.0);
    let mut enclosed = 0.0;
    for &(r, m) in profile {
        enclosed += m;
        let volume = 4.0 / 3.0 * PI * r * r * r;
        if volume == 0.0 || enclosed / volume >= threshold {
            best = (enclosed, r);
        }
    }
    best
}

impl InclusiveMassKernel for SphericalOverdensity {
    fn name(&self) -> &str {
        "spherical_overdensity"
    }

    fn compute(
        &self,
        ctx: &KernelContext<'_>,
        groups: &BucketedGroups<'_>,
        halo_props: &mut PropBuffer,
    ) -> Result<(), KernelError> {
        let params = ctx.params();
        if halo_props.ngroups() < groups.nhalos {
            return Err(KernelError::LengthMismatch {
                what: "halo properties",
                expected: groups.nhalos,
                found: halo_props.ngroups(),
            });
        }
        let rho_200 = DELTA_CRIT * params.rho_critical;
        let rho_vir = params.virial_level * params.rho_background;
        let period = params.period;

        let masses: Vec<InclusiveMass> = ctx.install(|| {
            (1..=groups.nhalos)
                .into_par_iter()
                .map(|g| {
                    let members = groups.members(GroupId::from_index(g));
                    let centre = centre_of_mass(members, period);
                    let mut profile: Vec<(f64, f64)> = members
                        .iter()
                        .map(|p| {
                            let d2: f64 = (0..3)
                                .map(|k| unwrap(p.position[k] - centre[k], period).powi(2))
                                .sum();
                            (d2.sqrt(), p.mass)
                        })
                        .collect();
                    profile.sort_by(|a, b| a.0.total_cmp(&b.0));
                    let (mass_200crit, r_200crit) = enclosed_at(&profile, rho_200);
                    let (mass_virial, r_virial) = enclosed_at(&profile, rho_vir);
                    InclusiveMass {
                        mass_fof: members.iter().map(|p| p.mass).sum(),
                        mass_200crit,
                        r_200crit,
                        mass_virial,
                        r_virial,
                    }
                })
                .collect()
        });

        for (g, m) in masses.into_iter().enumerate() {
            if let Some(record) = halo_props.get_mut(GroupId::from_index(g + 1)) {
                record.inclusive = Some(m);
            }
        }
        debug!(nhalos = groups.nhalos, "spherical overdensity masses computed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halo_kernel::SearchParams;
    use rayon::ThreadPoolBuilder;

    fn at(x: f64, mass: f64) -> Particle {
        Particle {
            position: [x, 0.0, 0.0],
            mass,
            ..Particle::default()
        }
    }

    #[test]
    fn centre_wraps_periodic_box() {
        let ps = [at(9.9, 1.0), at(0.1, 1.0)];
        let c = centre_of_mass(&ps, 10.0);
        assert!(c[0].abs() < 1e-12 || (c[0] - 10.0).abs() < 1e-12);
        let c = centre_of_mass(&ps, 0.0);
        assert!((c[0] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn enclosed_profile_picks_outermost_radius() {
        let profile = [(0.0, 1.0), (1.0, 10.0), (2.0, 1.0)];
        // Density at r=1: 11 / 4.19 = 2.63; at r=2: 12 / 33.5 = 0.36.
        let (m, r) = enclosed_at(&profile, 1.0);
        assert_eq!((m, r), (11.0, 1.0));
        let (m, r) = enclosed_at(&profile, 0.1);
        assert_eq!((m, r), (12.0, 2.0));
    }

    #[test]
    fn fills_every_halo() {
        let particles = vec![at(0.0, 1.0), at(0.1, 2.0), at(5.0, 3.0), at(9.0, 4.0)];
        let membership = [GroupId(1), GroupId(1), GroupId(2), GroupId(0)];
        let counts = [1, 2, 1];
        let offsets = [3, 0, 2];
        let view = BucketedGroups {
            particles: &particles,
            membership: &membership,
            num_in_group: &counts,
            offsets: &offsets,
            nhalos: 2,
        };
        let params = SearchParams::default();
        let pool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let ctx = KernelContext::new(&params, &pool);
        let mut props = PropBuffer::new(2);
        SphericalOverdensity
            .compute(&ctx, &view, &mut props)
            .unwrap();
        let m1 = props.get(GroupId(1)).unwrap().inclusive.unwrap();
        assert_eq!(m1.mass_fof, 3.0);
        let m2 = props.get(GroupId(2)).unwrap().inclusive.unwrap();
        assert_eq!(m2.mass_fof, 3.0);
        assert_eq!(m2.r_virial, 0.0);
        assert_eq!(m2.mass_virial, 3.0);
    }
}
