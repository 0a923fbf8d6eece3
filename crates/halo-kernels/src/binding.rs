//! Binding-energy ordering of group members.

use halo_arena::Permutation;
use halo_core::{
    GroupId, GroupParticleList, GroupParticleLists, KernelError, Membership, Particle, PropBuffer,
};
use halo_kernel::{BindingEnergySort, KernelContext};
use rayon::prelude::*;
use tracing::debug;

use crate::overdensity::centre_of_mass;

/// Orders each group by specific binding energy, most bound first.
///
/// The energy of a member is its potential plus its kinetic energy
/// relative to the group's bulk velocity. The host-supplied potential is
/// used when present; otherwise a softened direct sum over the group's
/// members. On return the particles are grouped contiguously (group 1
/// first, field last) and the membership is reordered with them.
#[derive(Clone, Copy, Debug, Default)]
pub struct PotentialBindingSort;

struct OrderedGroup {
    members: Vec<usize>,
    energies: Vec<f64>,
    mass: f64,
    centre: [f64; 3],
    bulk: [f64; 3],
}

fn direct_potential(
    particles: &[Particle],
    members: &[usize],
    i: usize,
    gravity: f64,
    softening: f64,
    period: f64,
) -> f64 {
    let eps2 = softening * softening;
    let p = &particles[i];
    let mut phi = 0.0;
    for &j in members {
        if j == i {
            continue;
        }
        let r2 = p.distance2(&particles[j], period) + eps2;
        if r2 > 0.0 {
            phi -= gravity * particles[j].mass / r2.sqrt();
        }
    }
    phi
}

fn order_group(
    particles: &[Particle],
    members: &[usize],
    gravity: f64,
    softening: f64,
    period: f64,
) -> OrderedGroup {
    let local: Vec<Particle> = members.iter().map(|&i| particles[i]).collect();
    let mass: f64 = local.iter().map(|p| p.mass).sum();
    let mut bulk = [0.0; 3];
    if mass > 0.0 {
        for p in &local {
            for k in 0..3 {
                bulk[k] += p.mass * p.velocity[k] / mass;
            }
        }
    }
    let mut ranked: Vec<(f64, usize)> = members
        .iter()
        .map(|&i| {
            let p = &particles[i];
            let phi = p.potential.unwrap_or_else(|| {
                direct_potential(particles, members, i, gravity, softening, period)
            });
            (phi + p.kinetic_energy(bulk), i)
        })
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    OrderedGroup {
        members: ranked.iter().map(|&(_, i)| i).collect(),
        energies: ranked.iter().map(|&(e, _)| e).collect(),
        mass,
        centre: centre_of_mass(&local, period),
        bulk,
    }
}

fn reorder_failed(e: impl std::fmt::Display) -> KernelError {
    KernelError::ExecutionFailed {
        reason: format!("binding reorder: {e}"),
    }
}

impl BindingEnergySort for PotentialBindingSort {
    fn name(&self) -> &str {
        "potential_binding_sort"
    }

    fn sort(
        &self,
        ctx: &KernelContext<'_>,
        particles: &mut [Particle],
        membership: &mut Membership,
        num_in_group: &[usize],
        props: &mut PropBuffer,
    ) -> Result<GroupParticleLists, KernelError> {
        let n = particles.len();
        if membership.len() != n {
            return Err(KernelError::LengthMismatch {
                what: "membership",
                expected: n,
                found: membership.len(),
            });
        }
        let ngroups = props.ngroups();
        if num_in_group.len() != ngroups + 1 {
            return Err(KernelError::LengthMismatch {
                what: "num_in_group",
                expected: ngroups + 1,
                found: num_in_group.len(),
            });
        }

        let mut buckets: Vec<Vec<usize>> = num_in_group.iter().map(|&c| Vec::with_capacity(c)).collect();
        for (i, g) in membership.iter().enumerate() {
            match buckets.get_mut(g.index()) {
                Some(b) => b.push(i),
                None => {
                    return Err(KernelError::ExecutionFailed {
                        reason: format!("group {g} exceeds group count {ngroups}"),
                    })
                }
            }
        }
        if let Some(g) = (1..=ngroups).find(|&g| buckets[g].len() != num_in_group[g]) {
            return Err(KernelError::ExecutionFailed {
                reason: format!(
                    "group {g} has {} members, counts say {}",
                    buckets[g].len(),
                    num_in_group[g]
                ),
            });
        }

        let params = ctx.params();
        let (gravity, softening, period) = (params.gravity, params.softening, params.period);
        let view: &[Particle] = particles;
        let ordered: Vec<OrderedGroup> = ctx.install(|| {
            buckets[1..]
                .par_iter()
                .map(|members| order_group(view, members, gravity, softening, period))
                .collect()
        });

        let mut order = Vec::with_capacity(n);
        let mut lists = GroupParticleLists::new(ngroups);
        for (g, group) in ordered.into_iter().enumerate() {
            let id = GroupId::from_index(g + 1);
            let start = order.len();
            order.extend_from_slice(&group.members);
            lists.set(
                id,
                GroupParticleList {
                    indices: (start..order.len()).collect(),
                    energies: group.energies,
                },
            );
            if let Some(record) = props.get_mut(id) {
                record.num_particles = group.members.len();
                record.mass = group.mass;
                record.center_of_mass = group.centre;
                record.bulk_velocity = group.bulk;
            }
        }
        order.extend_from_slice(&buckets[0]);

        let perm = Permutation::from_order(order).map_err(reorder_failed)?;
        perm.apply(particles).map_err(reorder_failed)?;
        perm.apply(membership.as_mut_slice())
            .map_err(reorder_failed)?;
        debug!(ngroups, grouped = n - buckets[0].len(), "binding order built");
        Ok(lists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halo_core::ParticleId;
    use halo_kernel::SearchParams;
    use rayon::ThreadPoolBuilder;

    fn particle(id: u64, x: f64, vx: f64) -> Particle {
        Particle {
            id: ParticleId(id),
            position: [x, 0.0, 0.0],
            velocity: [vx, 0.0, 0.0],
            mass: 1.0,
            ..Particle::default()
        }
    }

    fn sort(
        particles: &mut [Particle],
        membership: &mut Membership,
        ngroups: usize,
    ) -> (GroupParticleLists, PropBuffer) {
        let params = SearchParams {
            softening: 0.01,
            ..SearchParams::default()
        };
        let pool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let ctx = KernelContext::new(&params, &pool);
        let counts = membership.num_in_group(ngroups);
        let mut props = PropBuffer::new(ngroups);
        let lists = PotentialBindingSort
            .sort(&ctx, particles, membership, &counts, &mut props)
            .unwrap();
        (lists, props)
    }

    #[test]
    fn centre_is_most_bound() {
        // Group 1 is a line of five; the middle particle is most bound.
        let mut ps: Vec<Particle> = (0..5).map(|k| particle(k, k as f64, 0.0)).collect();
        ps.push(particle(99, 50.0, 0.0));
        let mut m = Membership::from_vec(vec![
            GroupId(1),
            GroupId(1),
            GroupId(1),
            GroupId(1),
            GroupId(1),
            GroupId(0),
        ]);
        let (lists, props) = sort(&mut ps, &mut m, 1);
        let list = lists.get(GroupId(1)).unwrap();
        assert!(list.is_energy_ordered());
        assert_eq!(ps[list.indices[0]].id, ParticleId(2));
        assert_eq!(ps[5].id, ParticleId(99));
        assert_eq!(m.get(5), GroupId::FIELD);

        let record = props.get(GroupId(1)).unwrap();
        assert_eq!(record.num_particles, 5);
        assert_eq!(record.mass, 5.0);
        assert!((record.center_of_mass[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn host_potential_is_used_when_present() {
        let mut ps: Vec<Particle> = (0..3)
            .map(|k| Particle {
                potential: Some(-(k as f64)),
                ..particle(k, 0.0, 0.0)
            })
            .collect();
        let mut m = Membership::from_vec(vec![GroupId(1); 3]);
        let (lists, _) = sort(&mut ps, &mut m, 1);
        let ids: Vec<u64> = lists
            .get(GroupId(1))
            .unwrap()
            .indices
            .iter()
            .map(|&i| ps[i].id.0)
            .collect();
        assert_eq!(ids, vec![2, 1, 0]);
    }

    #[test]
    fn fast_particles_are_less_bound() {
        let mut ps = vec![particle(0, 0.0, 10.0), particle(1, 0.1, 0.0), particle(2, 0.2, -10.0)];
        let mut m = Membership::from_vec(vec![GroupId(1); 3]);
        let (lists, _) = sort(&mut ps, &mut m, 1);
        assert_eq!(ps[lists.get(GroupId(1)).unwrap().indices[0]].id, ParticleId(1));
    }

    #[test]
    fn membership_moves_with_particles() {
        let mut ps: Vec<Particle> = (0..6).map(|k| particle(k, k as f64 * 0.1, 0.0)).collect();
        let labels = [2u64, 1, 0, 2, 1, 2];
        let mut m = Membership::from_vec(labels.iter().map(|&g| GroupId(g)).collect());
        let (lists, _) = sort(&mut ps, &mut m, 2);
        for (g, list) in lists.iter() {
            for &i in &list.indices {
                assert_eq!(m.get(i), g);
                assert_eq!(GroupId(labels[ps[i].id.0 as usize]), g);
            }
        }
        assert_eq!(lists.total_particles(), 5);
        assert_eq!(ps[5].id, ParticleId(2));
    }

    #[test]
    fn counts_must_match_membership() {
        let params = SearchParams::default();
        let pool = ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let ctx = KernelContext::new(&params, &pool);
        let mut ps = vec![particle(0, 0.0, 0.0)];
        let mut m = Membership::from_vec(vec![GroupId(1)]);
        let mut props = PropBuffer::new(1);
        let err = PotentialBindingSort.sort(&ctx, &mut ps, &mut m, &[0, 2], &mut props);
        assert!(matches!(err, Err(KernelError::ExecutionFailed { .. })));
    }
}
