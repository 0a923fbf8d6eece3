//! Recursive substructure search.
//!
//! Each group is searched again with a shorter linking length. The largest
//! component stays with the host; every other component with at least
//! `min_size` members becomes a new subgroup, which is then searched in
//! turn at the next level.

use std::collections::VecDeque;

use halo_core::{GroupId, GroupTable, KernelError, Membership, Particle, PropBuffer};
use halo_kernel::{KernelContext, SubstructureKernel};
use tracing::debug;

use crate::grid::link_members;

/// Friends-of-friends inside each group at `linking_length * scale^level`.
#[derive(Clone, Copy, Debug)]
pub struct GridSubstructure {
    /// Deepest level searched.
    pub max_depth: u32,
}

impl Default for GridSubstructure {
    fn default() -> Self {
        Self { max_depth: 3 }
    }
}

impl SubstructureKernel for GridSubstructure {
    fn name(&self) -> &str {
        "grid_substructure"
    }

    /// The halo property buffer, when given, is left untouched.
    fn search(
        &self,
        ctx: &KernelContext<'_>,
        particles: &[Particle],
        membership: &mut Membership,
        groups: &mut GroupTable,
        nhalos: usize,
        _halo_props: Option<&mut PropBuffer>,
    ) -> Result<(), KernelError> {
        if membership.len() != particles.len() {
            return Err(KernelError::LengthMismatch {
                what: "membership",
                expected: particles.len(),
                found: membership.len(),
            });
        }
        let params = ctx.params();
        let min_size = params.min_size.max(2);

        let mut members: Vec<Vec<usize>> = vec![Vec::new(); nhalos + 1];
        for (i, g) in membership.iter().enumerate() {
            if let Some(list) = members.get_mut(g.index()) {
                list.push(i);
            }
        }
        let mut queue: VecDeque<(GroupId, u32, Vec<usize>)> = members
            .into_iter()
            .enumerate()
            .skip(1)
            .map(|(g, list)| (GroupId::from_index(g), 1, list))
            .collect();

        let mut found = 0usize;
        while let Some((host, level, list)) = queue.pop_front() {
            if level > self.max_depth || list.len() < 2 * min_size {
                continue;
            }
            let ll = params.linking_length * params.sub_linking_scale.powi(level as i32);
            let mut sets = ctx.install(|| link_members(particles, &list, ll, params.period));
            let comps = sets.ranked_components(min_size);
            // comps[0] is the largest component and stays with the host.
            for slots in comps.into_iter().skip(1) {
                let comp: Vec<usize> = slots.into_iter().map(|slot| list[slot]).collect();
                let id = groups.push_subgroup(host);
                for &i in &comp {
                    membership.set(i, id);
                }
                found += 1;
                queue.push_back((id, level + 1, comp));
            }
        }
        debug!(nhalos, found, "grid substructure complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halo_core::ParticleId;
    use halo_kernel::SearchParams;
    use rayon::ThreadPoolBuilder;

    fn line(first: u64, x0: f64, n: usize, dx: f64) -> Vec<Particle> {
        (0..n)
            .map(|k| Particle {
                id: ParticleId(first + k as u64),
                position: [x0 + dx * k as f64, 0.0, 0.0],
                mass: 1.0,
                ..Particle::default()
            })
            .collect()
    }

    fn run(ps: &[Particle], m: &mut Membership, groups: &mut GroupTable, nhalos: usize) {
        let params = SearchParams {
            linking_length: 1.0,
            sub_linking_scale: 0.5,
            min_size: 3,
            ..SearchParams::default()
        };
        let pool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let ctx = KernelContext::new(&params, &pool);
        GridSubstructure::default()
            .search(&ctx, ps, m, groups, nhalos, None)
            .unwrap();
    }

    #[test]
    fn tight_clump_inside_halo_becomes_subgroup() {
        // Host core: 8 particles 0.4 apart. Clump: 4 particles 0.1 apart,
        // 0.8 beyond the core. Both link at 1.0; only each part at 0.5.
        let mut ps = line(0, 0.0, 8, 0.4);
        ps.extend(line(8, 3.6, 4, 0.1));
        let mut m = Membership::from_vec(vec![GroupId(1); ps.len()]);
        let mut groups = GroupTable::with_roots(1);
        run(&ps, &mut m, &mut groups, 1);

        assert_eq!(groups.ngroups(), 2);
        assert_eq!(groups.parent(GroupId(2)), Some(GroupId(1)));
        assert!(m.as_slice()[..8].iter().all(|g| *g == GroupId(1)));
        assert!(m.as_slice()[8..].iter().all(|g| *g == GroupId(2)));
    }

    #[test]
    fn uniform_halo_has_no_substructure() {
        let ps = line(0, 0.0, 12, 0.1);
        let mut m = Membership::from_vec(vec![GroupId(1); ps.len()]);
        let mut groups = GroupTable::with_roots(1);
        run(&ps, &mut m, &mut groups, 1);
        assert_eq!(groups.ngroups(), 1);
    }

    #[test]
    fn surrounding_field_particles_do_not_change_the_result() {
        let mut ps = line(0, 0.0, 8, 0.4);
        ps.extend(line(8, 3.6, 4, 0.1));
        let mut m = Membership::from_vec(vec![GroupId(1); ps.len()]);
        let mut groups = GroupTable::with_roots(1);
        run(&ps, &mut m, &mut groups, 1);

        // Same halo, preceded by a large field far away.
        let mut padded = line(1_000, 500.0, 50_000, 0.01);
        let offset = padded.len();
        padded.extend(ps.iter().copied());
        let mut labels = vec![GroupId::FIELD; offset];
        labels.extend(vec![GroupId(1); ps.len()]);
        let mut padded_m = Membership::from_vec(labels);
        let mut padded_groups = GroupTable::with_roots(1);
        run(&padded, &mut padded_m, &mut padded_groups, 1);

        assert_eq!(padded_groups.ngroups(), groups.ngroups());
        assert_eq!(&padded_m.as_slice()[offset..], m.as_slice());
        assert!(padded_m.as_slice()[..offset].iter().all(|g| g.is_field()));
    }

    #[test]
    fn field_particles_are_not_searched() {
        let ps = line(0, 0.0, 10, 0.1);
        let mut m = Membership::new(ps.len());
        let mut groups = GroupTable::with_roots(0);
        run(&ps, &mut m, &mut groups, 0);
        assert_eq!(groups.ngroups(), 0);
        assert_eq!(m.max_group(), GroupId::FIELD);
    }
}
