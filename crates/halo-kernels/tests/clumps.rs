//! Reference kernels chained on seeded clumps.

use halo_core::{
    GroupId, GroupTable, Membership, Particle, ParticleId, PropBuffer, SourceParticle, Species,
};
use halo_kernel::{BindingEnergySort, FofKernel, HierarchyBuilder, KernelContext, SearchParams};
use halo_kernels::{GridFof, ParentLinkHierarchy, PotentialBindingSort};
use halo_test_utils::clump;
use rayon::ThreadPoolBuilder;

fn dark(sources: &[SourceParticle]) -> Vec<Particle> {
    sources
        .iter()
        .map(|s| Particle::from_source(s, Species::DarkMatter))
        .collect()
}

fn params(period: f64) -> SearchParams {
    SearchParams {
        linking_length: 0.2,
        halo_min_size: 20,
        min_size: 20,
        period,
        softening: 0.01,
        ..SearchParams::default()
    }
}

fn two_clumps() -> Vec<Particle> {
    let mut sources = clump(1, [2.0, 2.0, 2.0], 200, 0.25, 1, 0);
    sources.extend(clump(2, [6.0, 6.0, 6.0], 160, 0.2, 1, 200));
    let mut particles = dark(&sources);
    // Stragglers far from both clumps.
    for (k, position) in [[4.0, 8.0, 1.0], [8.0, 1.0, 4.0]].into_iter().enumerate() {
        particles.push(Particle {
            id: ParticleId(1000 + k as u64),
            position,
            ..particles[0]
        });
    }
    particles
}

#[test]
fn clumps_become_halos_largest_first() {
    let particles = two_clumps();
    let p = params(0.0);
    let pool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();
    let ctx = KernelContext::new(&p, &pool);

    let fof = GridFof.search(&ctx, &particles).unwrap();
    assert_eq!(fof.ngroups, 2);
    let counts = fof.membership.num_in_group(2);
    assert_eq!(counts, vec![2, 200, 160]);
    for (p, g) in particles.iter().zip(fof.membership.iter()) {
        let expected = match p.id.0 {
            0..=199 => GroupId(1),
            200..=359 => GroupId(2),
            _ => GroupId::FIELD,
        };
        assert_eq!(g, expected, "particle {}", p.id);
    }
}

#[test]
fn periodic_clump_across_the_boundary_is_one_halo() {
    let mut particles = dark(&clump(9, [0.0, 5.0, 5.0], 200, 0.25, 1, 0));
    for p in &mut particles {
        p.position[0] = p.position[0].rem_euclid(10.0);
    }
    assert!(particles.iter().any(|p| p.position[0] > 9.0));
    let p = params(10.0);
    let pool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();
    let ctx = KernelContext::new(&p, &pool);

    let fof = GridFof.search(&ctx, &particles).unwrap();
    assert_eq!(fof.ngroups, 1);
    assert!(fof.membership.iter().all(|g| g == GroupId(1)));
}

#[test]
fn binding_order_after_fof_is_contiguous_and_ordered() {
    let mut particles = two_clumps();
    let p = params(0.0);
    let pool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();
    let ctx = KernelContext::new(&p, &pool);

    let fof = GridFof.search(&ctx, &particles).unwrap();
    let mut membership: Membership = fof.membership;
    let groups = GroupTable::with_roots(fof.ngroups);
    let hierarchy = ParentLinkHierarchy.build(&ctx, &groups).unwrap();
    assert_eq!(hierarchy.num_roots(), 2);

    let counts = membership.num_in_group(fof.ngroups);
    let mut props = PropBuffer::new(fof.ngroups);
    let lists = PotentialBindingSort
        .sort(&ctx, &mut particles, &mut membership, &counts, &mut props)
        .unwrap();

    assert_eq!(lists.total_particles(), 360);
    let mut next = 0;
    for (g, list) in lists.iter() {
        assert!(list.is_energy_ordered());
        assert_eq!(list.indices, (next..next + list.len()).collect::<Vec<_>>());
        next += list.len();
        for &i in &list.indices {
            assert_eq!(membership.get(i), g);
        }
        let record = props.get(g).unwrap();
        assert_eq!(record.num_particles, list.len());
        assert_eq!(record.mass, list.len() as f64);
    }
    // The most bound member of the first halo sits near its centre.
    let core = &particles[lists.get(GroupId(1)).unwrap().indices[0]];
    for k in 0..3 {
        assert!((core.position[k] - 2.0).abs() < 0.25);
    }
    assert!(membership.as_slice()[360..].iter().all(|g| g.is_field()));
}
