//! Friends-of-friends over a uniform cell grid.

use halo_core::{GroupId, KernelError, Membership, Particle, Species};
use halo_kernel::{FofKernel, FofResult, KernelContext};
use tracing::debug;

use crate::grid::link_members;

/// Links every pair of searched particles closer than the physical
/// linking length.
///
/// Which species take part is set by the search type; the rest stay in
/// the field. Groups smaller than the halo minimum size (and single
/// particles) are dropped. Ids are assigned by decreasing size.
#[derive(Clone, Copy, Debug, Default)]
pub struct GridFof;

impl FofKernel for GridFof {
    fn name(&self) -> &str {
        "grid_fof"
    }

    fn search(
        &self,
        ctx: &KernelContext<'_>,
        particles: &[Particle],
    ) -> Result<FofResult, KernelError> {
        let params = ctx.params();
        let mut searched = Vec::with_capacity(particles.len());
        for (i, p) in particles.iter().enumerate() {
            match p.species {
                Species::DarkMatter | Species::Gas => {}
                Species::Star | Species::BlackHole => {
                    return Err(KernelError::UnsupportedSpecies {
                        index: i,
                        species: p.species,
                    })
                }
            }
            if params.search_type.links(p.species) {
                searched.push(i);
            }
        }

        let mut sets = ctx.install(|| {
            link_members(particles, &searched, params.linking_length, params.period)
        });
        let groups = sets.ranked_components(params.halo_min_size.max(2));

        let mut membership = Membership::new(particles.len());
        for (g, slots) in groups.iter().enumerate() {
            let id = GroupId::from_index(g + 1);
            for &slot in slots {
                membership.set(searched[slot], id);
            }
        }
        debug!(
            searched = searched.len(),
            ngroups = groups.len(),
            "grid fof linked"
        );
        Ok(FofResult {
            membership,
            ngroups: groups.len(),
        })
    }
}
