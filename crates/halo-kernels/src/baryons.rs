//! Baryon association by nearest grouped dark matter particle.

use halo_core::{BaryonMode, GroupId, KernelError, Particle, Species};
use halo_kernel::{BaryonKernel, BaryonSearch, KernelContext};
use rayon::prelude::*;
use tracing::debug;

use crate::grid::CellGrid;

/// Gives each baryon the group of its nearest grouped dark matter
/// particle within the linking length.
///
/// A baryon with no such neighbour keeps its label under
/// [`BaryonMode::Substructure`] and is returned to the field under
/// [`BaryonMode::SubstructureAndField`].
#[derive(Clone, Copy, Debug, Default)]
pub struct NearestDarkMatter;

impl NearestDarkMatter {
    /// Indices of dark matter and baryons in `search.membership` order.
    fn populations(search: &BaryonSearch<'_>) -> Result<(Vec<usize>, Vec<usize>), KernelError> {
        match search.baryons {
            Some(baryons) => {
                let (ndark, nbaryons) = (search.reference.len(), baryons.len());
                if ndark != search.ndark {
                    return Err(KernelError::LengthMismatch {
                        what: "dark matter region",
                        expected: search.ndark,
                        found: ndark,
                    });
                }
                if nbaryons != search.nbaryons {
                    return Err(KernelError::LengthMismatch {
                        what: "baryon region",
                        expected: search.nbaryons,
                        found: nbaryons,
                    });
                }
                if search.membership.len() < ndark + nbaryons {
                    return Err(KernelError::LengthMismatch {
                        what: "membership",
                        expected: ndark + nbaryons,
                        found: search.membership.len(),
                    });
                }
                Ok(((0..ndark).collect(), (ndark..ndark + nbaryons).collect()))
            }
            None => {
                if search.membership.len() != search.reference.len() {
                    return Err(KernelError::LengthMismatch {
                        what: "membership",
                        expected: search.reference.len(),
                        found: search.membership.len(),
                    });
                }
                let mut dark = Vec::with_capacity(search.ndark);
                let mut gas = Vec::with_capacity(search.nbaryons);
                for (i, p) in search.reference.iter().enumerate() {
                    match p.species {
                        Species::DarkMatter => dark.push(i),
                        Species::Gas => gas.push(i),
                        Species::Star | Species::BlackHole => {
                            return Err(KernelError::UnsupportedSpecies {
                                index: i,
                                species: p.species,
                            })
                        }
                    }
                }
                Ok((dark, gas))
            }
        }
    }
}

impl BaryonKernel for NearestDarkMatter {
    fn name(&self) -> &str {
        "nearest_dark_matter"
    }

    fn associate(
        &self,
        ctx: &KernelContext<'_>,
        search: BaryonSearch<'_>,
    ) -> Result<(), KernelError> {
        let params = ctx.params();
        let (dark, baryons) = Self::populations(&search)?;

        // One array indexable by membership position.
        let all: Vec<Particle> = match search.baryons {
            Some(b) => search.reference.iter().chain(b.iter()).copied().collect(),
            None => search.reference.to_vec(),
        };
        let grouped: Vec<usize> = dark
            .into_iter()
            .filter(|&i| !search.membership.get(i).is_field())
            .collect();
        let period = params.period;
        let ll = params.linking_length;
        let r2 = ll * ll;

        let nearest: Vec<Option<GroupId>> = match CellGrid::build(&all, &grouped, ll, period) {
            Some(grid) => {
                let membership = &*search.membership;
                ctx.install(|| {
                    baryons
                        .par_iter()
                        .map(|&b| {
                            let p = &all[b];
                            grid.candidates(&p.position)
                                .map(|slot| grouped[slot])
                                .map(|d| (p.distance2(&all[d], period), d))
                                .filter(|(d2, _)| *d2 <= r2)
                                .min_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)))
                                .map(|(_, d)| membership.get(d))
                        })
                        .collect()
                })
            }
            None => vec![None; baryons.len()],
        };

        let mut assigned = 0usize;
        for (&b, group) in baryons.iter().zip(nearest) {
            match (group, params.baryon_mode) {
                (Some(g), _) => {
                    search.membership.set(b, g);
                    assigned += 1;
                }
                (None, BaryonMode::SubstructureAndField) => {
                    search.membership.set(b, GroupId::FIELD);
                }
                (None, BaryonMode::Substructure | BaryonMode::Off) => {}
            }
        }
        debug!(
            baryons = baryons.len(),
            assigned,
            ngroups = search.ngroups,
            "baryons associated"
        );
        Ok(())
    }
}
