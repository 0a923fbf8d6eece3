//! Uniform cell grid for fixed-radius neighbour queries.
//!
//! Cells are at least one search radius wide, so every pair within the
//! radius lies in the same or an adjacent cell. Periodic boxes wrap cell
//! keys; open volumes use unbounded keys.

use halo_core::Particle;
use indexmap::IndexMap;
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::union_find::DisjointSet;

type CellKey = [i64; 3];

/// Cells hold slots, i.e. positions in the `members` list the grid was
/// built from, never raw particle indices.
pub(crate) struct CellGrid {
    width: f64,
    /// Cells per axis for periodic boxes.
    wrap: Option<i64>,
    cells: IndexMap<CellKey, Vec<usize>>,
}

impl CellGrid {
    /// Grid over `members` (indices into `particles`) for search radius
    /// `radius`. Returns `None` when the radius is not positive.
    pub(crate) fn build(
        particles: &[Particle],
        members: &[usize],
        radius: f64,
        period: f64,
    ) -> Option<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return None;
        }
        let (width, wrap) = if period > 0.0 {
            let n = ((period / radius).floor() as i64).max(1);
            (period / n as f64, Some(n))
        } else {
            (radius, None)
        };
        let mut grid = Self {
            width,
            wrap,
            cells: IndexMap::new(),
        };
        for (slot, &i) in members.iter().enumerate() {
            let key = grid.key(&particles[i].position);
            grid.cells.entry(key).or_default().push(slot);
        }
        Some(grid)
    }

    pub(crate) fn key(&self, position: &[f64; 3]) -> CellKey {
        let mut key = [0i64; 3];
        for k in 0..3 {
            let c = (position[k] / self.width).floor() as i64;
            key[k] = match self.wrap {
                Some(n) => c.rem_euclid(n),
                None => c,
            };
        }
        key
    }

    /// The cell itself and its (up to) 26 neighbours, without repeats.
    pub(crate) fn neighbour_cells(&self, key: CellKey) -> SmallVec<[CellKey; 27]> {
        let mut out: SmallVec<[CellKey; 27]> = SmallVec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let mut nk = [key[0] + dx, key[1] + dy, key[2] + dz];
                    if let Some(n) = self.wrap {
                        for c in &mut nk {
                            *c = c.rem_euclid(n);
                        }
                    }
                    if !out.contains(&nk) {
                        out.push(nk);
                    }
                }
            }
        }
        out
    }

    /// Slots stored in the cells around `position`.
    pub(crate) fn candidates<'g>(
        &'g self,
        position: &[f64; 3],
    ) -> impl Iterator<Item = usize> + 'g {
        self.neighbour_cells(self.key(position))
            .into_iter()
            .filter_map(move |k| self.cells.get(&k))
            .flat_map(|v| v.iter().copied())
    }
}

/// Friends-of-friends links among `members` at `radius`.
///
/// The returned set is indexed by slot: element `k` stands for
/// `members[k]`. Pairs are merged as they are found, so memory is linear in
/// `members.len()` however dense the particles are. Each worker of the
/// current rayon pool links one contiguous run of slots into its own set;
/// the partial sets are merged at the end.
pub(crate) fn link_members(
    particles: &[Particle],
    members: &[usize],
    radius: f64,
    period: f64,
) -> DisjointSet {
    let n = members.len();
    let Some(grid) = CellGrid::build(particles, members, radius, period) else {
        return DisjointSet::new(n);
    };
    let r2 = radius * radius;
    let chunk = n.div_ceil(rayon::current_num_threads().max(1)).max(1);
    members
        .par_chunks(chunk)
        .enumerate()
        .map(|(c, run)| {
            let mut sets = DisjointSet::new(n);
            for (offset, &i) in run.iter().enumerate() {
                let slot = c * chunk + offset;
                let p = &particles[i];
                for other in grid.candidates(&p.position) {
                    if other > slot && p.distance2(&particles[members[other]], period) <= r2 {
                        sets.union(slot, other);
                    }
                }
            }
            sets
        })
        .reduce_with(|mut a, b| {
            a.absorb(&b);
            a
        })
        .unwrap_or_else(|| DisjointSet::new(n))
}
