//! Disjoint-set forest over member slots.

use indexmap::IndexMap;

pub(crate) struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.parent.len()
    }

    pub(crate) fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets of `a` and `b`; returns whether they were distinct.
    pub(crate) fn union(&mut self, a: usize, b: usize) -> bool {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
        true
    }

    /// Merge every link recorded in `other`, a forest over the same slots.
    pub(crate) fn absorb(&mut self, other: &DisjointSet) {
        debug_assert_eq!(self.len(), other.len());
        for (x, &p) in other.parent.iter().enumerate() {
            if p != x {
                self.union(x, p);
            }
        }
    }

    /// Sets with at least `min_size` elements, largest first. Ties go to
    /// the set whose lowest slot comes first; slots are ascending within a
    /// set.
    pub(crate) fn ranked_components(&mut self, min_size: usize) -> Vec<Vec<usize>> {
        let mut by_root: IndexMap<usize, Vec<usize>> = IndexMap::new();
        for x in 0..self.len() {
            let r = self.find(x);
            by_root.entry(r).or_default().push(x);
        }
        let mut comps: Vec<Vec<usize>> = by_root
            .into_values()
            .filter(|c| c.len() >= min_size)
            .collect();
        // Stable: equal sizes keep first-seen order.
        comps.sort_by(|a, b| b.len().cmp(&a.len()));
        comps
    }
}
