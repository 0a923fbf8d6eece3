//! Group membership map and the group parent table.

use crate::id::GroupId;

/// Per-particle group membership (the `pfof` array).
///
/// Index `i` holds the group of the particle currently stored at slot `i`
/// of the particle array. The correspondence is positional: any stage that
/// reorders particles must reorder this map in lock-step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Membership {
    groups: Vec<GroupId>,
}

impl Membership {
    /// A membership map of `len` field particles.
    pub fn new(len: usize) -> Self {
        Self {
            groups: vec![GroupId::FIELD; len],
        }
    }

    /// Wrap an existing group vector.
    pub fn from_vec(groups: Vec<GroupId>) -> Self {
        Self { groups }
    }

    /// Number of particles covered.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the map covers zero particles.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Group of the particle at `index`.
    pub fn get(&self, index: usize) -> GroupId {
        self.groups[index]
    }

    /// Assign the particle at `index` to `group`.
    pub fn set(&mut self, index: usize, group: GroupId) {
        self.groups[index] = group;
    }

    /// Read-only view of the map.
    pub fn as_slice(&self) -> &[GroupId] {
        &self.groups
    }

    /// Mutable view of the map.
    pub fn as_mut_slice(&mut self) -> &mut [GroupId] {
        &mut self.groups
    }

    /// Mutable access to the backing vector, for stages that permute it.
    pub fn as_mut_vec(&mut self) -> &mut Vec<GroupId> {
        &mut self.groups
    }

    /// Consume the map and return the backing vector.
    pub fn into_vec(self) -> Vec<GroupId> {
        self.groups
    }

    /// Iterate over group ids in particle order.
    pub fn iter(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.groups.iter().copied()
    }

    /// Largest group id present, or the field id for an empty/all-field map.
    pub fn max_group(&self) -> GroupId {
        self.groups.iter().copied().max().unwrap_or(GroupId::FIELD)
    }

    /// Number of particles in each group.
    ///
    /// The result has `ngroups + 1` entries; entry 0 counts field
    /// particles. Ids above `ngroups` are not counted; callers check
    /// [`max_group`](Self::max_group) first.
    pub fn num_in_group(&self, ngroups: usize) -> Vec<usize> {
        let mut counts = vec![0usize; ngroups + 1];
        for g in &self.groups {
            if let Some(c) = counts.get_mut(g.index()) {
                *c += 1;
            }
        }
        counts
    }
}

/// Sort key that produces the group-bucketed ordering.
///
/// Groups sort by id; the field sorts after every possible group id.
pub fn bucket_key(group: GroupId) -> usize {
    if group.is_field() {
        usize::MAX
    } else {
        group.index()
    }
}

/// Offsets of each group's contiguous block in a group-bucketed ordering.
///
/// The bucketed ordering places group 1 first, then group 2, and so on,
/// with field particles last. `counts` is the output of
/// [`Membership::num_in_group`]; the result has the same length, entry 0
/// holding the offset of the field block.
pub fn bucket_offsets(counts: &[usize]) -> Vec<usize> {
    let mut offsets = vec![0usize; counts.len()];
    let mut running = 0usize;
    for g in 1..counts.len() {
        offsets[g] = running;
        running += counts[g];
    }
    if !offsets.is_empty() {
        offsets[0] = running;
    }
    offsets
}

/// Parent links for every group found so far.
///
/// Slot 0 is reserved. The full-set search creates one root entry per
/// halo; the substructure search appends subgroups with their parent.
/// The number of entries (minus the reserved slot) is the authoritative
/// group count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupTable {
    parents: Vec<Option<GroupId>>,
}

impl GroupTable {
    /// A table of `nhalos` root groups.
    pub fn with_roots(nhalos: usize) -> Self {
        Self {
            parents: vec![None; nhalos + 1],
        }
    }

    /// Number of groups (excluding the reserved slot).
    pub fn ngroups(&self) -> usize {
        self.parents.len() - 1
    }

    /// Parent of `group`, or `None` for roots and unknown ids.
    pub fn parent(&self, group: GroupId) -> Option<GroupId> {
        self.parents.get(group.index()).copied().flatten()
    }

    /// Override the parent link of an existing group.
    pub fn set_parent(&mut self, group: GroupId, parent: Option<GroupId>) {
        if let Some(slot) = self.parents.get_mut(group.index()) {
            *slot = parent;
        }
    }

    /// Append a new subgroup of `parent` and return its id.
    pub fn push_subgroup(&mut self, parent: GroupId) -> GroupId {
        self.parents.push(Some(parent));
        GroupId::from_index(self.parents.len() - 1)
    }

    /// Iterate over `(group, parent)` for every real group.
    pub fn iter(&self) -> impl Iterator<Item = (GroupId, Option<GroupId>)> + '_ {
        self.parents
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, p)| (GroupId::from_index(i), *p))
    }
}

impl Default for GroupTable {
    fn default() -> Self {
        Self::with_roots(0)
    }
}
