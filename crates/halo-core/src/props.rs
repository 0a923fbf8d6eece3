//! Per-group property records and binding-ordered particle lists.

use serde::{Deserialize, Serialize};

use crate::hierarchy::{HierarchyEntry, StructureKind};
use crate::id::GroupId;

/// Aperture masses for a top-level halo.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InclusiveMass {
    /// Total mass of the FOF members.
    pub mass_fof: f64,
    /// Mass enclosed within `r_200crit`.
    pub mass_200crit: f64,
    /// Radius where the enclosed density falls to 200 times critical.
    pub r_200crit: f64,
    /// Mass enclosed within `r_virial`.
    pub mass_virial: f64,
    /// Radius where the enclosed density falls to the virial level.
    pub r_virial: f64,
}

/// Derived properties for one group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropData {
    /// Number of member particles.
    pub num_particles: usize,
    /// Total member mass.
    pub mass: f64,
    /// Mass-weighted centre.
    pub center_of_mass: [f64; 3],
    /// Mass-weighted mean velocity.
    pub bulk_velocity: [f64; 3],
    /// Inclusive (aperture) masses, for halos when requested.
    pub inclusive: Option<InclusiveMass>,
    /// Number of direct subgroups.
    pub num_subgroups: usize,
    /// Immediate parent, `None` for field halos.
    pub parent: Option<GroupId>,
    /// Top-level field halo.
    pub top_parent: GroupId,
    /// Structural type.
    pub kind: StructureKind,
}

impl Default for PropData {
    fn default() -> Self {
        Self {
            num_particles: 0,
            mass: 0.0,
            center_of_mass: [0.0; 3],
            bulk_velocity: [0.0; 3],
            inclusive: None,
            num_subgroups: 0,
            parent: None,
            top_parent: GroupId::FIELD,
            kind: StructureKind::FieldHalo,
        }
    }
}

impl PropData {
    /// Copy hierarchy links from a hierarchy record.
    pub fn set_hierarchy(&mut self, entry: &HierarchyEntry) {
        self.num_subgroups = entry.num_subgroups();
        self.parent = entry.parent;
        self.top_parent = entry.top_parent;
        self.kind = entry.kind;
    }
}

/// Property records for `ngroups` groups, indexed by group id.
///
/// Slot 0 exists but is never populated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropBuffer {
    records: Vec<PropData>,
}

impl PropBuffer {
    /// Allocate `ngroups + 1` default records.
    pub fn new(ngroups: usize) -> Self {
        Self {
            records: vec![PropData::default(); ngroups + 1],
        }
    }

    /// Number of groups covered.
    pub fn ngroups(&self) -> usize {
        self.records.len().saturating_sub(1)
    }

    /// Record for `group`.
    pub fn get(&self, group: GroupId) -> Option<&PropData> {
        if group.is_field() {
            return None;
        }
        self.records.get(group.index())
    }

    /// Mutable record for `group`.
    pub fn get_mut(&mut self, group: GroupId) -> Option<&mut PropData> {
        if group.is_field() {
            return None;
        }
        self.records.get_mut(group.index())
    }

    /// Iterate over `(group, record)` for every real group.
    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &PropData)> + '_ {
        self.records
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, r)| (GroupId::from_index(i), r))
    }

    /// Copy inclusive masses for halos `1..=nhalos` from a halo-only buffer.
    pub fn copy_inclusive_from(&mut self, halos: &PropBuffer, nhalos: usize) {
        for g in 1..=nhalos.min(halos.ngroups()).min(self.ngroups()) {
            self.records[g].inclusive = halos.records[g].inclusive;
        }
    }
}

/// Member indices of one group, most bound first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupParticleList {
    /// Indices into the particle array.
    pub indices: Vec<usize>,
    /// Binding energy of each listed particle, same order as `indices`.
    pub energies: Vec<f64>,
}

impl GroupParticleList {
    /// Number of members.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the group has no listed members.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Whether energies are non-decreasing (most bound first).
    pub fn is_energy_ordered(&self) -> bool {
        self.energies.windows(2).all(|w| w[0] <= w[1])
    }
}

/// Binding-ordered member lists for every group; slot 0 is unused.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupParticleLists {
    lists: Vec<GroupParticleList>,
}

impl GroupParticleLists {
    /// Empty lists for `ngroups` groups.
    pub fn new(ngroups: usize) -> Self {
        Self {
            lists: vec![GroupParticleList::default(); ngroups + 1],
        }
    }

    /// Number of groups covered.
    pub fn ngroups(&self) -> usize {
        self.lists.len().saturating_sub(1)
    }

    /// List for `group`.
    pub fn get(&self, group: GroupId) -> Option<&GroupParticleList> {
        if group.is_field() {
            return None;
        }
        self.lists.get(group.index())
    }

    /// Replace the list for `group`. Ignored for the field and unknown ids.
    pub fn set(&mut self, group: GroupId, list: GroupParticleList) {
        if group.is_field() {
            return;
        }
        if let Some(slot) = self.lists.get_mut(group.index()) {
            *slot = list;
        }
    }

    /// Iterate over `(group, list)` for every real group.
    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &GroupParticleList)> + '_ {
        self.lists
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, l)| (GroupId::from_index(i), l))
    }

    /// Total particles listed across all groups.
    pub fn total_particles(&self) -> usize {
        self.lists.iter().skip(1).map(|l| l.len()).sum()
    }
}
