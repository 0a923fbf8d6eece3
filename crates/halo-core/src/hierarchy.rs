//! Group hierarchy records.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::GroupId;

/// Structural classification of a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureKind {
    /// Top-level group from the full-set search.
    FieldHalo,
    /// Group nested `level` steps below a field halo (level >= 1).
    Substructure {
        /// Depth below the field halo.
        level: u32,
    },
}

impl StructureKind {
    /// Numeric type code used in catalogs: 10 for field halos, 20 for
    /// first-level substructure, 30 for the next level, and so on.
    pub fn code(self) -> u32 {
        match self {
            Self::FieldHalo => 10,
            Self::Substructure { level } => 10 * (level + 1),
        }
    }

    /// Depth below the field halo (0 for field halos).
    pub fn level(self) -> u32 {
        match self {
            Self::FieldHalo => 0,
            Self::Substructure { level } => level,
        }
    }
}

/// Hierarchy record for one group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HierarchyEntry {
    /// Direct subgroups of this group.
    pub children: SmallVec<[GroupId; 4]>,
    /// Immediate parent, `None` for field halos.
    pub parent: Option<GroupId>,
    /// Top-level field halo containing this group (itself for roots).
    pub top_parent: GroupId,
    /// Structural type.
    pub kind: StructureKind,
}

impl HierarchyEntry {
    /// Number of direct subgroups.
    pub fn num_subgroups(&self) -> usize {
        self.children.len()
    }

    /// Whether this group is a field halo.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Hierarchy for all groups of one invocation.
///
/// `entries[0]` corresponds to group 1. A flat hierarchy (every group a
/// root) is a valid result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Hierarchy {
    entries: Vec<HierarchyEntry>,
}

impl Hierarchy {
    /// Wrap entries ordered by group id starting at group 1.
    pub fn from_entries(entries: Vec<HierarchyEntry>) -> Self {
        Self { entries }
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no groups.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for `group`, if it exists.
    pub fn get(&self, group: GroupId) -> Option<&HierarchyEntry> {
        group.index().checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// Iterate over `(group, entry)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &HierarchyEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (GroupId::from_index(i + 1), e))
    }

    /// Number of field halos.
    pub fn num_roots(&self) -> usize {
        self.entries.iter().filter(|e| e.is_root()).count()
    }

    /// Follow parent links from `group` to its root.
    ///
    /// Returns `None` if the walk does not terminate within `len()` steps
    /// or reaches an unknown id.
    pub fn root_of(&self, group: GroupId) -> Option<GroupId> {
        let mut current = group;
        for _ in 0..=self.entries.len() {
            let entry = self.get(current)?;
            match entry.parent {
                None => return Some(current),
                Some(p) => current = p,
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn kind_codes() {
        assert_eq!(StructureKind::FieldHalo.code(), 10);
        assert_eq!(StructureKind::Substructure { level: 1 }.code(), 20);
        assert_eq!(StructureKind::Substructure { level: 2 }.code(), 30);
    }

    #[test]
    fn root_of_walks_parents() {
        let h = Hierarchy::from_entries(vec![
            HierarchyEntry {
                children: smallvec![GroupId(2)],
                parent: None,
                top_parent: GroupId(1),
                kind: StructureKind::FieldHalo,
            },
            HierarchyEntry {
                children: smallvec![GroupId(3)],
                parent: Some(GroupId(1)),
                top_parent: GroupId(1),
                kind: StructureKind::Substructure { level: 1 },
            },
            HierarchyEntry {
                children: SmallVec::new(),
                parent: Some(GroupId(2)),
                top_parent: GroupId(1),
                kind: StructureKind::Substructure { level: 2 },
            },
        ]);
        assert_eq!(h.root_of(GroupId(3)), Some(GroupId(1)));
        assert_eq!(h.num_roots(), 1);
        assert_eq!(h.get(GroupId(0)), None);
    }

    #[test]
    fn root_of_detects_cycle() {
        let h = Hierarchy::from_entries(vec![
            HierarchyEntry {
                children: SmallVec::new(),
                parent: Some(GroupId(2)),
                top_parent: GroupId(2),
                kind: StructureKind::Substructure { level: 1 },
            },
            HierarchyEntry {
                children: SmallVec::new(),
                parent: Some(GroupId(1)),
                top_parent: GroupId(1),
                kind: StructureKind::Substructure { level: 1 },
            },
        ]);
        assert_eq!(h.root_of(GroupId(1)), None);
    }
}
