//! Hierarchy construction from parent links.

use halo_core::{GroupTable, Hierarchy, HierarchyEntry, KernelError, StructureKind};
use halo_kernel::{HierarchyBuilder, KernelContext};
use smallvec::SmallVec;

/// Walks each group's parent chain to its root.
///
/// A chain longer than the number of groups means a cycle and fails with
/// [`KernelError::CyclicHierarchy`]. A parent id outside the table fails
/// with [`KernelError::ExecutionFailed`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ParentLinkHierarchy;

impl HierarchyBuilder for ParentLinkHierarchy {
    fn name(&self) -> &str {
        "parent_link_hierarchy"
    }

    fn build(
        &self,
        _ctx: &KernelContext<'_>,
        groups: &GroupTable,
    ) -> Result<Hierarchy, KernelError> {
        let n = groups.ngroups();
        let mut entries: Vec<HierarchyEntry> = Vec::with_capacity(n);
        for (group, parent) in groups.iter() {
            if let Some(p) = parent {
                if p.is_field() || p.index() > n {
                    return Err(KernelError::ExecutionFailed {
                        reason: format!("group {group} has unknown parent {p}"),
                    });
                }
            }
            let mut level = 0u32;
            let mut top = group;
            while let Some(p) = groups.parent(top) {
                level += 1;
                if level as usize > n {
                    return Err(KernelError::CyclicHierarchy { group: group.0 });
                }
                top = p;
            }
            entries.push(HierarchyEntry {
                children: SmallVec::new(),
                parent,
                top_parent: top,
                kind: if level == 0 {
                    StructureKind::FieldHalo
                } else {
                    StructureKind::Substructure { level }
                },
            });
        }
        for (group, parent) in groups.iter() {
            if let Some(p) = parent {
                entries[p.index() - 1].children.push(group);
            }
        }
        Ok(Hierarchy::from_entries(entries))
    }
}
