//! Strongly-typed identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a group (halo or subgroup) within one invocation.
///
/// `GroupId(0)` is reserved for field particles that belong to no group;
/// real groups are numbered from 1. Group ids index directly into
/// property buffers and group tables, whose slot 0 is unused.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GroupId(pub u64);

impl GroupId {
    /// The field (unbound) pseudo-group.
    pub const FIELD: GroupId = GroupId(0);

    /// Whether this id denotes the field rather than a real group.
    pub fn is_field(self) -> bool {
        self.0 == 0
    }

    /// The id as a slot index into group-indexed buffers.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The group id for a 1-based slot index.
    pub fn from_index(index: usize) -> Self {
        Self(index as u64)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GroupId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Stable particle identity supplied by the host simulation.
///
/// Unique within a snapshot on one rank. The pipeline never rewrites
/// identities; reorderings are tracked with explicit permutations.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ParticleId(pub u64);

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ParticleId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Snapshot-qualified tag written alongside catalog ids.
///
/// Halo ids in catalogs are offset by `snapshot * STRIDE` so that ids are
/// unique across snapshots of one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotTag(pub u64);

impl SnapshotTag {
    /// Id stride between consecutive snapshots.
    pub const STRIDE: u64 = 1_000_000_000_000;

    /// Tag for the given snapshot number.
    pub fn for_snapshot(snapshot: u32) -> Self {
        Self(Self::STRIDE * u64::from(snapshot))
    }

    /// Catalog-wide id for a group in this snapshot.
    pub fn qualify(self, group: GroupId) -> u64 {
        self.0 + group.0
    }
}

impl fmt::Display for SnapshotTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_group_is_zero() {
        assert!(GroupId::FIELD.is_field());
        assert!(!GroupId(3).is_field());
        assert_eq!(GroupId::from_index(7).index(), 7);
    }

    #[test]
    fn snapshot_tag_qualifies_group_ids() {
        let tag = SnapshotTag::for_snapshot(12);
        assert_eq!(tag.0, 12 * SnapshotTag::STRIDE);
        assert_eq!(tag.qualify(GroupId(5)), 12_000_000_000_005);
    }
}
