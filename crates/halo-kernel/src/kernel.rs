//! The search-kernel traits.
//!
//! Kernels are stateless operators called in a fixed order by the
//! orchestrator. Each receives only the arrays it needs; any kernel that
//! reorders the particle array must reorder the membership map with it.

use halo_core::{
    GroupId, GroupParticleLists, GroupTable, Hierarchy, KernelError, Membership, Particle,
    PropBuffer,
};

use crate::context::KernelContext;

/// Result of the full-set search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FofResult {
    /// Group of every particle, parallel to the searched array.
    pub membership: Membership,
    /// Number of groups found; ids run from 1 to `ngroups`.
    pub ngroups: usize,
}

/// Full-set (friends-of-friends) group search.
///
/// # Contract
///
/// - The returned membership has one entry per particle.
/// - Group ids are dense: every id in `1..=ngroups` is used and no larger
///   id appears.
/// - Particles the search type excludes are left in the field.
///
/// # Examples
///
/// A search that finds nothing:
///
/// ```
/// use halo_core::{KernelError, Membership, Particle};
/// use halo_kernel::{FofKernel, FofResult, KernelContext};
///
/// struct NoGroups;
///
/// impl FofKernel for NoGroups {
///     fn name(&self) -> &str { "no_groups" }
///
///     fn search(
///         &self,
///         _ctx: &KernelContext<'_>,
///         particles: &[Particle],
///     ) -> Result<FofResult, KernelError> {
///         Ok(FofResult { membership: Membership::new(particles.len()), ngroups: 0 })
///     }
/// }
///
/// assert_eq!(NoGroups.name(), "no_groups");
/// ```
pub trait FofKernel: Send + 'static {
    /// Human-readable name for logs and errors.
    fn name(&self) -> &str;

    /// Link `particles` into groups.
    fn search(
        &self,
        ctx: &KernelContext<'_>,
        particles: &[Particle],
    ) -> Result<FofResult, KernelError>;
}

/// Recursive substructure search inside field halos.
pub trait SubstructureKernel: Send + 'static {
    /// Human-readable name for logs and errors.
    fn name(&self) -> &str;

    /// Find subgroups of the halos in `membership`.
    ///
    /// New subgroups are registered with [`GroupTable::push_subgroup`] and
    /// their particles relabelled in `membership`. The particle order must
    /// not change. `halo_props` holds the halo-only property buffer when
    /// inclusive masses were computed.
    fn search(
        &self,
        ctx: &KernelContext<'_>,
        particles: &[Particle],
        membership: &mut Membership,
        groups: &mut GroupTable,
        nhalos: usize,
        halo_props: Option<&mut PropBuffer>,
    ) -> Result<(), KernelError>;
}

/// Particles of the field halos laid out group by group.
///
/// `particles` and `membership` are in bucketed order: halo 1 occupies
/// `offsets[1]..offsets[1] + num_in_group[1]`, then halo 2, and so on,
/// with field particles last (starting at `offsets[0]`).
pub struct BucketedGroups<'a> {
    /// Particles in bucketed order.
    pub particles: &'a [Particle],
    /// Membership in the same bucketed order.
    pub membership: &'a [GroupId],
    /// Particles per halo; entry 0 counts the field.
    pub num_in_group: &'a [usize],
    /// Start of each halo's block; entry 0 is the start of the field block.
    pub offsets: &'a [usize],
    /// Number of halos.
    pub nhalos: usize,
}

impl BucketedGroups<'_> {
    /// The particles of halo `group`.
    pub fn members(&self, group: GroupId) -> &[Particle] {
        let g = group.index();
        match (self.offsets.get(g), self.num_in_group.get(g)) {
            (Some(&start), Some(&n)) => &self.particles[start..start + n],
            _ => &[],
        }
    }
}

/// Aperture (inclusive) halo masses.
pub trait InclusiveMassKernel: Send + 'static {
    /// Human-readable name for logs and errors.
    fn name(&self) -> &str;

    /// Fill the `inclusive` field of `halo_props` for every halo.
    fn compute(
        &self,
        ctx: &KernelContext<'_>,
        groups: &BucketedGroups<'_>,
        halo_props: &mut PropBuffer,
    ) -> Result<(), KernelError>;
}

/// Inputs to baryon association.
///
/// `membership` always spans the whole particle array. When `baryons` is
/// `Some`, the array is laid out dark matter first: `reference` is the dark
/// matter region (`membership[..ndark]`) and `baryons` the region after it
/// (`membership[ndark..]`). When `baryons` is `None`, `reference` is the
/// whole array and the kernel finds the baryons by species.
pub struct BaryonSearch<'a> {
    /// Dark matter region, or the whole array.
    pub reference: &'a [Particle],
    /// Separated baryon region, if the layout has one.
    pub baryons: Option<&'a [Particle]>,
    /// Dark matter particles covered.
    pub ndark: usize,
    /// Baryon particles covered.
    pub nbaryons: usize,
    /// Membership over both populations; updated in place.
    pub membership: &'a mut Membership,
    /// Current group count.
    pub ngroups: usize,
    /// Field halo count.
    pub nhalos: usize,
    /// Property buffer for all groups.
    pub props: &'a mut PropBuffer,
}

/// Assigns baryons to the dark matter groups hosting them.
pub trait BaryonKernel: Send + 'static {
    /// Human-readable name for logs and errors.
    fn name(&self) -> &str;

    /// Update `search.membership` for baryons.
    fn associate(
        &self,
        ctx: &KernelContext<'_>,
        search: BaryonSearch<'_>,
    ) -> Result<(), KernelError>;
}

/// Builds the parent/child hierarchy from the group table.
pub trait HierarchyBuilder: Send + 'static {
    /// Human-readable name for logs and errors.
    fn name(&self) -> &str;

    /// One [`HierarchyEntry`](halo_core::HierarchyEntry) per group.
    ///
    /// Must fail with [`KernelError::CyclicHierarchy`] rather than return a
    /// hierarchy that is not a forest.
    fn build(&self, ctx: &KernelContext<'_>, groups: &GroupTable)
        -> Result<Hierarchy, KernelError>;
}

/// Orders each group's particles by binding energy.
pub trait BindingEnergySort: Send + 'static {
    /// Human-readable name for logs and errors.
    fn name(&self) -> &str;

    /// Return per-group lists, most bound first.
    ///
    /// May reorder `particles` so that each group's members are contiguous;
    /// `membership` must be reordered identically. Indices in the returned
    /// lists refer to the order on return. Also fills per-group mass,
    /// particle count and kinematic centre in `props`.
    fn sort(
        &self,
        ctx: &KernelContext<'_>,
        particles: &mut [Particle],
        membership: &mut Membership,
        num_in_group: &[usize],
        props: &mut PropBuffer,
    ) -> Result<GroupParticleLists, KernelError>;
}

/// The full set of kernels the orchestrator runs.
pub struct KernelSet {
    /// Full-set search.
    pub fof: Box<dyn FofKernel>,
    /// Substructure search.
    pub substructure: Box<dyn SubstructureKernel>,
    /// Inclusive halo masses.
    pub inclusive_mass: Box<dyn InclusiveMassKernel>,
    /// Baryon association.
    pub baryons: Box<dyn BaryonKernel>,
    /// Hierarchy construction.
    pub hierarchy: Box<dyn HierarchyBuilder>,
    /// Binding-energy ordering.
    pub binding: Box<dyn BindingEnergySort>,
}

impl std::fmt::Debug for KernelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelSet")
            .field("fof", &self.fof.name())
            .field("substructure", &self.substructure.name())
            .field("inclusive_mass", &self.inclusive_mass.name())
            .field("baryons", &self.baryons.name())
            .field("hierarchy", &self.hierarchy.name())
            .field("binding", &self.binding.name())
            .finish()
    }
}
