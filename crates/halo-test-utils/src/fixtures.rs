//! Scripted kernels for orchestrator testing.
//!
//! - [`LabelFof`] assigns halos from a labelling function.
//! - [`FailingFof`] always fails.
//! - [`ScriptedSubstructure`] registers a fixed list of subgroups.
//! - [`FofMassOnly`] fills `mass_fof` and checks the bucketed layout.
//! - [`RecordingBaryons`] records what the baryon stage was handed.
//! - [`Counting`] wraps any kernel and counts its calls.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use halo_core::{
    GroupId, GroupParticleLists, GroupTable, Hierarchy, InclusiveMass, KernelError, Membership,
    Particle, ParticleId, PropBuffer,
};
use halo_kernel::{
    BaryonKernel, BaryonSearch, BindingEnergySort, BucketedGroups, FofKernel, FofResult,
    HierarchyBuilder, InclusiveMassKernel, KernelContext, SubstructureKernel,
};

type Labeller = Box<dyn Fn(&Particle) -> u64 + Send + Sync>;

/// Full-set search that labels each particle with a fixed function.
///
/// `ngroups` is the largest label returned; the labeller is responsible
/// for keeping ids dense.
pub struct LabelFof {
    labeller: Labeller,
}

impl LabelFof {
    pub fn new(labeller: impl Fn(&Particle) -> u64 + Send + Sync + 'static) -> Self {
        Self {
            labeller: Box::new(labeller),
        }
    }

    /// Label by particle id: particle `id` gets `labels[id]`, or the
    /// field when the id is out of range.
    pub fn by_id(labels: Vec<u64>) -> Self {
        Self::new(move |p| labels.get(p.id.0 as usize).copied().unwrap_or(0))
    }

    /// Every particle in the field.
    pub fn empty() -> Self {
        Self::new(|_| 0)
    }
}

impl FofKernel for LabelFof {
    fn name(&self) -> &str {
        "label_fof"
    }

    fn search(
        &self,
        _ctx: &KernelContext<'_>,
        particles: &[Particle],
    ) -> Result<FofResult, KernelError> {
        let membership =
            Membership::from_vec(particles.iter().map(|p| GroupId((self.labeller)(p))).collect());
        let ngroups = membership.max_group().index();
        Ok(FofResult {
            membership,
            ngroups,
        })
    }
}

/// Full-set search that always fails.
pub struct FailingFof {
    pub reason: String,
}

impl FailingFof {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl FofKernel for FailingFof {
    fn name(&self) -> &str {
        "failing_fof"
    }

    fn search(
        &self,
        _ctx: &KernelContext<'_>,
        _particles: &[Particle],
    ) -> Result<FofResult, KernelError> {
        Err(KernelError::ExecutionFailed {
            reason: self.reason.clone(),
        })
    }
}

/// One subgroup to register: its parent and the ids of its members.
#[derive(Clone, Debug)]
pub struct ScriptedSubgroup {
    pub parent: GroupId,
    pub members: Vec<ParticleId>,
}

/// Substructure search that registers a fixed list of subgroups.
///
/// Subgroups are pushed in script order, so a later entry may name an
/// earlier subgroup as its parent. Records whether the halo property
/// buffer was supplied.
#[derive(Default)]
pub struct ScriptedSubstructure {
    script: Vec<ScriptedSubgroup>,
    saw_halo_props: Arc<AtomicUsize>,
}

impl ScriptedSubstructure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subgroup(mut self, parent: u64, members: impl IntoIterator<Item = u64>) -> Self {
        self.script.push(ScriptedSubgroup {
            parent: GroupId(parent),
            members: members.into_iter().map(ParticleId).collect(),
        });
        self
    }

    /// Number of calls that received a halo property buffer.
    pub fn halo_props_seen(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.saw_halo_props)
    }
}

impl SubstructureKernel for ScriptedSubstructure {
    fn name(&self) -> &str {
        "scripted_substructure"
    }

    fn search(
        &self,
        _ctx: &KernelContext<'_>,
        particles: &[Particle],
        membership: &mut Membership,
        groups: &mut GroupTable,
        _nhalos: usize,
        halo_props: Option<&mut PropBuffer>,
    ) -> Result<(), KernelError> {
        if halo_props.is_some() {
            self.saw_halo_props.fetch_add(1, Ordering::Relaxed);
        }
        if membership.len() != particles.len() {
            return Err(KernelError::LengthMismatch {
                what: "membership",
                expected: particles.len(),
                found: membership.len(),
            });
        }
        for sub in &self.script {
            if sub.parent.index() > groups.ngroups() {
                return Err(KernelError::ExecutionFailed {
                    reason: format!("scripted parent {} does not exist", sub.parent),
                });
            }
            let id = groups.push_subgroup(sub.parent);
            let members: HashSet<ParticleId> = sub.members.iter().copied().collect();
            for (i, p) in particles.iter().enumerate() {
                if members.contains(&p.id) {
                    membership.set(i, id);
                }
            }
        }
        Ok(())
    }
}

/// Substructure search that finds nothing.
pub struct NoSubstructure;

impl SubstructureKernel for NoSubstructure {
    fn name(&self) -> &str {
        "no_substructure"
    }

    fn search(
        &self,
        _ctx: &KernelContext<'_>,
        _particles: &[Particle],
        _membership: &mut Membership,
        _groups: &mut GroupTable,
        _nhalos: usize,
        _halo_props: Option<&mut PropBuffer>,
    ) -> Result<(), KernelError> {
        Ok(())
    }
}

/// Inclusive-mass kernel that sums member masses into `mass_fof`.
///
/// Fails if any halo block holds a particle labelled with another group,
/// so it also checks the bucketing round trip.
pub struct FofMassOnly;

impl InclusiveMassKernel for FofMassOnly {
    fn name(&self) -> &str {
        "fof_mass_only"
    }

    fn compute(
        &self,
        _ctx: &KernelContext<'_>,
        groups: &BucketedGroups<'_>,
        halo_props: &mut PropBuffer,
    ) -> Result<(), KernelError> {
        for g in 1..=groups.nhalos {
            let group = GroupId::from_index(g);
            let start = groups.offsets[g];
            let len = groups.num_in_group[g];
            if groups.membership[start..start + len]
                .iter()
                .any(|m| *m != group)
            {
                return Err(KernelError::ExecutionFailed {
                    reason: format!("halo {group} block is not contiguous"),
                });
            }
            let mass_fof = groups.members(group).iter().map(|p| p.mass).sum();
            if let Some(record) = halo_props.get_mut(group) {
                record.inclusive = Some(InclusiveMass {
                    mass_fof,
                    ..InclusiveMass::default()
                });
            }
        }
        Ok(())
    }
}

/// Baryon association that leaves membership untouched.
pub struct NoBaryons;

impl BaryonKernel for NoBaryons {
    fn name(&self) -> &str {
        "no_baryons"
    }

    fn associate(
        &self,
        _ctx: &KernelContext<'_>,
        _search: BaryonSearch<'_>,
    ) -> Result<(), KernelError> {
        Ok(())
    }
}

/// What one baryon-association call was handed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaryonCall {
    pub reference_len: usize,
    pub separated: bool,
    pub ndark: usize,
    pub nbaryons: usize,
    pub ngroups: usize,
    pub nhalos: usize,
}

/// Baryon association that records its inputs.
#[derive(Default)]
pub struct RecordingBaryons {
    calls: Arc<Mutex<Vec<BaryonCall>>>,
}

impl RecordingBaryons {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<BaryonCall>>> {
        Arc::clone(&self.calls)
    }
}

impl BaryonKernel for RecordingBaryons {
    fn name(&self) -> &str {
        "recording_baryons"
    }

    fn associate(
        &self,
        _ctx: &KernelContext<'_>,
        search: BaryonSearch<'_>,
    ) -> Result<(), KernelError> {
        let call = BaryonCall {
            reference_len: search.reference.len(),
            separated: search.baryons.is_some(),
            ndark: search.ndark,
            nbaryons: search.nbaryons,
            ngroups: search.ngroups,
            nhalos: search.nhalos,
        };
        self.calls
            .lock()
            .map_err(|_| KernelError::ExecutionFailed {
                reason: "recording lock poisoned".to_string(),
            })?
            .push(call);
        Ok(())
    }
}

/// Wraps a kernel and counts how often it is called.
pub struct Counting<K> {
    pub inner: K,
    calls: Arc<AtomicUsize>,
}

impl<K> Counting<K> {
    pub fn new(inner: K) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared call counter; stays valid after the wrapper is boxed.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }
}

impl<K: FofKernel> FofKernel for Counting<K> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn search(
        &self,
        ctx: &KernelContext<'_>,
        particles: &[Particle],
    ) -> Result<FofResult, KernelError> {
        self.tick();
        self.inner.search(ctx, particles)
    }
}

impl<K: SubstructureKernel> SubstructureKernel for Counting<K> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn search(
        &self,
        ctx: &KernelContext<'_>,
        particles: &[Particle],
        membership: &mut Membership,
        groups: &mut GroupTable,
        nhalos: usize,
        halo_props: Option<&mut PropBuffer>,
    ) -> Result<(), KernelError> {
        self.tick();
        self.inner
            .search(ctx, particles, membership, groups, nhalos, halo_props)
    }
}

impl<K: InclusiveMassKernel> InclusiveMassKernel for Counting<K> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn compute(
        &self,
        ctx: &KernelContext<'_>,
        groups: &BucketedGroups<'_>,
        halo_props: &mut PropBuffer,
    ) -> Result<(), KernelError> {
        self.tick();
        self.inner.compute(ctx, groups, halo_props)
    }
}

impl<K: BaryonKernel> BaryonKernel for Counting<K> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn associate(
        &self,
        ctx: &KernelContext<'_>,
        search: BaryonSearch<'_>,
    ) -> Result<(), KernelError> {
        self.tick();
        self.inner.associate(ctx, search)
    }
}

impl<K: HierarchyBuilder> HierarchyBuilder for Counting<K> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn build(
        &self,
        ctx: &KernelContext<'_>,
        groups: &GroupTable,
    ) -> Result<Hierarchy, KernelError> {
        self.tick();
        self.inner.build(ctx, groups)
    }
}

impl<K: BindingEnergySort> BindingEnergySort for Counting<K> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn sort(
        &self,
        ctx: &KernelContext<'_>,
        particles: &mut [Particle],
        membership: &mut Membership,
        num_in_group: &[usize],
        props: &mut PropBuffer,
    ) -> Result<GroupParticleLists, KernelError> {
        self.tick();
        self.inner
            .sort(ctx, particles, membership, num_in_group, props)
    }
}
