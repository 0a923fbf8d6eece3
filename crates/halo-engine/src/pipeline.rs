//! The group-finding orchestrator.
//!
//! [`GroupFinder`] runs the seven stages of one invocation in a fixed
//! order over a particle arena that has already been partitioned:
//!
//! 1. full-set FOF search (always)
//! 2. inclusive halo masses (optional) over a temporarily bucketed array
//! 3. substructure search (optional)
//! 4. property buffer allocation
//! 5. baryon association (optional)
//! 6. hierarchy construction
//! 7. binding-energy ordering and catalog hand-off
//!
//! Every stage keeps the membership map parallel to the particle array.

use std::error::Error;
use std::fmt;
use std::time::Instant;

use halo_arena::{ArenaError, ParticleArena, Permutation};
use halo_core::{
    bucket_key, bucket_offsets, BaryonMode, GroupId, GroupTable, IngestError, KernelError,
    Membership, ParticleId, PropBuffer, SearchType,
};
use halo_kernel::{
    BaryonSearch, BucketedGroups, CatalogWriter, KernelContext, KernelSet, WriterError,
};
use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::metrics::{PipelineMetrics, Stage};

// ── PipelineError ──────────────────────────────────────────────────

/// Errors that abort one invocation.
#[derive(Debug, PartialEq)]
pub enum PipelineError {
    /// A kernel failed.
    Kernel {
        /// Stage that called the kernel.
        stage: Stage,
        /// The kernel's error.
        source: KernelError,
    },
    /// Particle ingestion or a species rescan failed.
    Ingest(IngestError),
    /// A permutation or arena operation failed.
    Arena(ArenaError),
    /// A kernel produced a group id beyond the group count.
    MembershipOutOfRange {
        /// Stage after which the map was checked.
        stage: Stage,
        /// The offending id.
        group: GroupId,
        /// Group count at that point.
        ngroups: usize,
    },
    /// The arena layout does not match the configured baryon search.
    LayoutMismatch,
    /// A catalog writer failed.
    Writer(WriterError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kernel { stage, source } => write!(f, "stage {stage}: {source}"),
            Self::Ingest(e) => write!(f, "ingest: {e}"),
            Self::Arena(e) => write!(f, "arena: {e}"),
            Self::MembershipOutOfRange {
                stage,
                group,
                ngroups,
            } => write!(
                f,
                "after stage {stage}: group id {group} exceeds group count {ngroups}"
            ),
            Self::LayoutMismatch => {
                write!(f, "baryon association expects dark matter before baryons")
            }
            Self::Writer(e) => write!(f, "writer: {e}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Kernel { source, .. } => Some(source),
            Self::Ingest(e) => Some(e),
            Self::Arena(e) => Some(e),
            Self::Writer(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IngestError> for PipelineError {
    fn from(e: IngestError) -> Self {
        Self::Ingest(e)
    }
}

impl From<ArenaError> for PipelineError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}

impl From<WriterError> for PipelineError {
    fn from(e: WriterError) -> Self {
        Self::Writer(e)
    }
}

fn at(stage: Stage) -> impl FnOnce(KernelError) -> PipelineError {
    move |source| {
        error!(%stage, error = %source, "kernel failed");
        PipelineError::Kernel { stage, source }
    }
}

// ── StagePlan ──────────────────────────────────────────────────────

/// Which optional stages run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StagePlan {
    /// Run stage 2.
    pub inclusive_halo: bool,
    /// Run stage 3.
    pub sub_search: bool,
    /// Baryon treatment; stage 5 runs when on.
    pub baryon_mode: BaryonMode,
    /// Species linked by the full-set search.
    pub search_type: SearchType,
}

impl StagePlan {
    /// Plan for a validated configuration.
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            inclusive_halo: config.inclusive_halo,
            sub_search: config.sub_search,
            baryon_mode: config.baryon_mode,
            search_type: config.search_type,
        }
    }

    /// Whether the per-species catalog is written.
    pub fn writes_species_catalog(&self) -> bool {
        self.baryon_mode.is_on() || self.search_type == SearchType::All
    }
}

// ── CatalogSummary ─────────────────────────────────────────────────

/// Outcome of one pipeline run.
#[derive(Clone, Debug, Default)]
pub struct CatalogSummary {
    /// Field halos found by stage 1.
    pub nhalos: usize,
    /// All groups after substructure, `nhalos` included.
    pub ngroups: usize,
    /// Field halos in the final hierarchy.
    pub num_roots: usize,
    /// Particles listed in some group.
    pub grouped_particles: usize,
    /// Whether the per-species catalog was written.
    pub species_catalog: bool,
    /// Per-stage timings.
    pub metrics: PipelineMetrics,
}

// ── GroupFinder ────────────────────────────────────────────────────

/// Runs the group-finding stages with a fixed set of kernels.
pub struct GroupFinder<'k> {
    kernels: &'k KernelSet,
    plan: StagePlan,
}

impl<'k> GroupFinder<'k> {
    /// Orchestrator over `kernels` following `plan`.
    pub fn new(kernels: &'k KernelSet, plan: StagePlan) -> Self {
        Self { kernels, plan }
    }

    /// Run all stages over `arena` and hand the results to `writer`.
    ///
    /// The particle array is reordered by the binding-energy stage; particle
    /// identities are never modified.
    pub fn run(
        &self,
        ctx: &KernelContext<'_>,
        arena: &mut ParticleArena,
        writer: &mut dyn CatalogWriter,
    ) -> Result<CatalogSummary, PipelineError> {
        let mut metrics = PipelineMetrics {
            local_particles: arena.len(),
            capacity: arena.capacity(),
            memory_bytes: arena.memory_bytes(),
            ..PipelineMetrics::default()
        };
        let k = self.kernels;

        // 1. Full-set search.
        let t = Instant::now();
        let fof = k.fof.search(ctx, arena.particles()).map_err(at(Stage::Fof))?;
        if fof.membership.len() != arena.len() {
            return Err(at(Stage::Fof)(KernelError::LengthMismatch {
                what: "membership",
                expected: arena.len(),
                found: fof.membership.len(),
            }));
        }
        let mut membership = fof.membership;
        let nhalos = fof.ngroups;
        check_range(&membership, nhalos, Stage::Fof)?;
        let mut groups = GroupTable::with_roots(nhalos);
        self.finish_stage(&mut metrics, Stage::Fof, t);
        info!(nhalos, kernel = k.fof.name(), "field search complete");
        if nhalos == 0 {
            warn!("no field halos found");
        }

        // 2. Inclusive masses over a bucketed view, then restore the order.
        let mut halo_props = None;
        if self.plan.inclusive_halo {
            let t = Instant::now();
            halo_props = Some(self.inclusive_masses(ctx, arena, &mut membership, nhalos)?);
            self.finish_stage(&mut metrics, Stage::InclusiveMass, t);
        }

        // 3. Substructure.
        if self.plan.sub_search {
            let t = Instant::now();
            k.substructure
                .search(
                    ctx,
                    arena.particles(),
                    &mut membership,
                    &mut groups,
                    nhalos,
                    halo_props.as_mut(),
                )
                .map_err(at(Stage::Substructure))?;
            check_range(&membership, groups.ngroups(), Stage::Substructure)?;
            self.finish_stage(&mut metrics, Stage::Substructure, t);
            info!(
                nsubhalos = groups.ngroups() - nhalos,
                kernel = k.substructure.name(),
                "substructure search complete"
            );
        }
        let ngroups = groups.ngroups();

        // 4. Property buffer for every group.
        let t = Instant::now();
        let mut props = PropBuffer::new(ngroups);
        if let Some(halos) = halo_props.take() {
            if ngroups > 0 {
                props.copy_inclusive_from(&halos, nhalos);
            }
        }
        self.finish_stage(&mut metrics, Stage::Properties, t);

        // 5. Baryons.
        if self.plan.baryon_mode.is_on() {
            let t = Instant::now();
            if self.associate_baryons(ctx, arena, &mut membership, ngroups, nhalos, &mut props)? {
                check_range(&membership, ngroups, Stage::Baryons)?;
                self.finish_stage(&mut metrics, Stage::Baryons, t);
            }
        }

        // 6. Hierarchy.
        let t = Instant::now();
        let hierarchy = k
            .hierarchy
            .build(ctx, &groups)
            .map_err(at(Stage::Hierarchy))?;
        if hierarchy.len() != ngroups {
            return Err(at(Stage::Hierarchy)(KernelError::LengthMismatch {
                what: "hierarchy",
                expected: ngroups,
                found: hierarchy.len(),
            }));
        }
        for (group, entry) in hierarchy.iter() {
            if let Some(record) = props.get_mut(group) {
                record.set_hierarchy(entry);
            }
        }
        let num_roots = hierarchy.num_roots();
        self.finish_stage(&mut metrics, Stage::Hierarchy, t);

        // 7. Binding-energy order, then hand off to the writer.
        let t = Instant::now();
        let num_in_group = membership.num_in_group(ngroups);
        let lists = k
            .binding
            .sort(
                ctx,
                arena.particles_for_reorder(),
                &mut membership,
                &num_in_group,
                &mut props,
            )
            .map_err(at(Stage::BindingSort))?;
        if membership.len() != arena.len() {
            return Err(at(Stage::BindingSort)(KernelError::LengthMismatch {
                what: "membership",
                expected: arena.len(),
                found: membership.len(),
            }));
        }
        self.finish_stage(&mut metrics, Stage::BindingSort, t);

        let t = Instant::now();
        writer.write_properties(&props)?;
        writer.write_group_catalog(&num_in_group, &lists, arena.particles())?;
        let species_catalog = self.plan.writes_species_catalog();
        if species_catalog {
            writer.write_species_catalog(&lists, arena.particles())?;
        }
        self.finish_stage(&mut metrics, Stage::Write, t);

        Ok(CatalogSummary {
            nhalos,
            ngroups,
            num_roots,
            grouped_particles: lists.total_particles(),
            species_catalog,
            metrics,
        })
    }

    fn finish_stage(&self, metrics: &mut PipelineMetrics, stage: Stage, start: Instant) {
        let us = start.elapsed().as_micros() as u64;
        metrics.record(stage, us);
        info!(%stage, elapsed_us = us, "stage complete");
    }

    /// Stage 2: bucket particles by halo, run the kernel, undo the bucketing.
    fn inclusive_masses(
        &self,
        ctx: &KernelContext<'_>,
        arena: &mut ParticleArena,
        membership: &mut Membership,
        nhalos: usize,
    ) -> Result<PropBuffer, PipelineError> {
        let ids_before: Option<Vec<ParticleId>> =
            cfg!(debug_assertions).then(|| arena.particles().iter().map(|p| p.id).collect());

        let keys: Vec<usize> = membership.iter().map(bucket_key).collect();
        let perm = Permutation::sort_by_key(&keys);
        arena.permute_transient(&perm)?;
        perm.apply(membership.as_mut_slice())?;

        let num_in_group = membership.num_in_group(nhalos);
        let offsets = bucket_offsets(&num_in_group);
        let mut halo_props = PropBuffer::new(nhalos);
        let view = BucketedGroups {
            particles: arena.particles(),
            membership: membership.as_slice(),
            num_in_group: &num_in_group,
            offsets: &offsets,
            nhalos,
        };
        let computed = self
            .kernels
            .inclusive_mass
            .compute(ctx, &view, &mut halo_props)
            .map_err(at(Stage::InclusiveMass));

        // Restore the original order even when the kernel failed.
        let inverse = perm.inverse();
        arena.permute_transient(&inverse)?;
        inverse.apply(membership.as_mut_slice())?;
        computed?;

        if let Some(before) = ids_before {
            debug_assert!(
                arena.particles().iter().map(|p| p.id).eq(before),
                "inclusive-mass round trip changed the particle order"
            );
        }
        debug!(
            nhalos,
            kernel = self.kernels.inclusive_mass.name(),
            "inclusive masses computed"
        );
        Ok(halo_props)
    }

    /// Stage 5. Returns whether the kernel ran.
    fn associate_baryons(
        &self,
        ctx: &KernelContext<'_>,
        arena: &ParticleArena,
        membership: &mut Membership,
        ngroups: usize,
        nhalos: usize,
        props: &mut PropBuffer,
    ) -> Result<bool, PipelineError> {
        let kernel = &self.kernels.baryons;
        let search = if self.plan.search_type == SearchType::DarkMatter {
            let (dark, baryons) = arena
                .split_dark_baryons()
                .ok_or(PipelineError::LayoutMismatch)?;
            BaryonSearch {
                reference: dark,
                baryons: Some(baryons),
                ndark: dark.len(),
                nbaryons: baryons.len(),
                membership,
                ngroups,
                nhalos,
                props,
            }
        } else if self.plan.sub_search {
            // Substructure does not reorder particles, so the current array
            // is the one to count.
            let counts = arena.species_counts().map_err(|e| {
                error!(error = %e, "species rescan failed");
                PipelineError::Ingest(e)
            })?;
            BaryonSearch {
                reference: arena.particles(),
                baryons: None,
                ndark: counts.dark,
                nbaryons: counts.gas,
                membership,
                ngroups,
                nhalos,
                props,
            }
        } else {
            info!("baryon association skipped: substructure search is off");
            return Ok(false);
        };
        debug!(
            ndark = search.ndark,
            nbaryons = search.nbaryons,
            kernel = kernel.name(),
            "associating baryons"
        );
        kernel.associate(ctx, search).map_err(at(Stage::Baryons))?;
        Ok(true)
    }
}

fn check_range(
    membership: &Membership,
    ngroups: usize,
    stage: Stage,
) -> Result<(), PipelineError> {
    let max = membership.max_group();
    if max.index() > ngroups {
        error!(%stage, group = %max, ngroups, "membership exceeds group count");
        return Err(PipelineError::MembershipOutOfRange {
            stage,
            group: max,
            ngroups,
        });
    }
    Ok(())
}
