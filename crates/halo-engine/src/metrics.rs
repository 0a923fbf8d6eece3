//! Per-invocation timing metrics.
//!
//! [`PipelineMetrics`] records how long ingestion and each pipeline stage
//! took for one snapshot, together with the particle storage footprint.

use std::fmt;

/// A step of the group-finding pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Species partitioning into the particle arena.
    Partition,
    /// Full-set FOF search.
    Fof,
    /// Inclusive halo masses.
    InclusiveMass,
    /// Substructure search.
    Substructure,
    /// Property buffer allocation.
    Properties,
    /// Baryon association.
    Baryons,
    /// Hierarchy construction.
    Hierarchy,
    /// Binding-energy ordering.
    BindingSort,
    /// Catalog writing.
    Write,
}

impl Stage {
    /// Short name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Partition => "partition",
            Self::Fof => "fof",
            Self::InclusiveMass => "inclusive_mass",
            Self::Substructure => "substructure",
            Self::Properties => "properties",
            Self::Baryons => "baryons",
            Self::Hierarchy => "hierarchy",
            Self::BindingSort => "binding_sort",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Timing and memory metrics for one invocation.
///
/// All durations are in microseconds. Stages that did not run are absent
/// from `stage_us`.
#[derive(Clone, Debug, Default)]
pub struct PipelineMetrics {
    /// Wall-clock time for the whole invocation, in microseconds.
    pub total_us: u64,
    /// Per-stage execution times in execution order.
    pub stage_us: Vec<(Stage, u64)>,
    /// Particles on this rank.
    pub local_particles: usize,
    /// Particle slots reserved on this rank.
    pub capacity: usize,
    /// Bytes reserved for particle storage.
    pub memory_bytes: usize,
}

impl PipelineMetrics {
    /// Append a stage timing.
    pub fn record(&mut self, stage: Stage, us: u64) {
        self.stage_us.push((stage, us));
    }

    /// Time recorded for `stage`, if it ran.
    pub fn stage(&self, stage: Stage) -> Option<u64> {
        self.stage_us
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|&(_, us)| us)
    }

    /// Whether `stage` ran.
    pub fn ran(&self, stage: Stage) -> bool {
        self.stage(stage).is_some()
    }

    /// Stages in execution order.
    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.stage_us.iter().map(|&(s, _)| s)
    }
}
