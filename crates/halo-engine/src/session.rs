//! Host-facing entry points: initialise once, invoke per snapshot.
//!
//! A [`Session`] owns the validated configuration, the kernels, the writer
//! registry, the rank's communicator and its shared-memory thread pool.
//! Nothing is global; two sessions in one process are independent.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use halo_core::{SnapshotTag, SourceParticle};
use halo_kernel::{
    KernelContext, KernelSet, SimulationSummary, UnitSummary, WriterError, WriterRegistry,
    WriterTarget,
};
use rayon::ThreadPoolBuilder;
use tracing::{error, info, warn};

use crate::comm::{CommError, Communicator, LocalComm};
use crate::config::{ConfigError, RunConfig};
use crate::cosmology::{normalize, CosmoInfo, SimInfo, UnitInfo};
use crate::ingest::{partition, PartitionMode, SourceCounts};
use crate::metrics::Stage;
use crate::params::{write_configuration, ParamLoader};
use crate::pipeline::{CatalogSummary, GroupFinder, PipelineError, StagePlan};

// ── InvokeError ────────────────────────────────────────────────────

/// Errors that fail a snapshot invocation.
#[derive(Debug, PartialEq)]
pub enum InvokeError {
    /// A pipeline stage, ingestion or a writer failed.
    Pipeline(PipelineError),
    /// A cross-rank collective failed.
    Comm(CommError),
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipeline(e) => write!(f, "pipeline: {e}"),
            Self::Comm(e) => write!(f, "communication: {e}"),
        }
    }
}

impl Error for InvokeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Pipeline(e) => Some(e),
            Self::Comm(e) => Some(e),
        }
    }
}

impl From<PipelineError> for InvokeError {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}

impl From<CommError> for InvokeError {
    fn from(e: CommError) -> Self {
        Self::Comm(e)
    }
}

impl From<WriterError> for InvokeError {
    fn from(e: WriterError) -> Self {
        Self::Pipeline(PipelineError::Writer(e))
    }
}

// ── Requests and reports ───────────────────────────────────────────

/// Rank-level options fixed at initialisation.
pub struct SessionOptions {
    /// Worker threads for kernels; 0 lets the pool decide.
    pub threads: usize,
    /// Collectives for this rank.
    pub comm: Box<dyn Communicator>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            threads: 0,
            comm: Box::new(LocalComm),
        }
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("threads", &self.threads)
            .field("rank", &self.comm.rank())
            .field("size", &self.comm.size())
            .finish()
    }
}

/// Everything the host supplies for one snapshot.
#[derive(Clone, Debug)]
pub struct InvokeRequest<'a> {
    /// Snapshot number; scales the group id tag.
    pub snapshot: u32,
    /// Base path of the catalogs.
    pub output_name: PathBuf,
    /// Cosmological state.
    pub cosmology: CosmoInfo,
    /// Simulation description.
    pub sim: SimInfo,
    /// Particle counts reported by the host.
    pub counts: SourceCounts,
    /// The particles, read-only.
    pub particles: &'a [SourceParticle],
}

/// Result of a successful invocation.
#[derive(Clone, Debug)]
pub struct InvocationReport {
    /// Group counts and stage timings.
    pub summary: CatalogSummary,
    /// Particles over all ranks.
    pub total_particles: u64,
    /// Particles on each rank.
    pub rank_particles: Vec<u64>,
}

// ── Session ────────────────────────────────────────────────────────

/// An initialised structure finder.
pub struct Session {
    config: RunConfig,
    units: UnitInfo,
    kernels: KernelSet,
    writers: WriterRegistry,
    comm: Box<dyn Communicator>,
    pool: rayon::ThreadPool,
}

impl Session {
    /// Load, validate and dump the configuration, then build the thread
    /// pool.
    pub fn init(
        loader: &dyn ParamLoader,
        units: UnitInfo,
        sim: &SimInfo,
        kernels: KernelSet,
        writers: WriterRegistry,
        options: SessionOptions,
    ) -> Result<Self, ConfigError> {
        info!(source = %loader.describe(), "initialising structure finder");
        let mut config = loader.load().map_err(|e| {
            error!(error = %e, "could not load configuration");
            e
        })?;
        config.validate(sim, &writers).map_err(|e| {
            error!(error = %e, "configuration rejected");
            e
        })?;
        if let Some(path) = loader.dump_path() {
            if let Err(e) = write_configuration(&config, &path) {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "could not write effective configuration"
                );
            }
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.threads)
            .build()
            .map_err(|e| ConfigError::Invalid {
                option: "threads".to_string(),
                reason: e.to_string(),
            })?;
        info!(
            threads = pool.current_num_threads(),
            rank = options.comm.rank(),
            ranks = options.comm.size(),
            "structure finder ready"
        );
        Ok(Self {
            config,
            units,
            kernels,
            writers,
            comm: options.comm,
            pool,
        })
    }

    /// The validated configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Unit conversions captured at initialisation.
    pub fn units(&self) -> &UnitInfo {
        &self.units
    }

    /// Find and write the structures of one snapshot.
    pub fn invoke(&mut self, request: InvokeRequest<'_>) -> Result<InvocationReport, InvokeError> {
        info!(snapshot = request.snapshot, "structure finder invoked");
        let result = self.run(request);
        match &result {
            Ok(report) => info!(
                elapsed_us = report.summary.metrics.total_us,
                ngroups = report.summary.ngroups,
                "structure finder returning"
            ),
            Err(e) => error!(error = %e, "snapshot invocation failed"),
        }
        result
    }

    fn run(&mut self, request: InvokeRequest<'_>) -> Result<InvocationReport, InvokeError> {
        let start = Instant::now();
        self.config.derived.output_name = request.output_name.clone();
        self.config.derived.snapshot = SnapshotTag::for_snapshot(request.snapshot);
        normalize(&mut self.config, &request.cosmology, &request.sim, &self.units);

        let target = WriterTarget {
            output_name: request.output_name,
            snapshot: self.config.derived.snapshot,
            separate_files: self.config.output.separate_files,
            extended_output: self.config.output.extended_output,
        };
        let mut writer = self.writers.open(self.config.output.format, &target)?;
        writer.write_simulation_info(&self.simulation_summary())?;
        writer.write_unit_info(&self.unit_summary())?;

        let local = request.particles.len() as u64;
        let total_particles = self.comm.all_reduce_sum(local)?;
        let rank_particles = self.comm.all_gather(local)?;
        info!(local, total = total_particles, "particle counts exchanged");

        let t = Instant::now();
        let mode = PartitionMode::for_search(self.config.search_type, self.config.baryon_mode);
        let mut arena = partition(
            request.particles,
            request.counts,
            mode,
            &self.config.arena_config(),
        )?;
        let partition_us = t.elapsed().as_micros() as u64;

        let params = self.config.search_params(&self.units);
        let ctx = KernelContext::new(&params, &self.pool);
        let finder = GroupFinder::new(&self.kernels, StagePlan::from_config(&self.config));
        let mut summary = finder.run(&ctx, &mut arena, writer.as_mut())?;
        writer.finish()?;

        summary.metrics.stage_us.insert(0, (Stage::Partition, partition_us));
        summary.metrics.total_us = start.elapsed().as_micros() as u64;
        Ok(InvocationReport {
            summary,
            total_particles,
            rank_particles,
        })
    }

    fn simulation_summary(&self) -> SimulationSummary {
        let d = &self.config.derived;
        SimulationSummary {
            cosmological: d.cosmological,
            scale_factor: d.cosmology.scale_factor,
            hubble_param: d.cosmology.hubble_param,
            omega_m: d.cosmology.omega_m,
            omega_b: d.cosmology.omega_b,
            omega_cdm: d.cosmology.omega_cdm,
            omega_lambda: d.cosmology.omega_lambda,
            w_de: d.cosmology.w_de,
            period: d.period,
            rho_background: d.rho_background,
            virial_level: d.virial_level,
        }
    }

    fn unit_summary(&self) -> UnitSummary {
        UnitSummary {
            length_to_kpc: self.units.length_to_kpc,
            velocity_to_kms: self.units.velocity_to_kms,
            mass_to_solar_mass: self.units.mass_to_solar_mass,
            gravity: self.units.gravity,
            hubble_unit: self.units.hubble_unit,
            comoving: self.config.output.comoving_units,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("kernels", &self.kernels)
            .field("writers", &self.writers)
            .field("rank", &self.comm.rank())
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}
