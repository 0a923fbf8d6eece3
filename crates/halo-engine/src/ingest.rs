//! Species partitioning of host particles into the particle arena.

use std::time::Instant;

use halo_arena::{ArenaConfig, Layout, ParticleArena};
use halo_core::{BaryonMode, IngestError, Particle, SearchType, SourceParticle, Species};
use tracing::{error, info};

use crate::pipeline::PipelineError;

/// Particle counts reported by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourceCounts {
    /// Particles taking part in gravity (all species).
    pub num_gravity: usize,
    /// Hydrodynamic (gas) particles.
    pub num_hydro: usize,
}

impl SourceCounts {
    /// Dark matter count, `num_gravity - num_hydro`.
    pub fn ndark(&self) -> Result<usize, IngestError> {
        self.num_gravity
            .checked_sub(self.num_hydro)
            .ok_or(IngestError::CountMismatch {
                population: "gas",
                expected: self.num_gravity,
                found: self.num_hydro,
            })
    }
}

/// How the partitioner orders the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartitionMode {
    /// Keep the host order.
    Preserve,
    /// Dark matter first, then gas, each in host order.
    DarkFirst,
}

impl PartitionMode {
    /// Dark-first when baryons are searched separately and not every
    /// species is linked together.
    pub fn for_search(search_type: SearchType, baryon_mode: BaryonMode) -> Self {
        if baryon_mode.is_on() && search_type != SearchType::All {
            Self::DarkFirst
        } else {
            Self::Preserve
        }
    }
}

fn decode(index: usize, src: &SourceParticle) -> Result<Species, IngestError> {
    match Species::from_tag(src.tag) {
        Some(species @ (Species::DarkMatter | Species::Gas)) => Ok(species),
        Some(species @ (Species::Star | Species::BlackHole)) => {
            Err(IngestError::UnsupportedSpecies { index, species })
        }
        None => Err(IngestError::UnknownSpecies {
            index,
            tag: src.tag,
        }),
    }
}

fn copy(
    source: &[SourceParticle],
    counts: SourceCounts,
    mode: PartitionMode,
) -> Result<(Vec<Particle>, Layout), IngestError> {
    if source.len() != counts.num_gravity {
        return Err(IngestError::CountMismatch {
            population: "gravity",
            expected: counts.num_gravity,
            found: source.len(),
        });
    }
    match mode {
        PartitionMode::Preserve => {
            let particles = source
                .iter()
                .enumerate()
                .map(|(i, src)| decode(i, src).map(|s| Particle::from_source(src, s)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((particles, Layout::Mixed))
        }
        PartitionMode::DarkFirst => {
            let ndark = counts.ndark()?;
            let mut particles = vec![Particle::default(); source.len()];
            let mut dark_cursor = 0;
            let mut gas_cursor = ndark;
            for (i, src) in source.iter().enumerate() {
                let species = decode(i, src)?;
                let slot = match species {
                    Species::DarkMatter if dark_cursor < ndark => &mut dark_cursor,
                    Species::Gas if gas_cursor < source.len() => &mut gas_cursor,
                    Species::DarkMatter => {
                        return Err(IngestError::CountMismatch {
                            population: "dark matter",
                            expected: ndark,
                            found: ndark + 1,
                        })
                    }
                    _ => {
                        return Err(IngestError::CountMismatch {
                            population: "gas",
                            expected: counts.num_hydro,
                            found: counts.num_hydro + 1,
                        })
                    }
                };
                particles[*slot] = Particle::from_source(src, species);
                *slot += 1;
            }
            debug_assert_eq!(dark_cursor, ndark);
            debug_assert_eq!(gas_cursor, source.len());
            Ok((particles, Layout::DarkFirst { ndark }))
        }
    }
}

/// Copy host particles into a new arena.
///
/// In [`PartitionMode::DarkFirst`] dark matter lands in `[0, ndark)` and gas
/// in `[ndark, ndark + ngas)`, both stable, in a single pass. Star, black
/// hole and unknown tags, or counts that disagree with the tags, abort the
/// invocation.
pub fn partition(
    source: &[SourceParticle],
    counts: SourceCounts,
    mode: PartitionMode,
    config: &ArenaConfig,
) -> Result<ParticleArena, PipelineError> {
    let start = Instant::now();
    let (particles, layout) = copy(source, counts, mode).map_err(|e| {
        error!(error = %e, "particle ingestion failed");
        PipelineError::Ingest(e)
    })?;
    let arena = ParticleArena::new(particles, layout, config)?;
    let elapsed_us = start.elapsed().as_micros() as u64;
    info!(
        elapsed_us,
        particles = arena.len(),
        capacity = arena.capacity(),
        memory_gb = arena.memory_bytes() as f64 / (1024.0 * 1024.0 * 1024.0),
        "copied particles into local storage"
    );
    if let Layout::DarkFirst { ndark } = layout {
        info!(ndark, nbaryons = arena.len() - ndark, "dark matter placed before gas");
    }
    Ok(arena)
}
