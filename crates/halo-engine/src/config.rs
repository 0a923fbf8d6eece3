//! Run configuration, validation, and error types.
//!
//! [`RunConfig`] is built by a [`ParamLoader`](crate::params::ParamLoader),
//! checked once by [`validate()`](RunConfig::validate) at initialisation,
//! and then passed by reference to every stage. Per-invocation values live
//! in [`Derived`] and are rewritten by
//! [`normalize`](crate::cosmology::normalize).

use std::error::Error;
use std::fmt;

use halo_arena::{ArenaConfig, ArenaError};
use halo_core::{BaryonMode, OutputFormat, SearchType};
use halo_kernel::{SearchParams, WriterRegistry};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cosmology::{Derived, SimInfo, UnitInfo};

// ── FofScheme ──────────────────────────────────────────────────────

/// Algorithm used to find field objects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FofScheme {
    /// Configuration-space FOF.
    #[default]
    Fof3d,
    /// 3D FOF followed by a single-dispersion 6D FOF.
    Fof6d,
    /// 3D FOF followed by an adaptive-dispersion 6D FOF.
    Fof6dAdaptive,
    /// 3D FOF followed by phase-space stream finding.
    StreamNoSubset,
}

impl fmt::Display for FofScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fof3d => write!(f, "3d FOF"),
            Self::Fof6d => write!(f, "3d FOF then single-dispersion 6d FOF"),
            Self::Fof6dAdaptive => write!(f, "3d FOF then adaptive-dispersion 6d FOF"),
            Self::StreamNoSubset => write!(f, "3d FOF then phase-space stream finding"),
        }
    }
}

// ── Nested sections ────────────────────────────────────────────────

/// Halo core search for disentangling mergers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSearchConfig {
    /// Search for 6D FOF cores.
    pub enabled: bool,
    /// Adapt core linking lengths.
    pub adaptive_linking: bool,
    /// Grow cores with the phase-space tensor.
    pub phase_space_growth: bool,
}

/// Catalog output options.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Catalog format.
    pub format: OutputFormat,
    /// Split halos and substructure into separate files.
    pub separate_files: bool,
    /// Write extended per-particle output.
    pub extended_output: bool,
    /// Write lengths in comoving units.
    pub comoving_units: bool,
}

/// Particle storage options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Extra capacity reserved beyond the local particle count, as a
    /// fraction of it.
    pub growth_factor: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            growth_factor: ArenaConfig::DEFAULT_GROWTH_FACTOR,
        }
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Incompatible option combinations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictKind {
    /// Separate baryon search requested while searching a single baryonic
    /// species.
    BaryonSearchWithSpeciesSearch {
        /// The configured search type.
        search_type: SearchType,
    },
    /// Bound field objects requested together with keeping the 3D FOF.
    BoundHalosWithKeepFof,
    /// Dark matter search in a run without dark matter.
    NoDarkMatterForDarkSearch,
    /// Dark matter defines the links but the run has none.
    NoDarkMatterForLinks,
    /// Gas search in a run without gas.
    NoGasForGasSearch,
    /// Star search in a run without stars.
    NoStarsForStarSearch,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BaryonSearchWithSpeciesSearch { search_type } => write!(
                f,
                "separate baryon search is on while searching only {search_type}"
            ),
            Self::BoundHalosWithKeepFof => {
                write!(f, "bound field objects cannot be combined with keeping the 3d FOF")
            }
            Self::NoDarkMatterForDarkSearch => {
                write!(f, "simulation has no dark matter but only dark matter is searched")
            }
            Self::NoDarkMatterForLinks => write!(
                f,
                "simulation has no dark matter but dark matter defines links for the baryon search"
            ),
            Self::NoGasForGasSearch => {
                write!(f, "simulation has no gas but only gas is searched")
            }
            Self::NoStarsForStarSearch => {
                write!(f, "simulation has no stars but only stars are searched")
            }
        }
    }
}

/// Errors detected while loading or validating the configuration.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// The parameter source or a required option is absent.
    Missing {
        /// Name of the missing option or source.
        option: String,
    },
    /// An option could not be parsed or is out of range.
    Invalid {
        /// Name of the option.
        option: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The output format has no registered backend.
    Unavailable {
        /// Requested format.
        format: OutputFormat,
    },
    /// Options conflict with each other or with the simulation.
    Conflict(ConflictKind),
    /// Particle storage options are invalid.
    Arena(ArenaError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { option } => write!(f, "missing option: {option}"),
            Self::Invalid { option, reason } => write!(f, "invalid option {option}: {reason}"),
            Self::Unavailable { format } => {
                write!(f, "output format {format} is not available in this build")
            }
            Self::Conflict(kind) => write!(f, "configuration conflict: {kind}"),
            Self::Arena(e) => write!(f, "memory: {e}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Arena(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArenaError> for ConfigError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}

impl From<ConflictKind> for ConfigError {
    fn from(kind: ConflictKind) -> Self {
        Self::Conflict(kind)
    }
}

// ── RunConfig ──────────────────────────────────────────────────────

/// Complete configuration of the structure finder.
///
/// Every field has a default, so a parameter file only lists what it
/// changes. `derived` is never read from or written to a parameter file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Which particles the full-set search links.
    pub search_type: SearchType,
    /// Field-object algorithm.
    pub fof_scheme: FofScheme,
    /// Separate baryon treatment.
    pub baryon_mode: BaryonMode,
    /// Require field objects to be self-bound.
    pub bound_halos: bool,
    /// Keep the 3D FOF objects as base objects after the 6D search.
    pub keep_fof: bool,
    /// Compute inclusive (aperture) halo masses.
    pub inclusive_halo: bool,
    /// Search for substructure inside field halos.
    pub sub_search: bool,
    /// Treat the volume as a single halo and skip the field search.
    pub single_halo: bool,
    /// Minimum particle count of a substructure.
    pub min_size: usize,
    /// Minimum particle count of a field halo; defaults to `min_size`.
    pub halo_min_size: Option<usize>,
    /// Full-set linking length in units of the inter-particle spacing.
    pub linking_length: f64,
    /// Substructure linking length as a fraction of the full-set one.
    pub sub_linking_scale: f64,
    /// Gravitational softening in units of the inter-particle spacing.
    pub softening_factor: f64,
    /// Allowed potential-to-kinetic ratio when unbinding.
    pub energy_ratio: f64,
    /// Virial overdensity relative to the background; negative selects the
    /// Bryan & Norman fit.
    pub virial_level: f64,
    /// Halo core search.
    pub core: CoreSearchConfig,
    /// Catalog output.
    pub output: OutputConfig,
    /// Particle storage.
    pub memory: MemoryConfig,
    /// Values recomputed for every invocation.
    #[serde(skip)]
    pub derived: Derived,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            search_type: SearchType::DarkMatter,
            fof_scheme: FofScheme::Fof3d,
            baryon_mode: BaryonMode::Off,
            bound_halos: false,
            keep_fof: false,
            inclusive_halo: false,
            sub_search: true,
            single_halo: false,
            min_size: 20,
            halo_min_size: None,
            linking_length: 0.2,
            sub_linking_scale: 0.5,
            softening_factor: 0.0,
            energy_ratio: 0.2,
            virial_level: -1.0,
            core: CoreSearchConfig::default(),
            output: OutputConfig::default(),
            memory: MemoryConfig::default(),
            derived: Derived::default(),
        }
    }
}

impl RunConfig {
    /// Check option consistency against the simulation and the available
    /// writers.
    ///
    /// Rules are applied in order and the first failure is returned. On
    /// success `halo_min_size` is resolved and a summary is logged.
    /// Validating an already-validated configuration is a no-op.
    pub fn validate(&mut self, sim: &SimInfo, writers: &WriterRegistry) -> Result<(), ConfigError> {
        let baryons_on = self.baryon_mode.is_on();

        // 1. A separate baryon search only makes sense when dark matter (or
        //    everything) is searched first.
        if baryons_on && !matches!(self.search_type, SearchType::All | SearchType::DarkMatter) {
            return Err(ConflictKind::BaryonSearchWithSpeciesSearch {
                search_type: self.search_type,
            }
            .into());
        }
        // 2. Bound field objects and kept 3D FOF objects are exclusive.
        if self.bound_halos && self.keep_fof {
            return Err(ConflictKind::BoundHalosWithKeepFof.into());
        }
        // 3. Halo minimum size defaults to the substructure minimum.
        if self.halo_min_size.is_none() {
            self.halo_min_size = Some(self.min_size);
        }
        // 4. The searched species must exist.
        //    4a. dark matter search needs dark matter.
        if !sim.has_dark_matter && self.search_type == SearchType::DarkMatter {
            return Err(ConflictKind::NoDarkMatterForDarkSearch.into());
        }
        //    4b. dark matter defines links for an all-species baryon search.
        if !sim.has_dark_matter && self.search_type == SearchType::All && baryons_on {
            return Err(ConflictKind::NoDarkMatterForLinks.into());
        }
        //    4c. gas search needs gas.
        if !sim.has_gas && self.search_type == SearchType::Gas {
            return Err(ConflictKind::NoGasForGasSearch.into());
        }
        //    4d. star search needs stars.
        if !sim.has_stars && self.search_type == SearchType::Star {
            return Err(ConflictKind::NoStarsForStarSearch.into());
        }
        // 5. The output format must have a backend.
        if !writers.is_available(self.output.format) {
            return Err(ConfigError::Unavailable {
                format: self.output.format,
            });
        }
        // 6. Storage headroom must be usable.
        ArenaConfig::new(self.memory.growth_factor).validate()?;

        self.log_summary();
        Ok(())
    }

    /// `halo_min_size`, falling back to `min_size` before validation.
    pub fn resolved_halo_min_size(&self) -> usize {
        self.halo_min_size.unwrap_or(self.min_size)
    }

    /// Storage configuration for the particle arena.
    pub fn arena_config(&self) -> ArenaConfig {
        ArenaConfig::new(self.memory.growth_factor)
    }

    /// Kernel parameters from the base options and the derived record.
    pub fn search_params(&self, units: &UnitInfo) -> SearchParams {
        let d = &self.derived;
        SearchParams {
            search_type: self.search_type,
            baryon_mode: self.baryon_mode,
            linking_length: d.linking_length,
            sub_linking_scale: self.sub_linking_scale,
            period: d.period,
            min_size: self.min_size,
            halo_min_size: self.resolved_halo_min_size(),
            rho_background: d.rho_background,
            rho_critical: d.rho_critical,
            virial_level: d.virial_level,
            softening: d.softening,
            gravity: units.gravity,
            energy_ratio: self.energy_ratio,
            inclusive_halo: self.inclusive_halo,
            separate_files: self.output.separate_files,
            snapshot: d.snapshot,
        }
    }

    fn log_summary(&self) {
        info!(search_type = %self.search_type, "config summary: particle search");
        info!(scheme = %self.fof_scheme, keep_fof = self.keep_fof, "config summary: field objects");
        match self.baryon_mode {
            BaryonMode::Off => {}
            BaryonMode::Substructure => {
                info!("config summary: baryons treated separately for substructure search")
            }
            BaryonMode::SubstructureAndField => info!(
                "config summary: baryons treated separately for substructure and field search"
            ),
        }
        if self.single_halo {
            info!("config summary: field objects not searched, assuming a single halo");
        }
        info!(energy_ratio = self.energy_ratio, "config summary: unbinding");
        let halo_min = self.resolved_halo_min_size();
        if halo_min != self.min_size {
            info!(
                halo_min_size = halo_min,
                min_size = self.min_size,
                "config summary: halos and substructure use different minimum sizes"
            );
        }
        info!(
            format = %self.output.format,
            separate_files = self.output.separate_files,
            extended_output = self.output.extended_output,
            comoving_units = self.output.comoving_units,
            "config summary: output"
        );
        if self.core.enabled {
            info!(
                adaptive_linking = self.core.adaptive_linking,
                phase_space_growth = self.core.phase_space_growth,
                "config summary: halo core search"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halo_kernel::{CatalogWriter, WriterError, WriterTarget};

    fn registry() -> WriterRegistry {
        WriterRegistry::new().with(
            OutputFormat::Ascii,
            Box::new(|_: &WriterTarget| -> Result<Box<dyn CatalogWriter>, WriterError> {
                Err(WriterError::Encode {
                    reason: "unused".into(),
                })
            }),
        )
    }

    fn sim() -> SimInfo {
        SimInfo {
            has_dark_matter: true,
            has_gas: true,
            has_stars: true,
            ..SimInfo::default()
        }
    }

    fn conflict(cfg: &mut RunConfig, sim: &SimInfo) -> ConflictKind {
        match cfg.validate(sim, &registry()) {
            Err(ConfigError::Conflict(kind)) => kind,
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn default_config_is_valid() {
        let mut cfg = RunConfig::default();
        assert!(cfg.validate(&sim(), &registry()).is_ok());
    }

    #[test]
    fn rule1_baryon_search_with_gas_search() {
        let mut cfg = RunConfig {
            baryon_mode: BaryonMode::Substructure,
            search_type: SearchType::Gas,
            ..RunConfig::default()
        };
        assert_eq!(
            conflict(&mut cfg, &sim()),
            ConflictKind::BaryonSearchWithSpeciesSearch {
                search_type: SearchType::Gas
            }
        );
    }

    #[test]
    fn rule1_allows_all_and_dark_matter() {
        for st in [SearchType::All, SearchType::DarkMatter] {
            let mut cfg = RunConfig {
                baryon_mode: BaryonMode::SubstructureAndField,
                search_type: st,
                ..RunConfig::default()
            };
            assert!(cfg.validate(&sim(), &registry()).is_ok());
        }
    }

    #[test]
    fn rule2_bound_halos_with_keep_fof() {
        let mut cfg = RunConfig {
            bound_halos: true,
            keep_fof: true,
            ..RunConfig::default()
        };
        assert_eq!(conflict(&mut cfg, &sim()), ConflictKind::BoundHalosWithKeepFof);
    }

    #[test]
    fn rule3_halo_min_size_defaults_to_min_size() {
        let mut cfg = RunConfig {
            min_size: 32,
            ..RunConfig::default()
        };
        cfg.validate(&sim(), &registry()).unwrap();
        assert_eq!(cfg.halo_min_size, Some(32));
    }

    #[test]
    fn rule3_explicit_halo_min_size_kept() {
        let mut cfg = RunConfig {
            min_size: 32,
            halo_min_size: Some(100),
            ..RunConfig::default()
        };
        cfg.validate(&sim(), &registry()).unwrap();
        assert_eq!(cfg.halo_min_size, Some(100));
    }

    #[test]
    fn rule4a_no_dark_matter() {
        let s = SimInfo {
            has_dark_matter: false,
            ..sim()
        };
        let mut cfg = RunConfig::default();
        assert_eq!(conflict(&mut cfg, &s), ConflictKind::NoDarkMatterForDarkSearch);
    }

    #[test]
    fn rule4b_no_dark_matter_for_links() {
        let s = SimInfo {
            has_dark_matter: false,
            ..sim()
        };
        let mut cfg = RunConfig {
            search_type: SearchType::All,
            baryon_mode: BaryonMode::Substructure,
            ..RunConfig::default()
        };
        assert_eq!(conflict(&mut cfg, &s), ConflictKind::NoDarkMatterForLinks);

        let mut plain = RunConfig {
            search_type: SearchType::All,
            ..RunConfig::default()
        };
        assert!(plain.validate(&s, &registry()).is_ok());
    }

    #[test]
    fn rule4c_no_gas() {
        let s = SimInfo {
            has_gas: false,
            ..sim()
        };
        let mut cfg = RunConfig {
            search_type: SearchType::Gas,
            ..RunConfig::default()
        };
        assert_eq!(conflict(&mut cfg, &s), ConflictKind::NoGasForGasSearch);
    }

    #[test]
    fn rule4d_no_stars() {
        let s = SimInfo {
            has_stars: false,
            ..sim()
        };
        let mut cfg = RunConfig {
            search_type: SearchType::Star,
            ..RunConfig::default()
        };
        assert_eq!(conflict(&mut cfg, &s), ConflictKind::NoStarsForStarSearch);
    }

    #[test]
    fn rule5_unregistered_format() {
        for format in [OutputFormat::Hdf, OutputFormat::Adios, OutputFormat::Binary] {
            let mut cfg = RunConfig::default();
            cfg.output.format = format;
            assert_eq!(
                cfg.validate(&sim(), &registry()),
                Err(ConfigError::Unavailable { format })
            );
        }
    }

    #[test]
    fn rule6_bad_growth_factor() {
        let mut cfg = RunConfig::default();
        cfg.memory.growth_factor = -1.0;
        assert!(matches!(
            cfg.validate(&sim(), &registry()),
            Err(ConfigError::Arena(ArenaError::InvalidGrowthFactor { .. }))
        ));
    }

    #[test]
    fn earlier_rule_wins() {
        let mut cfg = RunConfig {
            baryon_mode: BaryonMode::Substructure,
            search_type: SearchType::Star,
            bound_halos: true,
            keep_fof: true,
            ..RunConfig::default()
        };
        cfg.output.format = OutputFormat::Hdf;
        assert!(matches!(
            conflict(&mut cfg, &SimInfo::default()),
            ConflictKind::BaryonSearchWithSpeciesSearch { .. }
        ));
    }

    #[test]
    fn validation_is_idempotent() {
        let mut cfg = RunConfig {
            min_size: 15,
            ..RunConfig::default()
        };
        cfg.validate(&sim(), &registry()).unwrap();
        let once = cfg.clone();
        cfg.validate(&sim(), &registry()).unwrap();
        assert_eq!(cfg, once);
    }

    #[test]
    fn search_params_use_physical_lengths() {
        let mut cfg = RunConfig::default();
        cfg.derived.linking_length = 0.4;
        cfg.derived.period = 50.0;
        let units = UnitInfo {
            gravity: 43.0,
            ..UnitInfo::default()
        };
        let p = cfg.search_params(&units);
        assert_eq!(p.linking_length, 0.4);
        assert_eq!(p.period, 50.0);
        assert_eq!(p.gravity, 43.0);
        assert_eq!(p.halo_min_size, cfg.min_size);
    }

    #[test]
    fn toml_round_trip_skips_derived() {
        let mut cfg = RunConfig::default();
        cfg.derived.rho_background = 5.0;
        let text = toml::to_string(&cfg).unwrap();
        let back: RunConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.derived, Derived::default());
        assert_eq!(back.min_size, cfg.min_size);
    }
}
