//! Catalog writers and the output-format registry.
//!
//! Writers are runtime strategies keyed by [`OutputFormat`]. The engine
//! checks at initialisation that the configured format has a registered
//! factory, and opens one writer per invocation.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use halo_core::{GroupParticleLists, OutputFormat, Particle, PropBuffer, SnapshotTag};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ── Side-output records ─────────────────────────────────────────

/// Simulation state written alongside each catalog.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    /// Whether the run is cosmological.
    pub cosmological: bool,
    /// Scale factor of the snapshot.
    pub scale_factor: f64,
    /// Dimensionless Hubble parameter.
    pub hubble_param: f64,
    /// Matter density parameter.
    pub omega_m: f64,
    /// Baryon density parameter.
    pub omega_b: f64,
    /// Cold dark matter density parameter.
    pub omega_cdm: f64,
    /// Dark energy density parameter.
    pub omega_lambda: f64,
    /// Dark energy equation of state.
    pub w_de: f64,
    /// Physical box period.
    pub period: f64,
    /// Background matter density.
    pub rho_background: f64,
    /// Virial overdensity in use.
    pub virial_level: f64,
}

/// Unit conversions written alongside each catalog.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitSummary {
    /// Internal length unit in kpc.
    pub length_to_kpc: f64,
    /// Internal velocity unit in km/s.
    pub velocity_to_kms: f64,
    /// Internal mass unit in solar masses.
    pub mass_to_solar_mass: f64,
    /// Gravitational constant in internal units.
    pub gravity: f64,
    /// Hubble unit in internal units.
    pub hubble_unit: f64,
    /// Whether lengths in the catalog are comoving.
    pub comoving: bool,
}

// ── WriterError ─────────────────────────────────────────────────

/// Errors raised by catalog writers and the registry.
#[derive(Debug, PartialEq)]
pub enum WriterError {
    /// Filesystem failure.
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying error message.
        reason: String,
    },
    /// Record encoding failed.
    Encode {
        /// Underlying error message.
        reason: String,
    },
    /// No backend is registered for the format.
    Unavailable {
        /// Requested format.
        format: OutputFormat,
    },
}

impl WriterError {
    /// Wrap an I/O error with the file it concerns.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for WriterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, reason } => write!(f, "writing {}: {reason}", path.display()),
            Self::Encode { reason } => write!(f, "encoding catalog: {reason}"),
            Self::Unavailable { format } => {
                write!(f, "output format {format} has no registered writer")
            }
        }
    }
}

impl Error for WriterError {}

// ── CatalogWriter ───────────────────────────────────────────────

/// Where and how one invocation's catalogs are written.
#[derive(Clone, Debug, PartialEq)]
pub struct WriterTarget {
    /// Base path; writers append their own suffixes.
    pub output_name: PathBuf,
    /// Snapshot tag qualifying every group id in the catalogs.
    pub snapshot: SnapshotTag,
    /// Split halos and substructure into separate files.
    pub separate_files: bool,
    /// Write extended per-particle output.
    pub extended_output: bool,
}

impl WriterTarget {
    /// `output_name` with `suffix` appended (`<name>.<suffix>`).
    pub fn path_with(&self, suffix: &str) -> PathBuf {
        let mut s = self.output_name.clone().into_os_string();
        s.push(".");
        s.push(suffix);
        PathBuf::from(s)
    }
}

/// Emits one invocation's catalogs.
///
/// Calls arrive in a fixed order: `write_simulation_info`,
/// `write_unit_info`, `write_properties`, `write_group_catalog`, optionally
/// `write_species_catalog`, then `finish`.
pub trait CatalogWriter: Send {
    /// Format this writer produces.
    fn format(&self) -> OutputFormat;

    /// Simulation state for the snapshot.
    fn write_simulation_info(&mut self, sim: &SimulationSummary) -> Result<(), WriterError>;

    /// Unit conversions for the snapshot.
    fn write_unit_info(&mut self, units: &UnitSummary) -> Result<(), WriterError>;

    /// Per-group properties.
    fn write_properties(&mut self, props: &PropBuffer) -> Result<(), WriterError>;

    /// Group sizes and member particle ids, most bound first.
    fn write_group_catalog(
        &mut self,
        num_in_group: &[usize],
        lists: &GroupParticleLists,
        particles: &[Particle],
    ) -> Result<(), WriterError>;

    /// Species of every listed member, same order as the group catalog.
    fn write_species_catalog(
        &mut self,
        lists: &GroupParticleLists,
        particles: &[Particle],
    ) -> Result<(), WriterError>;

    /// Flush everything to storage.
    fn finish(&mut self) -> Result<(), WriterError> {
        Ok(())
    }
}

// ── WriterRegistry ──────────────────────────────────────────────

/// Opens a writer for one invocation.
pub type WriterFactory =
    Box<dyn Fn(&WriterTarget) -> Result<Box<dyn CatalogWriter>, WriterError> + Send + Sync>;

/// Output formats with a registered backend.
#[derive(Default)]
pub struct WriterRegistry {
    factories: IndexMap<OutputFormat, WriterFactory>,
}

impl WriterRegistry {
    /// An empty registry; every format is unavailable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the backend for `format`.
    pub fn register(&mut self, format: OutputFormat, factory: WriterFactory) {
        self.factories.insert(format, factory);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, format: OutputFormat, factory: WriterFactory) -> Self {
        self.register(format, factory);
        self
    }

    /// Whether `format` has a backend.
    pub fn is_available(&self, format: OutputFormat) -> bool {
        self.factories.contains_key(&format)
    }

    /// Registered formats in registration order.
    pub fn formats(&self) -> impl Iterator<Item = OutputFormat> + '_ {
        self.factories.keys().copied()
    }

    /// Open a writer for `format`.
    pub fn open(
        &self,
        format: OutputFormat,
        target: &WriterTarget,
    ) -> Result<Box<dyn CatalogWriter>, WriterError> {
        let factory = self
            .factories
            .get(&format)
            .ok_or(WriterError::Unavailable { format })?;
        factory(target)
    }
}

impl fmt::Debug for WriterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
