//! Cosmology and unit normalisation.
//!
//! The host supplies comoving quantities and the cosmological state of the
//! snapshot. [`normalize`] turns them into the physical, per-invocation
//! values stored in [`Derived`]. It always starts from the immutable base
//! configuration, so running it once per invocation never compounds a
//! scale factor.

use std::f64::consts::PI;
use std::path::PathBuf;

use halo_core::SnapshotTag;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RunConfig;

// ── Host-supplied records ───────────────────────────────────────

/// Cosmological state of one snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CosmoInfo {
    /// Expansion factor `a`.
    pub scale_factor: f64,
    /// Dimensionless Hubble parameter `h`.
    pub hubble_param: f64,
    /// Total matter density parameter.
    pub omega_m: f64,
    /// Baryon density parameter.
    pub omega_b: f64,
    /// Cold dark matter density parameter.
    pub omega_cdm: f64,
    /// Dark energy density parameter.
    pub omega_lambda: f64,
    /// Dark energy equation of state parameter.
    pub w_de: f64,
}

impl Default for CosmoInfo {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            hubble_param: 1.0,
            omega_m: 1.0,
            omega_b: 0.0,
            omega_cdm: 1.0,
            omega_lambda: 0.0,
            w_de: -1.0,
        }
    }
}

impl CosmoInfo {
    /// Curvature density parameter `1 - Ω_m - Ω_Λ`.
    pub fn omega_k(&self) -> f64 {
        1.0 - self.omega_m - self.omega_lambda
    }

    /// Curvature and dark energy terms of `E²(a)`.
    fn non_matter_terms(&self) -> f64 {
        let a = self.scale_factor;
        self.omega_k() * a.powi(-2) + self.omega_lambda * a.powf(-3.0 * (1.0 + self.w_de))
    }

    /// Dimensionless expansion rate squared, `E²(a) = H²(a) / H₀²`.
    pub fn e2(&self) -> f64 {
        self.non_matter_terms() + self.omega_m * self.scale_factor.powi(-3)
    }
}

/// Mesh geometry of the host's top-level cell decomposition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshInfo {
    /// Extent of the domain along each axis.
    pub space_dimension: [f64; 3],
    /// Width of a cell along each axis.
    pub cell_width: [f64; 3],
    /// Inverse cell width along each axis.
    pub inverse_cell_width: [f64; 3],
    /// Total number of top-level cells.
    pub num_cells: usize,
    /// Lower corner of every cell.
    pub cell_locations: Vec<[f64; 3]>,
}

/// Static description of the simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimInfo {
    /// Comoving box period; 0 for non-periodic volumes.
    pub period: f64,
    /// Comoving mean inter-particle spacing.
    pub interparticle_spacing: f64,
    /// Whether the run is cosmological.
    pub cosmological: bool,
    /// Mass of the high-resolution dark matter particles in zoom runs.
    pub zoom_high_res_mass: f64,
    /// Whether the run contains dark matter.
    pub has_dark_matter: bool,
    /// Whether the run contains gas.
    pub has_gas: bool,
    /// Whether the run contains stars.
    pub has_stars: bool,
    /// Top-level mesh.
    pub mesh: MeshInfo,
}

impl Default for SimInfo {
    fn default() -> Self {
        Self {
            period: 0.0,
            interparticle_spacing: 1.0,
            cosmological: false,
            zoom_high_res_mass: 0.0,
            has_dark_matter: true,
            has_gas: false,
            has_stars: false,
            mesh: MeshInfo::default(),
        }
    }
}

/// Unit conversions captured once at initialisation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitInfo {
    /// Internal length unit in kpc.
    pub length_to_kpc: f64,
    /// Internal velocity unit in km/s.
    pub velocity_to_kms: f64,
    /// Internal mass unit in solar masses.
    pub mass_to_solar_mass: f64,
    /// Internal energy per unit mass.
    pub energy_per_unit_mass: f64,
    /// Gravitational constant in internal units.
    pub gravity: f64,
    /// Hubble constant for `h = 1` in internal units.
    pub hubble_unit: f64,
}

impl Default for UnitInfo {
    fn default() -> Self {
        Self {
            length_to_kpc: 1.0,
            velocity_to_kms: 1.0,
            mass_to_solar_mass: 1.0,
            energy_per_unit_mass: 1.0,
            gravity: 1.0,
            hubble_unit: 1.0,
        }
    }
}

// ── Derived ─────────────────────────────────────────────────────

/// Mesh geometry copied into the derived record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshGeometry {
    /// Extent of the domain along each axis.
    pub space_dimension: [f64; 3],
    /// Width of a cell along each axis.
    pub cell_width: [f64; 3],
    /// Inverse cell width along each axis.
    pub inverse_cell_width: [f64; 3],
    /// Total number of top-level cells.
    pub num_cells: usize,
    /// Cells per axis, `cbrt(num_cells)`.
    pub num_cells_per_dim: f64,
    /// Lower corner of every cell.
    pub cell_locations: Vec<[f64; 3]>,
}

/// Per-invocation values computed from the base configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Derived {
    /// Cosmology of the current snapshot.
    pub cosmology: CosmoInfo,
    /// Whether the run is cosmological.
    pub cosmological: bool,
    /// Hubble rate at the snapshot, internal units.
    pub hubble: f64,
    /// Background matter density.
    pub rho_background: f64,
    /// Critical density.
    pub rho_critical: f64,
    /// Virial overdensity relative to the background.
    pub virial_level: f64,
    /// Physical box period.
    pub period: f64,
    /// Physical inter-particle spacing.
    pub spacing: f64,
    /// Physical gravitational softening.
    pub softening: f64,
    /// Physical linking length of the full-set search.
    pub linking_length: f64,
    /// Mesh geometry.
    pub mesh: MeshGeometry,
    /// High-resolution dark matter mass for zoom runs.
    pub zoom_high_res_mass: f64,
    /// Minimum group size used when stitching groups across ranks.
    pub min_stitch_size: usize,
    /// Base path of this invocation's catalogs.
    pub output_name: PathBuf,
    /// Snapshot tag applied to group ids.
    pub snapshot: SnapshotTag,
}

/// Bryan & Norman (1998) virial overdensity relative to the background.
pub fn bryan_norman(cosmo: &CosmoInfo) -> f64 {
    let x = -cosmo.non_matter_terms() / cosmo.e2();
    (18.0 * PI * PI + 82.0 * x - 39.0 * x * x) / cosmo.omega_m
}

/// Recompute `config.derived` for one invocation.
///
/// Must run after [`RunConfig::validate`] and before any pipeline stage.
/// The output name and snapshot tag are left for the caller to fill.
pub fn normalize(config: &mut RunConfig, cosmo: &CosmoInfo, sim: &SimInfo, units: &UnitInfo) {
    let output_name = std::mem::take(&mut config.derived.output_name);
    let snapshot = config.derived.snapshot;

    let mut d = Derived {
        cosmology: *cosmo,
        cosmological: sim.cosmological,
        zoom_high_res_mass: sim.zoom_high_res_mass,
        output_name,
        snapshot,
        ..Derived::default()
    };

    let mut period = sim.period;
    let mut spacing = sim.interparticle_spacing;
    if sim.cosmological {
        let e2 = cosmo.e2();
        if e2 <= 0.0 || !e2.is_finite() {
            warn!(e2, a = cosmo.scale_factor, "non-positive expansion rate");
        }
        d.hubble = cosmo.hubble_param * units.hubble_unit * e2.max(0.0).sqrt();
        d.rho_critical = 3.0 * d.hubble * d.hubble / (8.0 * PI * units.gravity);
        d.rho_background = d.rho_critical * cosmo.omega_m;
        d.virial_level = if config.virial_level < 0.0 {
            bryan_norman(cosmo)
        } else {
            config.virial_level
        };
        period *= cosmo.scale_factor;
        spacing *= cosmo.scale_factor;
    } else {
        d.rho_background = 1.0;
        d.rho_critical = 1.0;
        d.virial_level = if config.virial_level < 0.0 {
            18.0 * PI * PI
        } else {
            config.virial_level
        };
    }
    d.period = period;
    d.spacing = spacing;
    d.softening = config.softening_factor * spacing;
    d.linking_length = config.linking_length * spacing;

    d.mesh = MeshGeometry {
        space_dimension: sim.mesh.space_dimension,
        cell_width: sim.mesh.cell_width,
        inverse_cell_width: sim.mesh.inverse_cell_width,
        num_cells: sim.mesh.num_cells,
        num_cells_per_dim: (sim.mesh.num_cells as f64).cbrt(),
        cell_locations: sim.mesh.cell_locations.clone(),
    };

    d.min_stitch_size = if config.single_halo {
        config.min_size
    } else {
        config.resolved_halo_min_size()
    };

    debug!(
        rho_background = d.rho_background,
        virial_level = d.virial_level,
        period = d.period,
        linking_length = d.linking_length,
        "normalised simulation state"
    );
    config.derived = d;
}
