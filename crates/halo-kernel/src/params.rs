//! Resolved search parameters handed to every kernel.

use halo_core::{BaryonMode, SearchType, SnapshotTag};

/// Physical, per-invocation parameters for the search kernels.
///
/// Built by the engine from the validated configuration after the
/// cosmology normaliser has run, so every length here is physical and
/// every threshold is resolved (no "auto" sentinels).
#[derive(Clone, Debug, PartialEq)]
pub struct SearchParams {
    /// Which species the full-set search links.
    pub search_type: SearchType,
    /// How baryons are treated.
    pub baryon_mode: BaryonMode,
    /// Physical linking length of the full-set search.
    pub linking_length: f64,
    /// Linking length of the substructure search as a fraction of
    /// `linking_length`.
    pub sub_linking_scale: f64,
    /// Physical box period; 0 for non-periodic volumes.
    pub period: f64,
    /// Minimum particle count of a substructure.
    pub min_size: usize,
    /// Minimum particle count of a field halo.
    pub halo_min_size: usize,
    /// Background matter density.
    pub rho_background: f64,
    /// Critical density.
    pub rho_critical: f64,
    /// Virial overdensity relative to the background.
    pub virial_level: f64,
    /// Physical gravitational softening.
    pub softening: f64,
    /// Gravitational constant in internal units.
    pub gravity: f64,
    /// Allowed potential-to-kinetic ratio when unbinding.
    pub energy_ratio: f64,
    /// Whether inclusive halo masses are computed.
    pub inclusive_halo: bool,
    /// Whether catalogs are split into separate halo/substructure files.
    pub separate_files: bool,
    /// Snapshot tag applied to catalog ids.
    pub snapshot: SnapshotTag,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            search_type: SearchType::DarkMatter,
            baryon_mode: BaryonMode::Off,
            linking_length: 0.2,
            sub_linking_scale: 0.5,
            period: 0.0,
            min_size: 20,
            halo_min_size: 20,
            rho_background: 1.0,
            rho_critical: 1.0,
            virial_level: 18.0 * std::f64::consts::PI * std::f64::consts::PI,
            softening: 0.0,
            gravity: 1.0,
            energy_ratio: 1.0,
            inclusive_halo: false,
            separate_files: false,
            snapshot: SnapshotTag::default(),
        }
    }
}
