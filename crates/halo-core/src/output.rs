//! Catalog output formats.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog serialization selected in the configuration.
///
/// Which formats can actually be written is decided at runtime by the
/// writer registry; the configuration validator rejects formats without a
/// registered backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text catalogs.
    #[default]
    Ascii,
    /// Raw binary catalogs.
    Binary,
    /// HDF5 catalogs.
    Hdf,
    /// ADIOS catalogs.
    Adios,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascii => write!(f, "ascii"),
            Self::Binary => write!(f, "binary"),
            Self::Hdf => write!(f, "hdf"),
            Self::Adios => write!(f, "adios"),
        }
    }
}
