//! Search-mode selectors shared by the configuration and the kernels.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::species::Species;

/// Which particles the full-set search links.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// Every particle regardless of species.
    All,
    /// Dark matter only.
    #[default]
    DarkMatter,
    /// Gas only.
    Gas,
    /// Stars only.
    Star,
    /// Black holes only.
    BlackHole,
}

impl SearchType {
    /// Whether particles of `species` take part in linking.
    pub fn links(self, species: Species) -> bool {
        match self {
            Self::All => true,
            Self::DarkMatter => species == Species::DarkMatter,
            Self::Gas => species == Species::Gas,
            Self::Star => species == Species::Star,
            Self::BlackHole => species == Species::BlackHole,
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all particles"),
            Self::DarkMatter => write!(f, "dark matter"),
            Self::Gas => write!(f, "gas"),
            Self::Star => write!(f, "stars"),
            Self::BlackHole => write!(f, "black holes"),
        }
    }
}

/// How baryons are treated relative to the dark matter search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaryonMode {
    /// Baryons are not searched separately.
    #[default]
    Off,
    /// Baryons are associated after the substructure search.
    Substructure,
    /// Baryons are associated for both the field search and the
    /// substructure search.
    SubstructureAndField,
}

impl BaryonMode {
    /// Whether baryons are searched separately at all.
    pub fn is_on(self) -> bool {
        !matches!(self, Self::Off)
    }
}
