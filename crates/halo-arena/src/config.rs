//! Arena configuration parameters.

use crate::error::ArenaError;

/// Configuration for the particle arena.
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct ArenaConfig {
    /// Extra capacity reserved beyond the local particle count, as a
    /// fraction of that count.
    ///
    /// Absorbs particles gained when ranks exchange boundary particles.
    /// Default: 0.1. Must be finite and non-negative.
    pub growth_factor: f64,
}

impl ArenaConfig {
    /// Default headroom fraction.
    pub const DEFAULT_GROWTH_FACTOR: f64 = 0.1;

    /// Create a config with the given growth factor.
    pub fn new(growth_factor: f64) -> Self {
        Self { growth_factor }
    }

    /// Check invariants.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if !self.growth_factor.is_finite() || self.growth_factor < 0.0 {
            return Err(ArenaError::InvalidGrowthFactor {
                value: self.growth_factor,
            });
        }
        Ok(())
    }

    /// Number of particle slots to allocate for `count` local particles.
    pub fn capacity_for(&self, count: usize) -> usize {
        let extra = (count as f64 * self.growth_factor).ceil() as usize;
        count.saturating_add(extra)
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_GROWTH_FACTOR)
    }
}
