//! Resolver configuration
//!
//! One configurable surface for the constants that drifted across the
//! historical pipeline variants: the minimum-population threshold, the
//! Chow significance level, the general-R² acceptance gate, and the
//! tie-break seed.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default minimum samples a reference needs to stand as its own group
/// (the canonical path; some historical variants ran with 3).
pub const DEFAULT_MIN_GROUP_SIZE: usize = 5;

/// Default significance level for the Chow test.
pub const DEFAULT_SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Default R² gate for accepting the general group's fit when no
/// structural disagreement signal exists.
pub const DEFAULT_R_SQUARED_GATE: f64 = 0.9;

/// Default seed for the final random tie-break (documented constant).
pub const DEFAULT_TIE_BREAK_SEED: u64 = 42;

/// Configuration for the consensus resolver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Minimum samples for a reference to form its own group, and for a
    /// group to participate in Chow testing. Must be ≥ 2.
    pub min_group_size: usize,
    /// Chow-test significance level (`significant = p < level`).
    pub significance_level: f64,
    /// General-group R² threshold used when no pair disagrees.
    pub r_squared_gate: f64,
    /// Base seed for tie-break randomness; mixed with a per-mixture hash
    /// so results do not depend on scheduling order.
    pub tie_break_seed: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_group_size: DEFAULT_MIN_GROUP_SIZE,
            significance_level: DEFAULT_SIGNIFICANCE_LEVEL,
            r_squared_gate: DEFAULT_R_SQUARED_GATE,
            tie_break_seed: DEFAULT_TIE_BREAK_SEED,
        }
    }
}

impl ResolverConfig {
    /// Create a builder with default values.
    #[must_use]
    pub fn builder() -> ResolverConfigBuilder {
        ResolverConfigBuilder::default()
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `min_group_size < 2` or if
    /// `significance_level` / `r_squared_gate` fall outside `(0, 1)`.
    pub fn validate(&self) -> Result<()> {
        if self.min_group_size < 2 {
            return Err(Error::Config(format!(
                "min_group_size must be >= 2, got {}",
                self.min_group_size
            )));
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(Error::Config(format!(
                "significance_level must be in (0, 1), got {}",
                self.significance_level
            )));
        }
        if !(self.r_squared_gate > 0.0 && self.r_squared_gate < 1.0) {
            return Err(Error::Config(format!(
                "r_squared_gate must be in (0, 1), got {}",
                self.r_squared_gate
            )));
        }
        Ok(())
    }
}

/// Builder for [`ResolverConfig`].
#[derive(Debug, Default)]
pub struct ResolverConfigBuilder {
    config: Option<ResolverConfig>,
}

impl ResolverConfigBuilder {
    fn config(&mut self) -> &mut ResolverConfig {
        self.config.get_or_insert_with(ResolverConfig::default)
    }

    /// Set the minimum-population threshold.
    #[must_use]
    pub fn min_group_size(mut self, size: usize) -> Self {
        self.config().min_group_size = size;
        self
    }

    /// Set the Chow significance level.
    #[must_use]
    pub fn significance_level(mut self, level: f64) -> Self {
        self.config().significance_level = level;
        self
    }

    /// Set the general-group R² acceptance gate.
    #[must_use]
    pub fn r_squared_gate(mut self, gate: f64) -> Self {
        self.config().r_squared_gate = gate;
        self
    }

    /// Set the tie-break base seed.
    #[must_use]
    pub fn tie_break_seed(mut self, seed: u64) -> Self {
        self.config().tie_break_seed = seed;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when any field fails validation.
    pub fn build(mut self) -> Result<ResolverConfig> {
        let config = *self.config();
        config.validate()?;
        Ok(config)
    }
}
