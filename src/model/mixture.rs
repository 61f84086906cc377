//! Mixture key and per-mixture measurement collection

use super::MeasurementRecord;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Identifies a unique binary chemical pair (ionic liquid + solute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MixtureKey {
    /// Ionic-liquid component id
    pub il_id: i64,
    /// Solute component id
    pub solute_id: i64,
}

impl MixtureKey {
    /// Create a mixture key.
    #[must_use]
    pub const fn new(il_id: i64, solute_id: i64) -> Self {
        Self { il_id, solute_id }
    }
}

impl std::fmt::Display for MixtureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.il_id, self.solute_id)
    }
}

/// One mixture's measurement list, as ingested from the per-mixture
/// input table (one row per mixture, array-valued columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureRecord {
    /// The binary pair this series belongs to
    pub key: MixtureKey,
    /// All measurements for the pair (insertion order preserved but not
    /// semantically meaningful)
    pub measurements: Vec<MeasurementRecord>,
}

impl MixtureRecord {
    /// Create a mixture record.
    #[must_use]
    pub const fn new(key: MixtureKey, measurements: Vec<MeasurementRecord>) -> Self {
        Self { key, measurements }
    }

    /// Number of measurements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    /// True when the mixture carries no measurements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Number of distinct reference ids among the measurements.
    #[must_use]
    pub fn distinct_references(&self) -> usize {
        let mut ids: Vec<i64> = self.measurements.iter().map(|m| m.reference_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    /// Validate the positivity invariant on every measurement.
    ///
    /// The log / inverse-temperature transform requires `temperature > 0`
    /// and `property_value > 0`; a violating record fails the whole
    /// mixture rather than being silently coerced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NonPositiveValue`] naming the first offending
    /// record and field.
    pub fn validate(&self) -> Result<()> {
        for m in &self.measurements {
            if m.temperature <= 0.0 {
                return Err(Error::NonPositiveValue {
                    il_id: self.key.il_id,
                    solute_id: self.key.solute_id,
                    field: "temperature",
                    original_index: m.original_index,
                });
            }
            if m.property_value <= 0.0 {
                return Err(Error::NonPositiveValue {
                    il_id: self.key.il_id,
                    solute_id: self.key.solute_id,
                    field: "property_value",
                    original_index: m.original_index,
                });
            }
        }
        Ok(())
    }
}
