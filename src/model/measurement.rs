//! Measurement record - one experimental data point

use serde::{Deserialize, Serialize};

/// A single experimental measurement of the activity coefficient for one
/// mixture at one temperature.
///
/// Immutable once produced by upstream filtering; `original_index` is the
/// stable join key carried through every downstream join back to the
/// row-level dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Stable row identifier in the row-level dataset
    pub original_index: i64,
    /// Literature source the measurement came from
    pub reference_id: i64,
    /// Sub-measurement run within a single source, when the source
    /// published several independent series (entry-keyed partitioning)
    pub entry_id: Option<i64>,
    /// Absolute temperature in Kelvin (must be > 0)
    pub temperature: f64,
    /// Infinite-dilution activity coefficient (must be > 0)
    pub property_value: f64,
}

impl MeasurementRecord {
    /// Create a measurement without an entry id.
    #[must_use]
    pub const fn new(
        original_index: i64,
        reference_id: i64,
        temperature: f64,
        property_value: f64,
    ) -> Self {
        Self {
            original_index,
            reference_id,
            entry_id: None,
            temperature,
            property_value,
        }
    }

    /// Attach an entry id (within-source sub-measurement run).
    #[must_use]
    pub const fn with_entry_id(mut self, entry_id: i64) -> Self {
        self.entry_id = Some(entry_id);
        self
    }

    /// Inverse absolute temperature, the regression abscissa.
    #[must_use]
    pub fn inverse_temperature(&self) -> f64 {
        1.0 / self.temperature
    }

    /// Natural log of the property value, the regression ordinate.
    #[must_use]
    pub fn ln_property(&self) -> f64 {
        self.property_value.ln()
    }

    /// True when both fields satisfy the positivity invariant required
    /// by the log / inverse-temperature transform.
    #[must_use]
    pub fn is_transformable(&self) -> bool {
        self.temperature > 0.0 && self.property_value > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_axes() {
        let m = MeasurementRecord::new(0, 1, 298.15, 2.5);
        assert!((m.inverse_temperature() - 1.0 / 298.15).abs() < 1e-12);
        assert!((m.ln_property() - 2.5f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_positivity_invariant() {
        assert!(MeasurementRecord::new(0, 1, 300.0, 0.8).is_transformable());
        assert!(!MeasurementRecord::new(0, 1, 0.0, 0.8).is_transformable());
        assert!(!MeasurementRecord::new(0, 1, 300.0, 0.0).is_transformable());
        assert!(!MeasurementRecord::new(0, 1, -10.0, 0.8).is_transformable());
    }

    #[test]
    fn test_entry_id_attachment() {
        let m = MeasurementRecord::new(5, 9, 310.0, 1.2).with_entry_id(3);
        assert_eq!(m.entry_id, Some(3));
        assert_eq!(m.reference_id, 9);
    }
}
