//! Row-level dataset types consumed by the index reconciler

use serde::{Deserialize, Serialize};

/// One row of the canonical measurement table (the dataset the selected
/// `original_index` values filter down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityRow {
    /// Stable row identifier (join key against selected groups)
    pub original_index: i64,
    /// Ionic-liquid component id
    pub il_id: i64,
    /// Solute component id
    pub solute_id: i64,
    /// Literature source id (renumbered by the reconciler)
    pub reference_id: i64,
    /// Absolute temperature in Kelvin
    pub temperature: f64,
    /// Infinite-dilution activity coefficient
    pub property_value: f64,
}

/// Reference metadata kept alongside the renumbering map so downstream
/// consumers can still resolve citations after ids are rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Reference id (old before renumbering, new after)
    pub reference_id: i64,
    /// Free-form citation text
    pub citation: String,
}
