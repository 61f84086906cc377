//! Index reconciliation back to the row-level dataset
//!
//! Selections arrive from three parallel conflict classes: cross-source
//! multi-reference mixtures, single-source multi-entry mixtures, and
//! trivial mixtures whose single group passes through untouched. The
//! reconciler unions their selected `original_index` sets, reports (but
//! tolerates) overlaps between classes, filters the canonical row-level
//! table, drops literal duplicate rows, and renumbers the surviving
//! reference ids to a contiguous 1-based sequence.

use crate::model::{ActivityRow, ReferenceEntry};
use crate::pipeline::MixtureResolution;
use crate::Result;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Decimal places used to make float equality stable before duplicate
/// removal.
pub const ROUND_DECIMALS: i32 = 6;

/// Sizes of the pairwise intersections between the three classes' index
/// sets. All expected to be zero; a non-zero count points at an upstream
/// classification bug and is logged, not fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapReport {
    /// |cross-source ∩ within-source|
    pub cross_within: usize,
    /// |cross-source ∩ trivial|
    pub cross_trivial: usize,
    /// |within-source ∩ trivial|
    pub within_trivial: usize,
}

impl OverlapReport {
    /// True when no class pair overlaps.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.cross_within == 0 && self.cross_trivial == 0 && self.within_trivial == 0
    }
}

/// The reconciled row-level dataset.
///
/// Rows keep `original_index` for lineage back to the unfiltered
/// dataset. Historical pipeline variants dropped the column once
/// reference ids were renumbered, so downstream consumers should not
/// expect it in previously published revisions of the row contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledDataset {
    /// Surviving rows with rounded numerics and renumbered reference ids
    pub rows: Vec<ActivityRow>,
    /// Old → new reference-id mapping, ordered by old id
    pub reference_map: Vec<(i64, i64)>,
    /// Reference metadata filtered to survivors, ids rewritten
    pub references: Vec<ReferenceEntry>,
    /// Pairwise class overlaps (expected empty)
    pub overlaps: OverlapReport,
    /// Literal duplicate rows removed
    pub removed_duplicates: usize,
}

impl ReconciledDataset {
    /// Render the old→new reference-id mapping as a pretty-printed JSON
    /// report for consumers that still hold pre-renumbering ids.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn reference_map_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.reference_map)?)
    }
}

/// Sorted, deduplicated `original_index` values of every selected group
/// across a class's resolutions.
#[must_use]
pub fn selected_indices(resolutions: &[MixtureResolution]) -> Vec<i64> {
    let mut indices: Vec<i64> = resolutions
        .iter()
        .filter_map(MixtureResolution::selected_indices)
        .flatten()
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}

/// Merges class selections and rewrites the row-level dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexReconciler;

impl IndexReconciler {
    /// Create a reconciler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Reconcile the three classes against the row-level dataset.
    ///
    /// `trivial_indices` are the pass-through indices of mixtures that
    /// had only one trivial group (no conflict to resolve).
    #[must_use]
    pub fn reconcile(
        &self,
        cross_source: &[MixtureResolution],
        within_source: &[MixtureResolution],
        trivial_indices: &[i64],
        rows: &[ActivityRow],
        references: &[ReferenceEntry],
    ) -> ReconciledDataset {
        let cross = selected_indices(cross_source);
        let within = selected_indices(within_source);
        let mut trivial = trivial_indices.to_vec();
        trivial.sort_unstable();
        trivial.dedup();

        let overlaps = overlap_report(&cross, &within, &trivial);
        if !overlaps.is_clean() {
            warn!(
                cross_within = overlaps.cross_within,
                cross_trivial = overlaps.cross_trivial,
                within_trivial = overlaps.within_trivial,
                "class index sets overlap; upstream classification suspect"
            );
        }

        let mut combined: Vec<i64> = Vec::with_capacity(cross.len() + within.len() + trivial.len());
        combined.extend_from_slice(&cross);
        combined.extend_from_slice(&within);
        combined.extend_from_slice(&trivial);
        combined.sort_unstable();
        combined.dedup();
        let keep: FxHashSet<i64> = combined.into_iter().collect();

        // Filter and round for stable equality.
        let filtered: Vec<ActivityRow> = rows
            .iter()
            .filter(|r| keep.contains(&r.original_index))
            .map(|r| ActivityRow {
                temperature: round_to(r.temperature, ROUND_DECIMALS),
                property_value: round_to(r.property_value, ROUND_DECIMALS),
                ..*r
            })
            .collect();

        // Drop literal duplicates (same pair, temperature, value from a
        // different source), keeping the first occurrence.
        let mut seen: FxHashSet<(i64, i64, i64, i64)> = FxHashSet::default();
        let mut deduped: Vec<ActivityRow> = Vec::with_capacity(filtered.len());
        for row in &filtered {
            let key = (
                row.il_id,
                row.solute_id,
                scaled(row.temperature),
                scaled(row.property_value),
            );
            if seen.insert(key) {
                deduped.push(*row);
            }
        }
        let removed_duplicates = filtered.len() - deduped.len();

        // Renumber surviving reference ids contiguously from 1.
        let mut remaining: Vec<i64> = deduped.iter().map(|r| r.reference_id).collect();
        remaining.sort_unstable();
        remaining.dedup();
        let new_id_of: FxHashMap<i64, i64> = remaining
            .iter()
            .enumerate()
            .map(|(i, &old)| (old, i as i64 + 1))
            .collect();

        let rows: Vec<ActivityRow> = deduped
            .into_iter()
            .map(|mut r| {
                r.reference_id = new_id_of[&r.reference_id];
                r
            })
            .collect();

        let reference_map: Vec<(i64, i64)> =
            remaining.iter().map(|&old| (old, new_id_of[&old])).collect();
        let references: Vec<ReferenceEntry> = references
            .iter()
            .filter(|e| new_id_of.contains_key(&e.reference_id))
            .map(|e| ReferenceEntry {
                reference_id: new_id_of[&e.reference_id],
                citation: e.citation.clone(),
            })
            .collect();

        info!(
            kept_rows = rows.len(),
            removed_duplicates,
            references = references.len(),
            "row-level dataset reconciled"
        );

        ReconciledDataset {
            rows,
            reference_map,
            references,
            overlaps,
            removed_duplicates,
        }
    }
}

fn overlap_report(cross: &[i64], within: &[i64], trivial: &[i64]) -> OverlapReport {
    OverlapReport {
        cross_within: intersection_len(cross, within),
        cross_trivial: intersection_len(cross, trivial),
        within_trivial: intersection_len(within, trivial),
    }
}

/// Intersection size of two sorted, deduplicated slices.
fn intersection_len(a: &[i64], b: &[i64]) -> usize {
    let (mut i, mut j, mut n) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                n += 1;
                i += 1;
                j += 1;
            }
        }
    }
    n
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Integer image of a rounded value, safe to hash and compare exactly.
fn scaled(value: f64) -> i64 {
    (value * 10f64.powi(ROUND_DECIMALS)).round() as i64
}
