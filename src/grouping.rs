//! Provenance partitioning (GroupBuilder)
//!
//! Splits one mixture's measurement list into the general group
//! (everything, unconditionally), one group per partition label with
//! population ≥ T, and a single pooled group merging the labels too small
//! to stand alone. The same machinery resolves cross-source conflicts
//! (label = `reference_id`) and within-source multi-entry conflicts
//! (label = canonicalized `entry_id`); the label source is a parameter,
//! not a data mutation.

use crate::model::{GroupKind, GroupSet, MeasurementRecord, MixtureRecord, ReferenceGroup};
use crate::{Error, Result};
use rustc_hash::FxHashMap;

/// Which measurement field drives the partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKey {
    /// Partition by literature source (`reference_id`) — cross-source
    /// conflicts
    Reference,
    /// Partition by sub-measurement run (`entry_id`) — disagreement
    /// within a single source
    Entry,
}

impl PartitionKey {
    /// Extract the partition label from a record.
    fn label_of(self, mixture: &MixtureRecord, m: &MeasurementRecord) -> Result<i64> {
        match self {
            Self::Reference => Ok(m.reference_id),
            Self::Entry => m.entry_id.ok_or(Error::MissingEntryId {
                il_id: mixture.key.il_id,
                solute_id: mixture.key.solute_id,
                original_index: m.original_index,
            }),
        }
    }
}

/// Builds the provenance partition for one mixture.
#[derive(Debug, Clone, Copy)]
pub struct GroupBuilder {
    min_group_size: usize,
    partition_key: PartitionKey,
}

impl GroupBuilder {
    /// Create a builder with the given minimum-population threshold and
    /// partition key.
    #[must_use]
    pub const fn new(min_group_size: usize, partition_key: PartitionKey) -> Self {
        Self {
            min_group_size,
            partition_key,
        }
    }

    /// Partition one mixture's measurements.
    ///
    /// Group ids are assigned in first-encounter order of qualifying
    /// labels; the pooled group, when materialized, takes the next free
    /// id so downstream column naming stays contiguous.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingEntryId`] when entry-keyed partitioning meets a
    ///   record without an `entry_id`.
    /// - [`Error::PartitionInvariant`] when bookkeeping produces groups
    ///   whose member counts do not sum to the general group's count.
    pub fn build(&self, mixture: &MixtureRecord) -> Result<GroupSet> {
        let labels: Vec<i64> = mixture
            .measurements
            .iter()
            .map(|m| self.partition_key.label_of(mixture, m))
            .collect::<Result<_>>()?;

        let mut counts: FxHashMap<i64, usize> = FxHashMap::default();
        for &label in &labels {
            *counts.entry(label).or_insert(0) += 1;
        }

        // First-encounter order of qualifying labels decides group ids.
        let mut seen: Vec<i64> = Vec::new();
        let mut order: Vec<i64> = Vec::new();
        let mut has_pooled = false;
        for &label in &labels {
            if seen.contains(&label) {
                continue;
            }
            seen.push(label);
            if counts[&label] >= self.min_group_size {
                order.push(label);
            } else {
                has_pooled = true;
            }
        }
        let id_of: FxHashMap<i64, usize> = order
            .iter()
            .enumerate()
            .map(|(id, &label)| (label, id))
            .collect();
        let pooled_id = order.len();

        let mut groups: Vec<ReferenceGroup> = order
            .iter()
            .enumerate()
            .map(|(id, &label)| ReferenceGroup {
                id,
                kind: GroupKind::PerSource(label),
                members: Vec::new(),
            })
            .collect();
        if has_pooled {
            groups.push(ReferenceGroup {
                id: pooled_id,
                kind: GroupKind::Pooled,
                members: Vec::new(),
            });
        }

        for (m, &label) in mixture.measurements.iter().zip(&labels) {
            let slot = id_of.get(&label).copied().unwrap_or(pooled_id);
            groups[slot].members.push(*m);
        }

        let set = GroupSet {
            general: ReferenceGroup {
                id: 0,
                kind: GroupKind::General,
                members: mixture.measurements.clone(),
            },
            groups,
        };

        if !set.is_complete_partition() {
            return Err(Error::PartitionInvariant {
                il_id: mixture.key.il_id,
                solute_id: mixture.key.solute_id,
                general: set.general.len(),
                partitioned: set.partitioned_len(),
            });
        }

        Ok(set)
    }
}

/// Rewrite every `entry_id` across a dataset to a contiguous 1-based
/// code (codes ordered by raw entry id), so entry-keyed partitioning
/// sees the same kind of compact integer labels that reference ids
/// already are.
///
/// Returns the sorted raw entry ids; code `c` maps back to
/// `returned[c - 1]`. Records without an `entry_id` are left untouched
/// (they fail later, at partition time, if entry keying is requested).
pub fn canonicalize_entry_ids(mixtures: &mut [MixtureRecord]) -> Vec<i64> {
    let mut raw: Vec<i64> = mixtures
        .iter()
        .flat_map(|mx| mx.measurements.iter().filter_map(|m| m.entry_id))
        .collect();
    raw.sort_unstable();
    raw.dedup();

    let code_of: FxHashMap<i64, i64> = raw
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i as i64 + 1))
        .collect();

    for mx in mixtures.iter_mut() {
        for m in &mut mx.measurements {
            if let Some(id) = m.entry_id {
                m.entry_id = Some(code_of[&id]);
            }
        }
    }

    raw
}
