//! Provenance-based partitions of a mixture's measurements

use super::MeasurementRecord;
use serde::{Deserialize, Serialize};

/// Integer id of a non-general group within one mixture (0-based; the
/// pooled group, when present, always takes the highest id).
pub type GroupId = usize;

/// What a group represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    /// All measurements for the mixture, unconditionally
    General,
    /// All measurements sharing one partition label with population ≥ T
    PerSource(i64),
    /// Merged bucket of labels too small to stand alone
    Pooled,
}

/// A named subset of a mixture's measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceGroup {
    /// Group id within the mixture (meaningless for the general group)
    pub id: GroupId,
    /// Group kind
    pub kind: GroupKind,
    /// Member measurements, in input order
    pub members: Vec<MeasurementRecord>,
}

impl ReferenceGroup {
    /// Number of member measurements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Largest ln(property_value) among members, if any.
    ///
    /// Used by the magnitude tie-break in group selection.
    #[must_use]
    pub fn max_ln_property(&self) -> Option<f64> {
        self.members
            .iter()
            .map(MeasurementRecord::ln_property)
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Member `original_index` values, in input order.
    #[must_use]
    pub fn original_indices(&self) -> Vec<i64> {
        self.members.iter().map(|m| m.original_index).collect()
    }
}

/// The full partition of one mixture: the general group plus the
/// per-source groups (ids 0..N-1, first-encounter order) and an optional
/// pooled group (id N).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSet {
    /// The unconditional group holding every measurement
    pub general: ReferenceGroup,
    /// Per-source groups followed by the pooled group when present
    pub groups: Vec<ReferenceGroup>,
}

impl GroupSet {
    /// Number of non-general groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// The pooled group, if one was materialized.
    #[must_use]
    pub fn pooled(&self) -> Option<&ReferenceGroup> {
        self.groups.iter().find(|g| g.kind == GroupKind::Pooled)
    }

    /// Sum of member counts across non-general groups.
    #[must_use]
    pub fn partitioned_len(&self) -> usize {
        self.groups.iter().map(ReferenceGroup::len).sum()
    }

    /// Partition-completeness invariant: every measurement lands in
    /// exactly one per-source-or-pooled group.
    #[must_use]
    pub fn is_complete_partition(&self) -> bool {
        self.partitioned_len() == self.general.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: GroupId, kind: GroupKind, values: &[f64]) -> ReferenceGroup {
        ReferenceGroup {
            id,
            kind,
            members: values
                .iter()
                .enumerate()
                .map(|(i, &v)| MeasurementRecord::new(i as i64, 1, 300.0, v))
                .collect(),
        }
    }

    #[test]
    fn test_max_ln_property() {
        let g = group(0, GroupKind::PerSource(1), &[1.0, 7.5, 2.0]);
        let max = g.max_ln_property().unwrap();
        assert!((max - 7.5f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_max_ln_property_empty() {
        let g = group(0, GroupKind::PerSource(1), &[]);
        assert!(g.max_ln_property().is_none());
    }

    #[test]
    fn test_partition_completeness() {
        let set = GroupSet {
            general: group(0, GroupKind::General, &[1.0, 2.0, 3.0]),
            groups: vec![
                group(0, GroupKind::PerSource(1), &[1.0, 2.0]),
                group(1, GroupKind::Pooled, &[3.0]),
            ],
        };
        assert!(set.is_complete_partition());
        assert_eq!(set.partitioned_len(), 3);
        assert!(set.pooled().is_some());
    }

    #[test]
    fn test_incomplete_partition_detected() {
        let set = GroupSet {
            general: group(0, GroupKind::General, &[1.0, 2.0, 3.0]),
            groups: vec![group(0, GroupKind::PerSource(1), &[1.0, 2.0])],
        };
        assert!(!set.is_complete_partition());
    }
}
