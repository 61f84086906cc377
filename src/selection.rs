//! Consensus selection over one mixture's verdict matrix
//!
//! The primary criterion is deliberately corroboration, not difference:
//! the winning group is the one statistically indistinguishable from the
//! most other groups. Ties fall through a fixed cascade (adjusted R²,
//! max ln(gamma), sample count, seeded random draw). When no pair
//! disagrees at all, the general group's own fit arbitrates via the R²
//! gate.

use crate::chow::PairVerdict;
use crate::config::ResolverConfig;
use crate::model::{GroupId, GroupSet, MixtureKey};
use crate::regression::{adjusted_r_squared, LineFit};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Per-mixture selection result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Winning group id, or `None` when consensus is unresolvable
    pub selected: Option<GroupId>,
    /// Agreement tally per group id (audit trail for the selection)
    pub agreement: Vec<u32>,
}

/// Deterministic per-mixture RNG: the fixed base seed mixed with a hash
/// of the mixture key, so results are bit-identical under any
/// parallel scheduling order.
#[must_use]
pub fn mixture_rng(base_seed: u64, key: MixtureKey) -> StdRng {
    let mut hasher = FxHasher::default();
    base_seed.hash(&mut hasher);
    key.hash(&mut hasher);
    StdRng::seed_from_u64(hasher.finish())
}

/// Number of other groups each group is statistically indistinguishable
/// from (`significant == false`). Null verdicts contribute nothing.
#[must_use]
pub fn agreement_counts(group_count: usize, verdicts: &[PairVerdict]) -> Vec<u32> {
    let mut counts = vec![0u32; group_count];
    for v in verdicts {
        if let Some(outcome) = v.outcome {
            if !outcome.significant && v.g1 < group_count && v.g2 < group_count {
                counts[v.g1] += 1;
                counts[v.g2] += 1;
            }
        }
    }
    counts
}

/// Runs the selection cascade for one mixture.
#[derive(Debug, Clone, Copy)]
pub struct GroupSelector {
    config: ResolverConfig,
}

impl GroupSelector {
    /// Create a selector.
    #[must_use]
    pub const fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Pick the authoritative group for one mixture.
    ///
    /// `fits[g]` is group g's regression (same indexing as
    /// `set.groups`); `general_fit` is the general group's regression.
    #[must_use]
    pub fn select(
        &self,
        key: MixtureKey,
        set: &GroupSet,
        fits: &[Option<LineFit>],
        general_fit: Option<LineFit>,
        verdicts: &[PairVerdict],
    ) -> Selection {
        let n = set.group_count();
        let agreement = agreement_counts(n, verdicts);
        let max_agreement = agreement.iter().max().copied().unwrap_or(0);
        let mut rng = mixture_rng(self.config.tie_break_seed, key);

        let selected = if max_agreement == 0 {
            // No structural consensus signal: the general group's own
            // fit decides whether the mixture follows the model at all.
            let gate_passed =
                general_fit.is_some_and(|f| f.r_squared > self.config.r_squared_gate);
            if gate_passed {
                let eligible: Vec<GroupId> = (0..n).filter(|&g| fits[g].is_some()).collect();
                match eligible.as_slice() {
                    [] => None,
                    [only] => Some(*only),
                    _ => tie_break(&(0..n).collect::<Vec<_>>(), set, fits, &mut rng),
                }
            } else {
                None
            }
        } else {
            let candidates: Vec<GroupId> = (0..n)
                .filter(|&g| agreement[g] == max_agreement)
                .collect();
            if let [only] = candidates.as_slice() {
                Some(*only)
            } else {
                tie_break(&candidates, set, fits, &mut rng)
            }
        };

        Selection {
            selected,
            agreement,
        }
    }
}

/// Tie-break cascade: adjusted R² → max ln(gamma) → sample count →
/// seeded random draw. Candidates without an adjusted R² are dropped at
/// the first step; an emptied candidate set resolves to `None` rather
/// than panicking.
fn tie_break(
    candidates: &[GroupId],
    set: &GroupSet,
    fits: &[Option<LineFit>],
    rng: &mut StdRng,
) -> Option<GroupId> {
    // (a) maximum adjusted R²
    let scored: Vec<(GroupId, f64)> = candidates
        .iter()
        .filter_map(|&g| {
            let fit = fits.get(g).copied().flatten()?;
            let adj = adjusted_r_squared(fit.r_squared, set.groups[g].len())?;
            Some((g, adj))
        })
        .collect();
    if scored.is_empty() {
        return None;
    }
    let candidates = keep_max(&scored);
    if let [only] = candidates.as_slice() {
        return Some(*only);
    }

    // (b) maximum observed ln(gamma) within the group
    let scored: Vec<(GroupId, f64)> = candidates
        .iter()
        .filter_map(|&g| set.groups[g].max_ln_property().map(|v| (g, v)))
        .collect();
    if scored.is_empty() {
        return None;
    }
    let candidates = keep_max(&scored);
    if let [only] = candidates.as_slice() {
        return Some(*only);
    }

    // (c) maximum sample count
    let scored: Vec<(GroupId, f64)> = candidates
        .iter()
        .map(|&g| (g, set.groups[g].len() as f64))
        .collect();
    let candidates = keep_max(&scored);
    if let [only] = candidates.as_slice() {
        return Some(*only);
    }

    // (d) seeded random draw among the survivors
    candidates.choose(rng).copied()
}

/// Candidates achieving the maximum score (exact float equality: equal
/// inputs yield bit-equal scores).
fn keep_max(scored: &[(GroupId, f64)]) -> Vec<GroupId> {
    let max = scored
        .iter()
        .map(|&(_, s)| s)
        .fold(f64::NEG_INFINITY, f64::max);
    scored
        .iter()
        .filter(|&&(_, s)| s == max)
        .map(|&(g, _)| g)
        .collect()
}
