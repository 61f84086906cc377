//! Pairwise Chow structural-break testing
//!
//! For two groups fit separately and pooled, the Chow statistic
//!
//! ```text
//! F = ((RSS_pooled − (RSS1 + RSS2)) / k) / ((RSS1 + RSS2) / (n1 + n2 − 2k))
//! ```
//!
//! with k = 2 (slope + intercept) tests whether the two regression lines
//! could be a single pooled line. `significant = true` means the trends
//! differ; `significant = false` means the groups agree. The p-value
//! comes from the F-distribution CDF via `statrs`.

use crate::model::{GroupId, MeasurementRecord, ReferenceGroup};
use crate::regression::{fit_line, residual_sum_of_squares};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

/// Parameters estimated per line (slope + intercept).
const K: usize = 2;

/// Outcome of one Chow test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChowOutcome {
    /// Chow F statistic
    pub f_statistic: f64,
    /// `1 − F_cdf(F; k, n1+n2−2k)`
    pub p_value: f64,
    /// `p_value < significance_level`: the two trends differ
    pub significant: bool,
}

/// Verdict for one unordered pair of groups. `outcome` is `None` when
/// the pair was untestable (either group below the minimum population,
/// or a degenerate fit); null verdicts never contribute to agreement
/// tallies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairVerdict {
    /// Lower group id of the pair
    pub g1: GroupId,
    /// Higher group id of the pair
    pub g2: GroupId,
    /// Test outcome, when the pair was testable
    pub outcome: Option<ChowOutcome>,
}

/// Runs Chow tests between every unordered pair of a mixture's groups.
#[derive(Debug, Clone, Copy)]
pub struct EquivalenceTester {
    min_group_size: usize,
    significance_level: f64,
}

impl EquivalenceTester {
    /// Create a tester.
    #[must_use]
    pub const fn new(min_group_size: usize, significance_level: f64) -> Self {
        Self {
            min_group_size,
            significance_level,
        }
    }

    /// Test one pair of groups.
    ///
    /// Returns `None` when either group is below the minimum population,
    /// the error degrees of freedom `n1+n2−2k` are non-positive, or any
    /// of the three fits is degenerate.
    #[must_use]
    pub fn test_pair(&self, a: &ReferenceGroup, b: &ReferenceGroup) -> Option<ChowOutcome> {
        let (n1, n2) = (a.len(), b.len());
        if n1 < self.min_group_size || n2 < self.min_group_size {
            return None;
        }
        if n1 + n2 <= 2 * K {
            return None;
        }

        let (x1, y1) = transformed_axes(a);
        let (x2, y2) = transformed_axes(b);

        let fit1 = fit_line(&x1, &y1)?;
        let fit2 = fit_line(&x2, &y2)?;

        let mut x_pooled = x1.clone();
        x_pooled.extend_from_slice(&x2);
        let mut y_pooled = y1.clone();
        y_pooled.extend_from_slice(&y2);
        let fit_pooled = fit_line(&x_pooled, &y_pooled)?;

        let rss1 = residual_sum_of_squares(&fit1, &x1, &y1);
        let rss2 = residual_sum_of_squares(&fit2, &x2, &y2);
        let rss_pooled = residual_sum_of_squares(&fit_pooled, &x_pooled, &y_pooled);
        let rss_sum = rss1 + rss2;
        let df2 = (n1 + n2 - 2 * K) as f64;

        let (f_statistic, p_value) = if rss_sum <= f64::EPSILON {
            // Both lines fit perfectly: the pooled RSS alone decides.
            if rss_pooled <= f64::EPSILON {
                (0.0, 1.0)
            } else {
                (f64::INFINITY, 0.0)
            }
        } else {
            // Pooling can only lose fit up to fp noise; clamp at zero.
            let f = (((rss_pooled - rss_sum) / K as f64) / (rss_sum / df2)).max(0.0);
            let dist = FisherSnedecor::new(K as f64, df2).ok()?;
            (f, 1.0 - dist.cdf(f))
        };

        Some(ChowOutcome {
            f_statistic,
            p_value,
            significant: p_value < self.significance_level,
        })
    }

    /// Test every unordered pair `(g1, g2)` with `g1 < g2` over the
    /// mixture's non-general groups, in lexicographic pair order.
    #[must_use]
    pub fn verdict_matrix(&self, groups: &[ReferenceGroup]) -> Vec<PairVerdict> {
        let mut verdicts = Vec::with_capacity(groups.len() * groups.len().saturating_sub(1) / 2);
        for i in 0..groups.len() {
            for j in (i + 1)..groups.len() {
                verdicts.push(PairVerdict {
                    g1: groups[i].id,
                    g2: groups[j].id,
                    outcome: self.test_pair(&groups[i], &groups[j]),
                });
            }
        }
        verdicts
    }
}

fn transformed_axes(group: &ReferenceGroup) -> (Vec<f64>, Vec<f64>) {
    let x = group
        .members
        .iter()
        .map(MeasurementRecord::inverse_temperature)
        .collect();
    let y = group
        .members
        .iter()
        .map(MeasurementRecord::ln_property)
        .collect();
    (x, y)
}
