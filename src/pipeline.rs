//! Per-mixture resolution pipeline
//!
//! GroupBuilder → RegressionEngine → EquivalenceTester → GroupSelector,
//! run as a pure function per mixture and parallel-mapped over the batch
//! with rayon. There is no shared mutable state during computation; the
//! only single-writer step is the final collect. A mixture either
//! resolves completely or lands in the failure report; partial state is
//! never emitted.

use crate::chow::{EquivalenceTester, PairVerdict};
use crate::config::ResolverConfig;
use crate::grouping::{GroupBuilder, PartitionKey};
use crate::model::{GroupSet, MeasurementRecord, MixtureKey, MixtureRecord};
use crate::regression::{fit_group, LineFit};
use crate::selection::{GroupSelector, Selection};
use crate::Result;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Everything computed for one successfully processed mixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureResolution {
    /// The mixture this resolution belongs to
    pub key: MixtureKey,
    /// The full partition (general + per-source + pooled groups)
    pub groups: GroupSet,
    /// Regression per non-general group (same indexing as `groups.groups`)
    pub fits: Vec<Option<LineFit>>,
    /// General group's regression
    pub general_fit: Option<LineFit>,
    /// Chow verdicts for every unordered group pair
    pub verdicts: Vec<PairVerdict>,
    /// Selected group and agreement tally
    pub selection: Selection,
}

impl MixtureResolution {
    /// `original_index` values of the selected group, when one was
    /// selected. This is the lineage the index reconciler consumes.
    #[must_use]
    pub fn selected_indices(&self) -> Option<Vec<i64>> {
        self.selection
            .selected
            .map(|g| self.groups.groups[g].original_indices())
    }
}

/// A mixture excluded from selection, with enough context to re-diagnose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureFailure {
    /// The failed mixture
    pub key: MixtureKey,
    /// Why it failed (rendered error)
    pub reason: String,
    /// The original measurements, carried verbatim
    pub measurements: Vec<MeasurementRecord>,
}

/// Run-level accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,
    /// Wall-clock end of the run
    pub finished_at: DateTime<Utc>,
    /// Mixtures submitted
    pub total: usize,
    /// Mixtures resolved to a concrete group
    pub resolved: usize,
    /// Mixtures processed but unresolvable (`selected_group = none`)
    pub no_consensus: usize,
    /// Mixtures excluded via the failure report
    pub failed: usize,
}

impl RunSummary {
    /// Render the summary as a pretty-printed JSON report.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Output of one resolver run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Per-mixture results, in input order
    pub resolutions: Vec<MixtureResolution>,
    /// Excluded mixtures, in input order
    pub failures: Vec<MixtureFailure>,
    /// Run accounting
    pub summary: RunSummary,
}

impl RunOutcome {
    /// Render the excluded mixtures as a pretty-printed JSON report,
    /// the sidecar artifact kept next to the Parquet failure table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn failure_report_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.failures)?)
    }
}

/// The conflict-resolution engine for one batch of mixtures.
#[derive(Debug, Clone, Copy)]
pub struct ConsensusResolver {
    config: ResolverConfig,
    partition_key: PartitionKey,
}

impl ConsensusResolver {
    /// Create a resolver for the given partition key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] when the configuration is invalid.
    pub fn new(config: ResolverConfig, partition_key: PartitionKey) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            partition_key,
        })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a single mixture.
    ///
    /// # Errors
    ///
    /// All errors are mixture-local ([`crate::Error::is_mixture_local`]):
    /// positivity violations, missing entry ids under entry keying, and
    /// partition-invariant violations.
    pub fn resolve_mixture(&self, mixture: &MixtureRecord) -> Result<MixtureResolution> {
        mixture.validate()?;

        let builder = GroupBuilder::new(self.config.min_group_size, self.partition_key);
        let groups = builder.build(mixture)?;

        let fits: Vec<Option<LineFit>> = groups
            .groups
            .iter()
            .map(|g| fit_group(g, self.config.min_group_size))
            .collect();
        let general_fit = fit_group(&groups.general, self.config.min_group_size);

        let tester =
            EquivalenceTester::new(self.config.min_group_size, self.config.significance_level);
        let verdicts = tester.verdict_matrix(&groups.groups);

        let selector = GroupSelector::new(self.config);
        let selection = selector.select(mixture.key, &groups, &fits, general_fit, &verdicts);

        debug!(
            mixture = %mixture.key,
            groups = groups.group_count(),
            selected = ?selection.selected,
            "mixture resolved"
        );

        Ok(MixtureResolution {
            key: mixture.key,
            groups,
            fits,
            general_fit,
            verdicts,
            selection,
        })
    }

    /// Resolve a whole batch, mixture-parallel.
    ///
    /// Results come back in input order regardless of scheduling; the
    /// per-mixture RNG seeds make the output bit-identical to a
    /// sequential run.
    #[must_use]
    pub fn resolve_all(&self, mixtures: &[MixtureRecord]) -> RunOutcome {
        let started_at = Utc::now();

        let outcomes: Vec<Result<MixtureResolution>> = mixtures
            .par_iter()
            .map(|mixture| self.resolve_mixture(mixture))
            .collect();

        let mut resolutions = Vec::new();
        let mut failures = Vec::new();
        for (mixture, outcome) in mixtures.iter().zip(outcomes) {
            match outcome {
                Ok(resolution) => resolutions.push(resolution),
                Err(err) => {
                    warn!(mixture = %mixture.key, error = %err, "mixture excluded");
                    failures.push(MixtureFailure {
                        key: mixture.key,
                        reason: err.to_string(),
                        measurements: mixture.measurements.clone(),
                    });
                }
            }
        }

        let resolved = resolutions
            .iter()
            .filter(|r| r.selection.selected.is_some())
            .count();
        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            total: mixtures.len(),
            resolved,
            no_consensus: resolutions.len() - resolved,
            failed: failures.len(),
        };
        info!(
            total = summary.total,
            resolved = summary.resolved,
            no_consensus = summary.no_consensus,
            failed = summary.failed,
            "consensus run complete"
        );

        RunOutcome {
            resolutions,
            failures,
            summary,
        }
    }
}
