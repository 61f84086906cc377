//! # gamma-consensus: measurement conflict resolution
//!
//! Reconciles conflicting literature measurements of infinite-dilution
//! activity coefficients. Different sources frequently disagree about
//! the same binary mixture; per mixture, this engine decides which
//! subset of measurements is internally consistent and worth keeping.
//!
//! ## Pipeline
//!
//! 1. **Grouping** — partition a mixture's measurements by provenance
//!    (per-source groups, a pooled bucket for small sources, and the
//!    unconditional general group).
//! 2. **Regression** — fit ln(gamma) vs 1/T (Gibbs-Helmholtz relation)
//!    per group.
//! 3. **Equivalence testing** — pairwise Chow tests decide which groups'
//!    trends are statistically indistinguishable.
//! 4. **Selection** — pick the group corroborated by the most others,
//!    with a deterministic tie-break cascade.
//! 5. **Reconciliation** — map winners' row indices back onto the
//!    row-level dataset and renumber reference ids.
//!
//! ## Example
//!
//! ```rust
//! use gamma_consensus::model::{MeasurementRecord, MixtureKey, MixtureRecord};
//! use gamma_consensus::{ConsensusResolver, PartitionKey, ResolverConfig};
//!
//! let measurements = (0..5)
//!     .map(|i| {
//!         let t = 280.0 + 10.0 * f64::from(i);
//!         MeasurementRecord::new(i64::from(i), 1, t, (0.5 + 800.0 / t).exp())
//!     })
//!     .collect();
//! let mixture = MixtureRecord::new(MixtureKey::new(1, 2), measurements);
//!
//! let resolver = ConsensusResolver::new(ResolverConfig::default(), PartitionKey::Reference)?;
//! let outcome = resolver.resolve_all(&[mixture]);
//! assert_eq!(outcome.summary.total, 1);
//! assert_eq!(outcome.resolutions[0].selection.selected, Some(0));
//! # Ok::<(), gamma_consensus::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod chow;
pub mod config;
pub mod error;
pub mod grouping;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod regression;
pub mod selection;
pub mod table;

pub use config::ResolverConfig;
pub use error::{Error, Result};
pub use grouping::PartitionKey;
pub use pipeline::{ConsensusResolver, MixtureFailure, MixtureResolution, RunOutcome};
pub use reconcile::{IndexReconciler, ReconciledDataset};
