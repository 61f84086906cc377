//! Error types for gamma-consensus

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// gamma-consensus error types
#[derive(Error, Debug)]
pub enum Error {
    /// Table-level schema error (batch-fatal: no per-mixture work starts)
    #[error("Schema error: {0}")]
    Schema(String),

    /// A mixture row carries array columns of unequal length
    #[error("Mixture {il_id}/{solute_id}: array columns have mismatched lengths ({detail})")]
    RaggedMixture {
        /// Ionic-liquid component id
        il_id: i64,
        /// Solute component id
        solute_id: i64,
        /// Human-readable length summary
        detail: String,
    },

    /// A measurement violates the positivity invariant required by the
    /// ln(gamma) vs 1/T transform
    #[error("Mixture {il_id}/{solute_id}: non-positive {field} at original_index {original_index}")]
    NonPositiveValue {
        /// Ionic-liquid component id
        il_id: i64,
        /// Solute component id
        solute_id: i64,
        /// Offending field name (`temperature` or `property_value`)
        field: &'static str,
        /// Stable row identifier of the offending measurement
        original_index: i64,
    },

    /// Partition bookkeeping produced groups whose member counts do not
    /// sum to the general group's count
    #[error("Mixture {il_id}/{solute_id}: partition invariant violated (general={general}, partitioned={partitioned})")]
    PartitionInvariant {
        /// Ionic-liquid component id
        il_id: i64,
        /// Solute component id
        solute_id: i64,
        /// General group member count
        general: usize,
        /// Sum of per-source + pooled member counts
        partitioned: usize,
    },

    /// Entry-keyed partitioning was requested but a record has no entry id
    #[error("Mixture {il_id}/{solute_id}: entry partitioning requested but original_index {original_index} has no entry_id")]
    MissingEntryId {
        /// Ionic-liquid component id
        il_id: i64,
        /// Solute component id
        solute_id: i64,
        /// Stable row identifier of the offending measurement
        original_index: i64,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Storage error (Parquet/Arrow)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Report serialization error
    #[error("Report serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl Error {
    /// True when the error is local to a single mixture and the run
    /// should continue (routed to the failure report instead of
    /// aborting the batch).
    #[must_use]
    pub const fn is_mixture_local(&self) -> bool {
        matches!(
            self,
            Self::RaggedMixture { .. }
                | Self::NonPositiveValue { .. }
                | Self::PartitionInvariant { .. }
                | Self::MissingEntryId { .. }
        )
    }
}
