//! Core data model
//!
//! ```text
//! MixtureRecord (1) ──< MeasurementRecord (N)   [immutable input]
//!        │
//!        └── GroupSet ──< ReferenceGroup (N)    [recomputed per run]
//! ```
//!
//! `MeasurementRecord`s are produced once by upstream filtering and never
//! mutated; everything grouped or derived from them is rebuilt in full on
//! every run, with `original_index` as the only lineage that survives.

mod group;
mod measurement;
mod mixture;
mod row;

pub use group::{GroupId, GroupKind, GroupSet, ReferenceGroup};
pub use measurement::MeasurementRecord;
pub use mixture::{MixtureKey, MixtureRecord};
pub use row::{ActivityRow, ReferenceEntry};
