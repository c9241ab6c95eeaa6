#![deny(missing_docs)]
#![doc = "Canonical JSON reduction reports with content hashes."]

/// Content hashing of reports.
pub mod hash;
/// Report assembly from evaluated tasks.
pub mod report;
/// Canonical JSON and YAML serde helpers.
pub mod serde;

pub use crate::serde::{from_json_slice, from_yaml_slice, to_canonical_json_bytes};
pub use hash::hash_report;
pub use report::{
    model_matrices, ModelMatrices, ReductionReport, SpotResults, SummaryReport, REPORT_SCHEMA,
};
