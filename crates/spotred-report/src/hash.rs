use serde::Serialize;
use sha2::{Digest, Sha256};
use spotred_core::errors::ReductionError;

use crate::report::ReductionReport;
use crate::serde::to_canonical_json_bytes;

pub(crate) fn hash_json<T: Serialize>(value: &T) -> Result<String, ReductionError> {
    let json = to_canonical_json_bytes(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Content hash of a report, computed with its own hash field blanked.
pub fn hash_report(report: &ReductionReport) -> Result<String, ReductionError> {
    let mut unstamped = report.clone();
    unstamped.report_hash.clear();
    hash_json(&unstamped)
}
