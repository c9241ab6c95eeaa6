//! Fixed-shape reduction report assembled from an evaluated task.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use spotred_core::errors::ReductionError;
use spotred_core::{ModelKind, ParameterSet, SchemaVersion, SpotId, SpotKind};
use spotred_stats::{WeightedMeanRecord, RECORD_SCHEMA};
use spotred_task::{OvercountMode, Task};

use crate::hash::hash_report;

/// Version of the [`ReductionReport`] layout.
pub const REPORT_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Every per-spot result of one spot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotResults {
    /// Spot identifier.
    pub id: SpotId,
    /// Reference material or unknown.
    pub kind: SpotKind,
    /// Result row per expression name.
    pub values: BTreeMap<String, Vec<f64>>,
}

/// Weighted-mean summary of one expression over one spot kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    /// Summary expression.
    pub expression: String,
    /// Spot kind the group was drawn from.
    pub kind: SpotKind,
    /// How the coherence search ended.
    pub outcome: String,
    /// Published record, absent when no result may be reported.
    pub record: Option<WeightedMeanRecord>,
    /// Record columns in [`RECORD_SCHEMA`] order.
    pub columns: Option<[f64; 9]>,
    /// Spots excluded from the group.
    pub rejected: Vec<SpotId>,
}

/// Canonical description of a reduction pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionReport {
    /// Layout version of this report.
    pub schema: SchemaVersion,
    /// Layout version of the weighted-mean records.
    pub record_schema: SchemaVersion,
    /// Task label.
    pub task: String,
    /// Active overcount correction.
    pub overcount_mode: OvercountMode,
    /// Execution order of the expressions.
    pub order: Vec<String>,
    /// Per-spot results in input order.
    pub spots: Vec<SpotResults>,
    /// Weighted-mean summaries by expression, then kind.
    pub summaries: Vec<SummaryReport>,
    /// SHA-256 of the canonical report with this field blanked.
    pub report_hash: String,
}

impl ReductionReport {
    /// Collects the results of an evaluated task and stamps the hash.
    pub fn from_task(task: &Task) -> Result<Self, ReductionError> {
        let per_spot = task.results().per_spot_results();
        let spots = task
            .spots()
            .iter()
            .map(|spot| SpotResults {
                id: spot.id().clone(),
                kind: spot.kind(),
                values: per_spot
                    .iter()
                    .filter_map(|(name, rows)| {
                        rows.get(spot.id()).map(|row| (name.clone(), row.clone()))
                    })
                    .collect(),
            })
            .collect();

        let summaries = task
            .summaries()
            .iter()
            .flat_map(|(expression, by_kind)| {
                by_kind.iter().map(move |(kind, entry)| {
                    let record = entry.details.record();
                    SummaryReport {
                        expression: expression.clone(),
                        kind: *kind,
                        outcome: entry.outcome.label().to_string(),
                        columns: record.as_ref().map(WeightedMeanRecord::to_array),
                        record,
                        rejected: entry.details.selection.rejected_ids(),
                    }
                })
            })
            .collect();

        let mut report = Self {
            schema: REPORT_SCHEMA,
            record_schema: RECORD_SCHEMA,
            task: task.config().name.clone(),
            overcount_mode: task.overcount_mode(),
            order: task.order().names().to_vec(),
            spots,
            summaries,
            report_hash: String::new(),
        };
        report.report_hash = hash_report(&report)?;
        log::debug!("report for {} hashed as {}", report.task, report.report_hash);
        Ok(report)
    }

    /// Summaries that carry a record, for compact output.
    pub fn records(&self) -> BTreeMap<String, &WeightedMeanRecord> {
        self.summaries
            .iter()
            .filter_map(|summary| {
                let record = summary.record.as_ref()?;
                Some((format!("{}/{:?}", summary.expression, summary.kind), record))
            })
            .collect()
    }

    /// Recomputes the hash and compares it with the stamped one.
    pub fn verify_hash(&self) -> Result<bool, ReductionError> {
        Ok(hash_report(self)? == self.report_hash)
    }
}

/// Correlation and covariance matrices of one parameter model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMatrices {
    /// Model name.
    pub model_name: String,
    /// Model role.
    pub kind: ModelKind,
    /// Row and column labels.
    pub names: Vec<String>,
    /// Correlation matrix rows.
    pub correlation: Vec<Vec<f64>>,
    /// Covariance matrix rows.
    pub covariance: Vec<Vec<f64>>,
}

/// Matrices of every model in a parameter set.
pub fn model_matrices(parameters: &ParameterSet) -> Vec<ModelMatrices> {
    parameters
        .iter()
        .map(|model| ModelMatrices {
            model_name: model.model_name.clone(),
            kind: model.kind,
            names: model.covariance().names().to_vec(),
            correlation: model.correlation().rows().to_vec(),
            covariance: model.covariance().rows().to_vec(),
        })
        .collect()
}
